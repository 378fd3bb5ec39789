use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use spotx_common::slot_calendar::slot_by_id;
use spotx_common::types::{Campaign, CampaignStatus, User};
use spotx_db::queries::CampaignQueries;
use spotx_db::Database;
use tracing::{debug, warn};

use crate::error::{Result, ServiceError};

/// Uniform pick among active campaigns matching the user's interests.
/// No frequency capping or pacing: every eligible campaign is equally likely.
pub fn select_campaign<'a, R: Rng + ?Sized>(
    candidates: &'a [Campaign],
    interests: &[String],
    rng: &mut R,
) -> Option<&'a Campaign> {
    let eligible: Vec<&Campaign> = candidates
        .iter()
        .filter(|c| c.status == CampaignStatus::Active && c.matches_interests(interests))
        .collect();

    eligible.choose(rng).copied()
}

pub struct AdSelector {
    db: Arc<Database>,
    load_timeout: Duration,
}

impl AdSelector {
    pub fn new(db: Arc<Database>, load_timeout: Duration) -> Self {
        Self { db, load_timeout }
    }

    pub async fn get_ad_for_slot(&self, user: &User, slot_id: u8) -> Result<Option<Campaign>> {
        slot_by_id(slot_id)?;

        let campaigns = tokio::time::timeout(
            self.load_timeout,
            CampaignQueries::list_by_status(&self.db, CampaignStatus::Active),
        )
        .await
        .map_err(|_| {
            warn!("Loading campaigns for slot {} timed out", slot_id);
            ServiceError::AdLoadTimeout(self.load_timeout.as_secs())
        })??;

        let picked = select_campaign(&campaigns, &user.interests, &mut rand::thread_rng()).cloned();

        match &picked {
            Some(campaign) => {
                debug!("Selected campaign {} for user {} slot {}", campaign.id, user.id, slot_id)
            }
            None => debug!("No eligible campaign for user {} slot {}", user.id, slot_id),
        }

        Ok(picked)
    }
}
