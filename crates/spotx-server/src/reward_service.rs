use std::sync::Arc;

use spotx_common::rewards::summarize;
use spotx_common::types::{Payout, PayoutStatus, RewardSummary};
use spotx_common::Error as DomainError;
use spotx_db::queries::{PayoutQueries, RewardQueries, UserQueries};
use spotx_db::{Database, PayoutRequest};
use tracing::info;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{Result, ServiceError};

pub struct RewardService {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
}

impl RewardService {
    pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub async fn summary(&self, user_id: Uuid) -> Result<RewardSummary> {
        let id = user_id.to_string();
        UserQueries::get_by_id(&self.db, &id).await.map_err(|e| ServiceError::from(e).normalize())?;

        let rewards = RewardQueries::list_for_user(&self.db, &id).await?;
        let paid = PayoutQueries::total_for_user(&self.db, &id, PayoutStatus::Paid).await?;

        Ok(summarize(&rewards, paid, &self.clock.now()))
    }

    pub async fn payouts(&self, user_id: Uuid) -> Result<Vec<Payout>> {
        Ok(PayoutQueries::list_for_user(&self.db, &user_id.to_string()).await?)
    }

    /// Request a payout. Open requests count against the pending balance.
    pub async fn request_payout(&self, user_id: Uuid, amount_cents: i64) -> Result<Payout> {
        if amount_cents <= 0 {
            return Err(
                DomainError::Validation("Payout amount must be positive".to_string()).into()
            );
        }

        let id = user_id.to_string();
        UserQueries::get_by_id(&self.db, &id).await.map_err(|e| ServiceError::from(e).normalize())?;

        match PayoutQueries::request_within_balance(&self.db, &id, amount_cents).await? {
            PayoutRequest::Created(payout) => {
                info!("User {} requested payout {} of {}", user_id, payout.id, amount_cents);
                Ok(payout)
            }
            PayoutRequest::InsufficientBalance { available } => {
                Err(DomainError::Validation(format!(
                    "Payout of {} exceeds available balance of {}",
                    amount_cents, available
                ))
                .into())
            }
        }
    }

    pub async fn mark_paid(&self, payout_id: Uuid) -> Result<Payout> {
        let payout = PayoutQueries::mark_paid(&self.db, &payout_id.to_string())
            .await
            .map_err(|e| ServiceError::from(e).normalize())?;
        info!("Payout {} marked paid", payout.id);
        Ok(payout)
    }
}
