use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use spotx_common::types::{
    AdView, Campaign, CampaignInput, CampaignStats, CampaignStatus, Merchant, MerchantStatus,
    NewMerchantRequest, NewUserRequest, Payout, PayoutStatus, Reward, User,
};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{DbError, Result};

fn parse_uuid(value: &str) -> Result<Uuid> {
    Ok(Uuid::parse_str(value)?)
}

fn parse_json_list<T: serde::de::DeserializeOwned>(value: &str) -> Result<Vec<T>> {
    Ok(serde_json::from_str(value)?)
}

fn non_negative_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| DbError::InvalidData(format!("{} out of range: {}", field, value)))
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub interests: String,       // JSON array
    pub push_token: Option<String>,
    pub preferred_slots: String, // JSON array
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub interests: Vec<String>,
    pub push_token: Option<String>,
}

impl NewUser {
    pub fn from_request(request: NewUserRequest) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: request.name.trim().to_string(),
            email: request.email.trim().to_ascii_lowercase(),
            interests: request.interests,
            push_token: request.push_token,
        }
    }
}

impl TryFrom<DbUser> for User {
    type Error = DbError;

    fn try_from(row: DbUser) -> Result<Self> {
        Ok(User {
            id: parse_uuid(&row.id)?,
            name: row.name,
            email: row.email,
            interests: parse_json_list(&row.interests)?,
            push_token: row.push_token,
            preferred_slots: parse_json_list(&row.preferred_slots)?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbMerchant {
    pub id: String,
    pub business_name: String,
    pub contact_email: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMerchant {
    pub id: String,
    pub business_name: String,
    pub contact_email: String,
}

impl NewMerchant {
    pub fn from_request(request: NewMerchantRequest) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            business_name: request.business_name.trim().to_string(),
            contact_email: request.contact_email.trim().to_ascii_lowercase(),
        }
    }
}

impl TryFrom<DbMerchant> for Merchant {
    type Error = DbError;

    fn try_from(row: DbMerchant) -> Result<Self> {
        Ok(Merchant {
            id: parse_uuid(&row.id)?,
            business_name: row.business_name,
            contact_email: row.contact_email,
            status: MerchantStatus::from_str(&row.status)?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbCampaign {
    pub id: String,
    pub merchant_id: String,
    pub name: String,
    pub description: Option<String>,
    pub media_url: Option<String>,
    pub budget_cents: i64,
    pub spent_cents: i64,
    pub reward_per_view_cents: i64,
    pub duration_seconds: i64,
    pub target_interests: String, // JSON array
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub id: String,
    pub merchant_id: String,
    pub input: CampaignInput,
}

impl NewCampaign {
    pub fn new(merchant_id: Uuid, input: CampaignInput) -> Self {
        Self { id: Uuid::new_v4().to_string(), merchant_id: merchant_id.to_string(), input }
    }
}

impl TryFrom<DbCampaign> for Campaign {
    type Error = DbError;

    fn try_from(row: DbCampaign) -> Result<Self> {
        Ok(Campaign {
            id: parse_uuid(&row.id)?,
            merchant_id: parse_uuid(&row.merchant_id)?,
            name: row.name,
            description: row.description,
            media_url: row.media_url,
            budget_cents: row.budget_cents,
            spent_cents: row.spent_cents,
            reward_per_view_cents: row.reward_per_view_cents,
            duration_seconds: non_negative_u32(row.duration_seconds, "duration_seconds")?,
            target_interests: parse_json_list(&row.target_interests)?,
            status: CampaignStatus::from_str(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbCampaignStats {
    pub campaign_id: String,
    pub date: NaiveDate,
    pub views: i64,
    pub verified_views: i64,
    pub spend_cents: i64,
}

impl TryFrom<DbCampaignStats> for CampaignStats {
    type Error = DbError;

    fn try_from(row: DbCampaignStats) -> Result<Self> {
        Ok(CampaignStats {
            campaign_id: parse_uuid(&row.campaign_id)?,
            date: row.date,
            views: row.views,
            verified_views: row.verified_views,
            spend_cents: row.spend_cents,
        })
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbAdView {
    pub id: String,
    pub user_id: String,
    pub campaign_id: String,
    pub slot_id: i64,
    pub watched_at: DateTime<Utc>,
    pub duration_seconds: i64,
    pub reward_earned_cents: i64,
    pub verified: bool,
}

impl TryFrom<DbAdView> for AdView {
    type Error = DbError;

    fn try_from(row: DbAdView) -> Result<Self> {
        Ok(AdView {
            id: parse_uuid(&row.id)?,
            user_id: parse_uuid(&row.user_id)?,
            campaign_id: parse_uuid(&row.campaign_id)?,
            slot_id: u8::try_from(row.slot_id).map_err(|_| {
                DbError::InvalidData(format!("slot_id out of range: {}", row.slot_id))
            })?,
            watched_at: row.watched_at,
            duration_seconds: non_negative_u32(row.duration_seconds, "duration_seconds")?,
            reward_earned_cents: row.reward_earned_cents,
            verified: row.verified,
        })
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbReward {
    pub id: String,
    pub user_id: String,
    pub amount_cents: i64,
    pub ad_view_id: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbReward> for Reward {
    type Error = DbError;

    fn try_from(row: DbReward) -> Result<Self> {
        Ok(Reward {
            id: parse_uuid(&row.id)?,
            user_id: parse_uuid(&row.user_id)?,
            amount_cents: row.amount_cents,
            ad_view_id: parse_uuid(&row.ad_view_id)?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbPayout {
    pub id: String,
    pub user_id: String,
    pub amount_cents: i64,
    pub status: String,
    pub requested_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbPayout> for Payout {
    type Error = DbError;

    fn try_from(row: DbPayout) -> Result<Self> {
        Ok(Payout {
            id: parse_uuid(&row.id)?,
            user_id: parse_uuid(&row.user_id)?,
            amount_cents: row.amount_cents,
            status: PayoutStatus::from_str(&row.status)?,
            requested_at: row.requested_at,
            paid_at: row.paid_at,
        })
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbNotification {
    pub id: i64,
    pub user_id: Option<String>,
    pub title: String,
    pub body: String,
    pub data: Option<String>,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
    pub user_id: Option<String>,
    pub title: String,
    pub body: String,
    pub data: Option<String>,
}

/// Everything written when a view completes, applied as one transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub view: AdView,
    pub reward: Reward,
    /// Merchant-facing spend, present only for verified views
    pub campaign_spend_cents: Option<i64>,
    /// Local calendar date the stats row is bucketed under
    pub stats_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionOutcome {
    Recorded { campaign_completed: bool },
    /// The view id was already present; nothing was written
    AlreadyRecorded,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PayoutRequest {
    Created(Payout),
    /// Nothing was inserted; `available` is what the user could still request
    InsufficientBalance { available: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_campaign_row_conversion() {
        let row = DbCampaign {
            id: Uuid::new_v4().to_string(),
            merchant_id: Uuid::new_v4().to_string(),
            name: "Bakery".to_string(),
            description: None,
            media_url: Some("https://cdn.example/ad.mp4".to_string()),
            budget_cents: 10_000,
            spent_cents: 500,
            reward_per_view_cents: 250,
            duration_seconds: 5,
            target_interests: r#"["food","local"]"#.to_string(),
            status: "active".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let campaign = Campaign::try_from(row).unwrap();
        assert_eq!(campaign.status, CampaignStatus::Active);
        assert_eq!(campaign.target_interests, vec!["food", "local"]);
        assert_eq!(campaign.remaining_budget_cents(), 9_500);
    }

    #[test]
    fn test_bad_rows_are_rejected() {
        let row = DbAdView {
            id: "not-a-uuid".to_string(),
            user_id: Uuid::new_v4().to_string(),
            campaign_id: Uuid::new_v4().to_string(),
            slot_id: 1,
            watched_at: Utc::now(),
            duration_seconds: 5,
            reward_earned_cents: 100,
            verified: true,
        };
        assert!(matches!(AdView::try_from(row), Err(DbError::Uuid(_))));

        let row = DbPayout {
            id: Uuid::new_v4().to_string(),
            user_id: Uuid::new_v4().to_string(),
            amount_cents: 100,
            status: "refunded".to_string(),
            requested_at: Utc::now(),
            paid_at: None,
        };
        assert!(matches!(Payout::try_from(row), Err(DbError::Domain(_))));
    }

    #[test]
    fn test_new_user_normalizes_email() {
        let user = NewUser::from_request(NewUserRequest {
            name: "  Mina ".to_string(),
            email: "Mina@Example.COM".to_string(),
            interests: vec![],
            push_token: None,
        });
        assert_eq!(user.name, "Mina");
        assert_eq!(user.email, "mina@example.com");
    }
}
