use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

// ============================================================================
// Slots and daily status
// ============================================================================

/// One of the fixed daily time points at which a campaign view is permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub id: u8,
    pub hour: u32,
    pub minute: u32,
}

impl Slot {
    pub const fn new(id: u8, hour: u32, minute: u32) -> Self {
        Self { id, hour, minute }
    }

    /// Slot time expressed as minutes since local midnight
    pub fn minutes_of_day(&self) -> u32 {
        self.hour * 60 + self.minute
    }

    pub fn label(&self) -> String {
        format!("{:02}:{:02}", self.hour, self.minute)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotStatus {
    pub slot_id: u8,
    pub completed: bool,
    pub ad_id: Option<Uuid>,
    pub viewed_at: Option<DateTime<Utc>>,
}

impl SlotStatus {
    pub fn pending(slot_id: u8) -> Self {
        Self { slot_id, completed: false, ad_id: None, viewed_at: None }
    }
}

/// Per-user, per-calendar-day record of which slots have been watched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyAdStatus {
    pub date: NaiveDate,
    pub slots: Vec<SlotStatus>,
}

impl DailyAdStatus {
    pub fn completed_count(&self) -> usize {
        self.slots.iter().filter(|s| s.completed).count()
    }

    pub fn slot(&self, slot_id: u8) -> Option<&SlotStatus> {
        self.slots.iter().find(|s| s.slot_id == slot_id)
    }

    pub fn is_completed(&self, slot_id: u8) -> bool {
        self.slot(slot_id).map(|s| s.completed).unwrap_or(false)
    }
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Interest tags used for campaign targeting
    pub interests: Vec<String>,
    pub push_token: Option<String>,
    /// Slots the user wants a reminder for when the window opens
    pub preferred_slots: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUserRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub push_token: Option<String>,
}

impl NewUserRequest {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("name is required".to_string()));
        }
        if !self.email.contains('@') {
            return Err(Error::Validation("a valid email is required".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// Merchants
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MerchantStatus {
    Pending,
    Approved,
    Suspended,
}

impl MerchantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MerchantStatus::Pending => "pending",
            MerchantStatus::Approved => "approved",
            MerchantStatus::Suspended => "suspended",
        }
    }
}

impl FromStr for MerchantStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(MerchantStatus::Pending),
            "approved" => Ok(MerchantStatus::Approved),
            "suspended" => Ok(MerchantStatus::Suspended),
            other => Err(Error::Validation(format!("unknown merchant status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Merchant {
    pub id: Uuid,
    pub business_name: String,
    pub contact_email: String,
    pub status: MerchantStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMerchantRequest {
    pub business_name: String,
    pub contact_email: String,
}

impl NewMerchantRequest {
    pub fn validate(&self) -> Result<()> {
        if self.business_name.trim().is_empty() {
            return Err(Error::Validation("business_name is required".to_string()));
        }
        if !self.contact_email.contains('@') {
            return Err(Error::Validation("a valid contact_email is required".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// Campaigns
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Active => "active",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CampaignStatus::Completed | CampaignStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: CampaignStatus) -> bool {
        use CampaignStatus::*;
        matches!(
            (self, next),
            (Draft, Active)
                | (Draft, Cancelled)
                | (Active, Paused)
                | (Active, Completed)
                | (Active, Cancelled)
                | (Paused, Active)
                | (Paused, Cancelled)
        )
    }

    /// Validate a transition, returning the new status
    pub fn transition(&self, next: CampaignStatus) -> Result<CampaignStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(Error::InvalidTransition {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CampaignStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(CampaignStatus::Draft),
            "active" => Ok(CampaignStatus::Active),
            "paused" => Ok(CampaignStatus::Paused),
            "completed" => Ok(CampaignStatus::Completed),
            "cancelled" => Ok(CampaignStatus::Cancelled),
            other => Err(Error::Validation(format!("unknown campaign status '{}'", other))),
        }
    }
}

/// Merchant-funded advertisement. Money fields are in minor units (cents).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub media_url: Option<String>,
    pub budget_cents: i64,
    pub spent_cents: i64,
    /// Price the merchant pays per verified view
    pub reward_per_view_cents: i64,
    /// Minimum watch time for a view to count as verified
    pub duration_seconds: u32,
    pub target_interests: Vec<String>,
    pub status: CampaignStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    pub fn remaining_budget_cents(&self) -> i64 {
        (self.budget_cents - self.spent_cents).max(0)
    }

    /// Whether a user with the given interests may be shown this campaign.
    /// Untargeted campaigns and users without interests match everything.
    pub fn matches_interests(&self, interests: &[String]) -> bool {
        if self.target_interests.is_empty() || interests.is_empty() {
            return true;
        }
        self.target_interests
            .iter()
            .any(|target| interests.iter().any(|i| i.eq_ignore_ascii_case(target)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
    pub budget_cents: i64,
    pub reward_per_view_cents: i64,
    #[serde(default = "default_campaign_duration")]
    pub duration_seconds: u32,
    #[serde(default)]
    pub target_interests: Vec<String>,
}

fn default_campaign_duration() -> u32 {
    crate::rewards::VIEW_DURATION_SECS
}

impl CampaignInput {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("name is required".to_string()));
        }
        if self.budget_cents <= 0 {
            return Err(Error::Validation("budget must be positive".to_string()));
        }
        if self.reward_per_view_cents <= 0 {
            return Err(Error::Validation("reward per view must be positive".to_string()));
        }
        if self.reward_per_view_cents > self.budget_cents {
            return Err(Error::Validation("reward per view exceeds budget".to_string()));
        }
        if self.duration_seconds == 0 {
            return Err(Error::Validation("duration must be positive".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignStats {
    pub campaign_id: Uuid,
    pub date: NaiveDate,
    pub views: i64,
    pub verified_views: i64,
    pub spend_cents: i64,
}

// ============================================================================
// Views and rewards
// ============================================================================

/// A record of one user watching one campaign once. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub campaign_id: Uuid,
    pub slot_id: u8,
    pub watched_at: DateTime<Utc>,
    pub duration_seconds: u32,
    pub reward_earned_cents: i64,
    pub verified: bool,
}

/// Fixed-amount credit for one completed view. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount_cents: i64,
    pub ad_view_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSummary {
    pub total_earned: i64,
    pub today: i64,
    pub this_week: i64,
    pub total_pending: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    Pending,
    Paid,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Paid => "paid",
        }
    }
}

impl FromStr for PayoutStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(PayoutStatus::Pending),
            "paid" => Ok(PayoutStatus::Paid),
            other => Err(Error::Validation(format!("unknown payout status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount_cents: i64,
    pub status: PayoutStatus,
    pub requested_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Push notifications
// ============================================================================

/// Message body accepted by Expo-compatible push services
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushMessage {
    pub to: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn campaign(targets: &[&str]) -> Campaign {
        Campaign {
            id: Uuid::new_v4(),
            merchant_id: Uuid::new_v4(),
            name: "Coffee".to_string(),
            description: None,
            media_url: None,
            budget_cents: 10_000,
            spent_cents: 0,
            reward_per_view_cents: 250,
            duration_seconds: 5,
            target_interests: targets.iter().map(|t| t.to_string()).collect(),
            status: CampaignStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_campaign_status_transitions() {
        assert!(CampaignStatus::Draft.can_transition_to(CampaignStatus::Active));
        assert!(CampaignStatus::Active.can_transition_to(CampaignStatus::Paused));
        assert!(CampaignStatus::Paused.can_transition_to(CampaignStatus::Active));
        assert!(!CampaignStatus::Completed.can_transition_to(CampaignStatus::Active));
        assert!(!CampaignStatus::Cancelled.can_transition_to(CampaignStatus::Draft));
        assert!(!CampaignStatus::Draft.can_transition_to(CampaignStatus::Paused));

        let err = CampaignStatus::Completed.transition(CampaignStatus::Active).unwrap_err();
        assert_eq!(
            err,
            Error::InvalidTransition { from: "completed".to_string(), to: "active".to_string() }
        );
    }

    #[test]
    fn test_campaign_status_round_trips_through_str() {
        for status in [
            CampaignStatus::Draft,
            CampaignStatus::Active,
            CampaignStatus::Paused,
            CampaignStatus::Completed,
            CampaignStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<CampaignStatus>().unwrap(), status);
        }
        assert!("archived".parse::<CampaignStatus>().is_err());
    }

    #[test]
    fn test_interest_matching() {
        let interests = vec!["Food".to_string(), "travel".to_string()];

        assert!(campaign(&[]).matches_interests(&interests));
        assert!(campaign(&["food"]).matches_interests(&interests));
        assert!(!campaign(&["sports"]).matches_interests(&interests));
        assert!(campaign(&["sports"]).matches_interests(&[]));
    }

    #[test]
    fn test_campaign_input_validation() {
        let mut input = CampaignInput {
            name: "Launch".to_string(),
            description: None,
            media_url: None,
            budget_cents: 5_000,
            reward_per_view_cents: 200,
            duration_seconds: 5,
            target_interests: vec![],
        };
        assert!(input.validate().is_ok());

        input.budget_cents = 0;
        assert!(matches!(input.validate(), Err(Error::Validation(_))));

        input.budget_cents = 100;
        assert!(input.validate().is_err(), "reward per view larger than budget");
    }

    #[test]
    fn test_remaining_budget_never_negative() {
        let mut c = campaign(&[]);
        c.spent_cents = 12_000;
        assert_eq!(c.remaining_budget_cents(), 0);
    }
}
