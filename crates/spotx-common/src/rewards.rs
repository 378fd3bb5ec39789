use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use crate::slot_calendar::SLOTS;
use crate::types::{Reward, RewardSummary};

pub const MONTHLY_REWARD_TOTAL_CENTS: i64 = 15_000;
pub const DAYS_PER_MONTH: i64 = 30;
pub const SLOTS_PER_DAY: i64 = SLOTS.len() as i64;

/// Amount a user earns for one completed view
pub const USER_REWARD_PER_VIEW_CENTS: i64 =
    MONTHLY_REWARD_TOTAL_CENTS / (DAYS_PER_MONTH * SLOTS_PER_DAY);

/// Countdown length of a view session
pub const VIEW_DURATION_SECS: u32 = 5;

/// Elapsed seconds before the dismiss affordance appears
pub const DISMISS_AFTER_SECS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardRules {
    pub monthly_total_cents: i64,
    pub days_per_month: i64,
}

impl Default for RewardRules {
    fn default() -> Self {
        Self { monthly_total_cents: MONTHLY_REWARD_TOTAL_CENTS, days_per_month: DAYS_PER_MONTH }
    }
}

impl RewardRules {
    /// Fixed per-view reward: the monthly total spread over every slot of the month
    pub fn per_view_cents(&self) -> i64 {
        let views_per_month = self.days_per_month.max(1) * SLOTS_PER_DAY;
        self.monthly_total_cents / views_per_month
    }
}

/// Whether a watch of `watched_secs` satisfies the campaign's minimum duration
pub fn is_verified(watched_secs: u32, campaign_duration_secs: u32) -> bool {
    watched_secs >= campaign_duration_secs
}

/// Monday of the ISO week containing `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Bucket rewards into today / this week / total, relative to `now`'s timezone.
/// `paid_out_cents` is the sum of payouts already settled.
pub fn summarize<Tz: TimeZone>(
    rewards: &[Reward],
    paid_out_cents: i64,
    now: &DateTime<Tz>,
) -> RewardSummary {
    let tz = now.timezone();
    let today = now.date_naive();
    let monday = week_start(today);

    let mut summary = RewardSummary::default();
    for reward in rewards {
        let date = reward.created_at.with_timezone(&tz).date_naive();
        summary.total_earned += reward.amount_cents;
        if date == today {
            summary.today += reward.amount_cents;
        }
        if date >= monday && date <= today {
            summary.this_week += reward.amount_cents;
        }
    }
    summary.total_pending = (summary.total_earned - paid_out_cents).max(0);
    summary
}
