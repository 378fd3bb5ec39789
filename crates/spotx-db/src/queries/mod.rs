pub mod ad_views;
pub mod campaign_stats;
pub mod campaigns;
pub mod completion;
pub mod merchants;
pub mod notifications;
pub mod payouts;
pub mod rewards;
pub mod users;

pub use ad_views::AdViewQueries;
pub use campaign_stats::CampaignStatsQueries;
pub use campaigns::CampaignQueries;
pub use completion::CompletionQueries;
pub use merchants::MerchantQueries;
pub use notifications::NotificationQueries;
pub use payouts::PayoutQueries;
pub use rewards::RewardQueries;
pub use users::UserQueries;
