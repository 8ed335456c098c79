//! Repository layer for data access

pub mod campaign_sends;
pub mod campaigns;
pub mod job_recipients;
pub mod jobs;
pub mod recipient_lists;
pub mod templates;
pub mod unsubscribes;

pub use campaign_sends::{CampaignSendCounts, CampaignSendRepository};
pub use campaigns::{CampaignAggregateStats, CampaignRepository};
pub use job_recipients::{JobRecipientCounts, JobRecipientRepository};
pub use jobs::JobRepository;
pub use recipient_lists::RecipientListRepository;
pub use templates::TemplateRepository;
pub use unsubscribes::UnsubscribeRepository;
