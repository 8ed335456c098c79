//! Newsletter Module - Variant campaigns and content rendering

mod manager;
mod template;

pub use manager::{
    CampaignError, CampaignManager, CampaignProgress, CampaignSummary, NewCampaign,
    NewCampaignRecipient,
};
pub use template::{TemplateRenderer, VariantContent};
