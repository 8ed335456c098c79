//! Sendloop Core - Batched campaign dispatch and newsletter delivery
//!
//! This crate provides the core dispatch functionality for Sendloop,
//! including CSV recipient ingestion, the batched job dispatch loop,
//! newsletter campaigns, and SMTP delivery.

pub mod dispatch;
pub mod ingest;
pub mod newsletter;

pub use dispatch::{
    BatchOutcome, DispatchCommand, DispatchError, DispatchLoop, DispatchRegistry, JobCreated,
    JobManager, LoopState, Mailer, MailerError, NewJob, NewJobRecipient, OutgoingEmail,
    ProgressSnapshot, ProgressWatcher, SmtpMailer,
};
pub use ingest::{
    IngestError, ParseIssue, ParsedRecipient, ParsedRecipients, RecipientIngestor,
    VariantDistribution,
};
pub use newsletter::{
    CampaignError, CampaignManager, CampaignProgress, CampaignSummary, NewCampaign,
    NewCampaignRecipient, TemplateRenderer, VariantContent,
};
