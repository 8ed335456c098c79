//! Campaign Manager - Newsletter campaign dispatch and reporting

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use sendloop_common::config::Config;
use sendloop_common::types::{EmailAddress, Variant};
use sendloop_storage::db::DatabasePool;
use sendloop_storage::models::{
    Campaign, CampaignSend, CampaignStatus, CreateCampaign, CreateCampaignSend,
};
use sendloop_storage::repository::{
    CampaignAggregateStats, CampaignRepository, CampaignSendCounts, CampaignSendRepository,
};

use crate::dispatch::{Mailer, MailerError, OutgoingEmail};

use super::template::{TemplateRenderer, DEFAULT_NEWSLETTER_BODY};

/// Campaign manager errors
#[derive(Error, Debug)]
pub enum CampaignError {
    #[error("Recipients array is required and cannot be empty")]
    InvalidRecipients,

    #[error("Maximum {0} recipients allowed")]
    TooManyRecipients(usize),

    #[error("Subject and campaign name are required")]
    MissingFields,

    #[error("Each recipient must have email, name, and variant")]
    InvalidRecipientStructure,

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Variant must be 'a', 'b', or 'c'")]
    InvalidVariant,

    #[error("Campaign not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CampaignError {
    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            CampaignError::InvalidRecipients => "INVALID_RECIPIENTS",
            CampaignError::TooManyRecipients(_) => "TOO_MANY_RECIPIENTS",
            CampaignError::MissingFields => "MISSING_REQUIRED_FIELDS",
            CampaignError::InvalidRecipientStructure => "INVALID_RECIPIENT_STRUCTURE",
            CampaignError::InvalidEmail(_) => "INVALID_EMAIL",
            CampaignError::InvalidVariant => "INVALID_VARIANT",
            CampaignError::NotFound => "CAMPAIGN_NOT_FOUND",
            CampaignError::Database(_) => "DATABASE_ERROR",
            CampaignError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// One recipient of a new campaign
#[derive(Debug, Clone)]
pub struct NewCampaignRecipient {
    pub email: String,
    pub name: String,
    pub variant: String,
}

/// Input for starting a campaign
#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub name: String,
    pub subject: String,
    pub recipients: Vec<NewCampaignRecipient>,
}

/// Lightweight polling payload for a running campaign
#[derive(Debug, Clone, Serialize)]
pub struct CampaignProgress {
    pub id: Uuid,
    pub status: String,
    pub total_recipients: i32,
    pub sent_count: i32,
    pub failed_count: i32,
}

impl From<&Campaign> for CampaignProgress {
    fn from(campaign: &Campaign) -> Self {
        Self {
            id: campaign.id,
            status: campaign.status.clone(),
            total_recipients: campaign.total_recipients,
            sent_count: campaign.sent_count,
            failed_count: campaign.failed_count,
        }
    }
}

/// Campaign list entry with delivery rates
#[derive(Debug, Clone, Serialize)]
pub struct CampaignSummary {
    pub id: Uuid,
    pub name: String,
    pub subject: String,
    pub total_recipients: i32,
    pub sent_count: i32,
    pub failed_count: i32,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub success_rate: f64,
    pub failure_rate: f64,
    pub actual_sent: i64,
    pub actual_failed: i64,
}

impl CampaignSummary {
    /// Combine the campaign row with its aggregated send counts
    ///
    /// Rates prefer the per-send aggregates and fall back to the
    /// campaign counters when no send rows exist yet.
    fn build(campaign: Campaign, counts: CampaignSendCounts) -> Self {
        let sent = if counts.sent > 0 {
            counts.sent
        } else {
            i64::from(campaign.sent_count)
        };
        let failed = if counts.failed > 0 {
            counts.failed
        } else {
            i64::from(campaign.failed_count)
        };
        let total = i64::from(campaign.total_recipients);

        let success_rate = if total > 0 {
            round2(sent as f64 / total as f64 * 100.0)
        } else {
            0.0
        };
        let failure_rate = if total > 0 {
            round2(failed as f64 / total as f64 * 100.0)
        } else {
            0.0
        };

        Self {
            id: campaign.id,
            name: campaign.name,
            subject: campaign.subject,
            total_recipients: campaign.total_recipients,
            sent_count: campaign.sent_count,
            failed_count: campaign.failed_count,
            status: campaign.status,
            started_at: campaign.started_at,
            completed_at: campaign.completed_at,
            created_at: campaign.created_at,
            success_rate,
            failure_rate,
            actual_sent: counts.sent,
            actual_failed: counts.failed,
        }
    }
}

/// Campaign Manager - owns newsletter campaign lifecycle and reporting
pub struct CampaignManager {
    campaigns: CampaignRepository,
    sends: CampaignSendRepository,
    mailer: Arc<dyn Mailer>,
    unsubscribe_base_url: String,
    max_recipients: usize,
    batch_size: i64,
    batch_delay: Duration,
}

impl CampaignManager {
    /// Create a new campaign manager
    pub fn new(db_pool: DatabasePool, mailer: Arc<dyn Mailer>, config: &Config) -> Self {
        let pool = db_pool.pool().clone();
        Self {
            campaigns: CampaignRepository::new(pool.clone()),
            sends: CampaignSendRepository::new(pool),
            mailer,
            unsubscribe_base_url: config.sender.unsubscribe_base_url.clone(),
            max_recipients: config.limits.newsletter_max_recipients,
            batch_size: config.limits.newsletter_batch_size as i64,
            batch_delay: Duration::from_millis(config.limits.newsletter_batch_delay_ms),
        }
    }

    /// Validate, persist and start a campaign
    ///
    /// Returns as soon as the campaign and its pending sends are stored;
    /// delivery happens on a spawned worker task.
    pub async fn send_campaign(&self, input: NewCampaign) -> Result<Campaign, CampaignError> {
        if input.recipients.is_empty() {
            return Err(CampaignError::InvalidRecipients);
        }
        if input.recipients.len() > self.max_recipients {
            return Err(CampaignError::TooManyRecipients(self.max_recipients));
        }
        if input.subject.trim().is_empty() || input.name.trim().is_empty() {
            return Err(CampaignError::MissingFields);
        }

        let rows = normalize_recipients(&input.recipients)?;

        let campaign = self
            .campaigns
            .create(CreateCampaign {
                name: input.name.trim().to_string(),
                subject: input.subject.trim().to_string(),
                // Recipients carry individual variants; the campaign row
                // keeps the default block
                template_variant: Variant::A.to_string(),
                total_recipients: rows.len() as i32,
            })
            .await?;

        self.sends.create_batch(campaign.id, rows).await?;

        info!(
            "Campaign {} ({}) started: {} recipients",
            campaign.id, campaign.name, campaign.total_recipients
        );

        let worker = CampaignWorker {
            campaigns: self.campaigns.clone(),
            sends: self.sends.clone(),
            mailer: self.mailer.clone(),
            renderer: TemplateRenderer::new(self.unsubscribe_base_url.clone()),
            batch_size: self.batch_size,
            batch_delay: self.batch_delay,
        };
        let spawned = campaign.clone();
        tokio::spawn(async move {
            worker.run(spawned).await;
        });

        Ok(campaign)
    }

    /// A campaign with its per-status send counts
    pub async fn campaign_status(
        &self,
        id: Uuid,
    ) -> Result<(Campaign, CampaignSendCounts), CampaignError> {
        let campaign = self
            .campaigns
            .get(id)
            .await?
            .ok_or(CampaignError::NotFound)?;
        let counts = self.sends.counts(id).await?;
        Ok((campaign, counts))
    }

    /// The polling payload read every couple of seconds by clients
    pub async fn campaign_progress(&self, id: Uuid) -> Result<CampaignProgress, CampaignError> {
        let campaign = self
            .campaigns
            .get(id)
            .await?
            .ok_or(CampaignError::NotFound)?;
        Ok(CampaignProgress::from(&campaign))
    }

    /// Campaign history, newest first, with computed delivery rates
    pub async fn list_campaigns(
        &self,
        status: Option<CampaignStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<CampaignSummary>, i64, bool), CampaignError> {
        let limit = limit.clamp(1, 100);
        let offset = offset.max(0);

        let campaigns = self.campaigns.list(status, limit, offset).await?;
        let total = self.campaigns.count(status).await?;

        let ids: Vec<Uuid> = campaigns.iter().map(|c| c.id).collect();
        let stats = self.sends.counts_for(&ids).await?;

        let summaries = campaigns
            .into_iter()
            .map(|campaign| {
                let counts = stats.get(&campaign.id).cloned().unwrap_or_default();
                CampaignSummary::build(campaign, counts)
            })
            .collect();

        let has_more = offset + limit < total;
        Ok((summaries, total, has_more))
    }

    /// Aggregate statistics across all campaigns
    pub async fn campaign_stats(&self) -> Result<CampaignAggregateStats, CampaignError> {
        Ok(self.campaigns.stats().await?)
    }
}

/// Background delivery worker for one campaign
struct CampaignWorker {
    campaigns: CampaignRepository,
    sends: CampaignSendRepository,
    mailer: Arc<dyn Mailer>,
    renderer: TemplateRenderer,
    batch_size: i64,
    batch_delay: Duration,
}

impl CampaignWorker {
    async fn run(self, campaign: Campaign) {
        match self.deliver(&campaign).await {
            Ok((sent, failed, status)) => {
                info!(
                    "Campaign {} finished: {} sent, {} failed ({})",
                    campaign.id, sent, failed, status
                );
            }
            Err(e) => {
                error!("Campaign {} worker failed: {}", campaign.id, e);
                if let Err(e) = self
                    .campaigns
                    .finalize(campaign.id, CampaignStatus::Failed)
                    .await
                {
                    error!("Campaign {} could not be marked failed: {}", campaign.id, e);
                }
            }
        }
    }

    /// Drain the pending sends batch by batch
    ///
    /// A rejected message fails only that recipient; a transport failure
    /// fails the rest of the batch, and the worker moves on to the next
    /// one after the usual delay.
    async fn deliver(
        &self,
        campaign: &Campaign,
    ) -> Result<(i64, i64, CampaignStatus), CampaignError> {
        let mut total_sent = 0i64;
        let mut total_failed = 0i64;
        let mut batch_index = 0usize;

        loop {
            let batch = self
                .sends
                .list_pending(campaign.id, self.batch_size)
                .await?;
            if batch.is_empty() {
                break;
            }
            if batch_index > 0 {
                sleep(self.batch_delay).await;
            }
            batch_index += 1;

            debug!(
                "Campaign {} batch {}: {} recipients",
                campaign.id,
                batch_index,
                batch.len()
            );

            let mut sent = 0i32;
            let mut failed = 0i32;

            for (index, send) in batch.iter().enumerate() {
                let email = self.render_send(campaign, send);
                match self.mailer.send(&email).await {
                    Ok(message_id) => {
                        self.sends.mark_sent(send.id, Some(&message_id)).await?;
                        sent += 1;
                    }
                    Err(MailerError::Message(message)) => {
                        warn!(
                            "Campaign {} send to {} failed: {}",
                            campaign.id, send.email, message
                        );
                        self.sends.mark_failed(send.id, &message).await?;
                        failed += 1;
                    }
                    Err(MailerError::Transport(message)) => {
                        error!(
                            "Campaign {} batch {} transport failure: {}",
                            campaign.id, batch_index, message
                        );
                        for remaining in &batch[index..] {
                            self.sends.mark_failed(remaining.id, &message).await?;
                            failed += 1;
                        }
                        break;
                    }
                }
            }

            self.campaigns
                .increment_counts(campaign.id, sent, failed)
                .await?;
            total_sent += i64::from(sent);
            total_failed += i64::from(failed);
        }

        let status = final_status(
            total_sent,
            total_failed,
            i64::from(campaign.total_recipients),
        );
        self.campaigns.finalize(campaign.id, status).await?;
        Ok((total_sent, total_failed, status))
    }

    fn render_send(&self, campaign: &Campaign, send: &CampaignSend) -> OutgoingEmail {
        let variant = send.variant.parse::<Variant>().unwrap_or(Variant::A);
        let subject = self
            .renderer
            .render_subject(&campaign.subject, &send.name, &send.email);
        let html_body = self.renderer.render_with_variant(
            DEFAULT_NEWSLETTER_BODY,
            &send.name,
            &send.email,
            variant,
            Some(campaign.id),
        );

        OutgoingEmail {
            to_email: send.email.clone(),
            to_name: send.name.clone(),
            subject,
            html_body,
        }
    }
}

/// Check structure, email shape and variant for every recipient,
/// dropping duplicate emails while keeping the first occurrence
fn normalize_recipients(
    recipients: &[NewCampaignRecipient],
) -> Result<Vec<CreateCampaignSend>, CampaignError> {
    let mut rows = Vec::with_capacity(recipients.len());
    let mut seen = HashSet::new();

    for recipient in recipients {
        if recipient.email.trim().is_empty()
            || recipient.name.trim().is_empty()
            || recipient.variant.trim().is_empty()
        {
            return Err(CampaignError::InvalidRecipientStructure);
        }

        let email = recipient.email.trim().to_lowercase();
        if email.parse::<EmailAddress>().is_err() {
            return Err(CampaignError::InvalidEmail(recipient.email.clone()));
        }

        let variant: Variant = recipient
            .variant
            .trim()
            .to_lowercase()
            .parse()
            .map_err(|_| CampaignError::InvalidVariant)?;

        if seen.insert(email.clone()) {
            rows.push(CreateCampaignSend {
                email,
                name: recipient.name.trim().to_string(),
                variant: variant.to_string(),
            });
        }
    }

    Ok(rows)
}

/// Final campaign status from the original failure-ratio rule
fn final_status(sent: i64, failed: i64, total: i64) -> CampaignStatus {
    if total > 0 && failed as f64 / total as f64 > 0.5 {
        CampaignStatus::Failed
    } else if sent > 0 {
        CampaignStatus::Completed
    } else {
        CampaignStatus::Failed
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn recipient(email: &str, name: &str, variant: &str) -> NewCampaignRecipient {
        NewCampaignRecipient {
            email: email.to_string(),
            name: name.to_string(),
            variant: variant.to_string(),
        }
    }

    #[test]
    fn test_normalize_recipients() {
        let rows = normalize_recipients(&[
            recipient("Anna@Example.com ", "Anna", "A"),
            recipient("bela@example.com", "Béla", "b"),
        ])
        .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].email, "anna@example.com");
        assert_eq!(rows[0].variant, "a");
        assert_eq!(rows[1].variant, "b");
    }

    #[test]
    fn test_normalize_drops_duplicate_emails() {
        let rows = normalize_recipients(&[
            recipient("anna@example.com", "Anna", "a"),
            recipient("ANNA@example.com", "Second Anna", "b"),
        ])
        .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Anna");
    }

    #[test]
    fn test_normalize_rejects_incomplete_recipient() {
        let result = normalize_recipients(&[recipient("anna@example.com", "", "a")]);
        assert!(matches!(
            result,
            Err(CampaignError::InvalidRecipientStructure)
        ));
    }

    #[test]
    fn test_normalize_rejects_bad_email() {
        let result = normalize_recipients(&[recipient("not-an-email", "Anna", "a")]);
        assert!(matches!(result, Err(CampaignError::InvalidEmail(_))));
    }

    #[test]
    fn test_normalize_rejects_bad_variant() {
        let result = normalize_recipients(&[recipient("anna@example.com", "Anna", "d")]);
        assert!(matches!(result, Err(CampaignError::InvalidVariant)));
    }

    #[test]
    fn test_final_status() {
        assert_eq!(final_status(10, 0, 10), CampaignStatus::Completed);
        // exactly half failed still completes
        assert_eq!(final_status(5, 5, 10), CampaignStatus::Completed);
        assert_eq!(final_status(4, 6, 10), CampaignStatus::Failed);
        assert_eq!(final_status(0, 0, 10), CampaignStatus::Failed);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(2.0 / 3.0 * 100.0), 66.67);
        assert_eq!(round2(50.0), 50.0);
        assert_eq!(round2(33.333), 33.33);
    }

    #[test]
    fn test_summary_rates_fall_back_to_counters() {
        let campaign = Campaign {
            id: Uuid::new_v4(),
            name: "Tavaszi hírlevél".to_string(),
            subject: "{{name}}, itt az ajánlatod".to_string(),
            template_variant: "a".to_string(),
            status: "completed".to_string(),
            total_recipients: 200,
            sent_count: 150,
            failed_count: 50,
            started_at: None,
            completed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        // No send rows aggregated yet, counters drive the rates
        let summary = CampaignSummary::build(campaign.clone(), CampaignSendCounts::default());
        assert_eq!(summary.success_rate, 75.0);
        assert_eq!(summary.failure_rate, 25.0);
        assert_eq!(summary.actual_sent, 0);

        // Aggregates win once present
        let counts = CampaignSendCounts {
            pending: 0,
            sent: 120,
            failed: 80,
        };
        let summary = CampaignSummary::build(campaign, counts);
        assert_eq!(summary.success_rate, 60.0);
        assert_eq!(summary.failure_rate, 40.0);
        assert_eq!(summary.actual_sent, 120);
    }
}
