//! Job Manager - Bulk send job lifecycle and batch processing

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use sendloop_common::config::Config;
use sendloop_common::types::{EmailAddress, Variant};
use sendloop_storage::db::DatabasePool;
use sendloop_storage::models::{CreateJob, CreateJobRecipient, Job, JobRecipient, JobStatus};
use sendloop_storage::repository::{
    JobRecipientCounts, JobRecipientRepository, JobRepository, UnsubscribeRepository,
};

use super::transport::{Mailer, MailerError, OutgoingEmail};
use crate::newsletter::TemplateRenderer;

/// Job manager errors
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Recipients array is required and must not be empty")]
    NoRecipients,

    #[error("Subject and HTML content are required")]
    MissingFields,

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Batch size must be positive and delay non-negative")]
    InvalidBatchConfig,

    #[error("All recipients are unsubscribed. No emails to send.")]
    AllUnsubscribed,

    #[error("An active job already exists")]
    ActiveJobExists,

    #[error("Job not found")]
    JobNotFound,

    #[error("Job is {0}, not processing")]
    NotProcessing(String),

    #[error("Cannot {action} a job in status {status}")]
    InvalidAction {
        action: &'static str,
        status: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl DispatchError {
    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::NoRecipients => "NO_RECIPIENTS",
            DispatchError::MissingFields => "MISSING_REQUIRED_FIELDS",
            DispatchError::InvalidEmail(_) => "INVALID_EMAIL",
            DispatchError::InvalidBatchConfig => "INVALID_BATCH_CONFIG",
            DispatchError::AllUnsubscribed => "ALL_RECIPIENTS_UNSUBSCRIBED",
            DispatchError::ActiveJobExists => "ACTIVE_JOB_EXISTS",
            DispatchError::JobNotFound => "JOB_NOT_FOUND",
            DispatchError::NotProcessing(_) => "JOB_NOT_PROCESSING",
            DispatchError::InvalidAction { .. } => "INVALID_ACTION",
            DispatchError::Database(_) => "DATABASE_ERROR",
            DispatchError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// One recipient of a new job
#[derive(Debug, Clone)]
pub struct NewJobRecipient {
    pub email: String,
    pub name: String,
    pub variant: Variant,
}

/// Input for creating a bulk send job
#[derive(Debug, Clone)]
pub struct NewJob {
    pub subject: String,
    pub html_content: String,
    pub recipients: Vec<NewJobRecipient>,
    pub batch_size: Option<i32>,
    pub delay_between_batches_ms: Option<i64>,
}

/// Summary of a freshly created job
#[derive(Debug, Clone, Serialize)]
pub struct JobCreated {
    pub job_id: Uuid,
    pub total_recipients: i32,
    pub total_batches: i32,
    pub estimated_time_minutes: i64,
}

/// Result of processing one batch
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub batch_number: i32,
    pub sent: i32,
    pub failed: i32,
    pub job_completed: bool,
    /// Milliseconds until the next batch should run; None when done
    pub next_batch_in: Option<i64>,
}

/// Job Manager - owns the bulk send job lifecycle
pub struct JobManager {
    jobs: JobRepository,
    recipients: JobRecipientRepository,
    unsubscribes: UnsubscribeRepository,
    mailer: Arc<dyn Mailer>,
    renderer: TemplateRenderer,
    default_batch_size: i32,
    default_delay_ms: i64,
}

impl JobManager {
    /// Create a new job manager
    pub fn new(db_pool: DatabasePool, mailer: Arc<dyn Mailer>, config: &Config) -> Self {
        let pool = db_pool.pool().clone();
        Self {
            jobs: JobRepository::new(pool.clone()),
            recipients: JobRecipientRepository::new(pool.clone()),
            unsubscribes: UnsubscribeRepository::new(pool),
            mailer,
            renderer: TemplateRenderer::new(config.sender.unsubscribe_base_url.clone()),
            default_batch_size: config.limits.default_batch_size,
            default_delay_ms: config.limits.default_delay_between_batches_ms,
        }
    }

    /// Create a job and queue its recipients
    ///
    /// Unsubscribed recipients are filtered out up front and counted as
    /// skipped. Creation does not start dispatch.
    pub async fn create_job(&self, input: NewJob) -> Result<JobCreated, DispatchError> {
        if input.recipients.is_empty() {
            return Err(DispatchError::NoRecipients);
        }
        if input.subject.trim().is_empty() || input.html_content.trim().is_empty() {
            return Err(DispatchError::MissingFields);
        }

        let batch_size = input.batch_size.unwrap_or(self.default_batch_size);
        let delay_ms = input
            .delay_between_batches_ms
            .unwrap_or(self.default_delay_ms);
        if batch_size < 1 || delay_ms < 0 {
            return Err(DispatchError::InvalidBatchConfig);
        }

        let mut normalized = Vec::with_capacity(input.recipients.len());
        for recipient in &input.recipients {
            let email = recipient.email.trim().to_lowercase();
            if email.parse::<EmailAddress>().is_err() {
                return Err(DispatchError::InvalidEmail(recipient.email.clone()));
            }
            normalized.push((email, recipient.name.trim().to_string(), recipient.variant));
        }

        if self.jobs.get_active().await?.is_some() {
            return Err(DispatchError::ActiveJobExists);
        }

        let emails: Vec<String> = normalized.iter().map(|(email, _, _)| email.clone()).collect();
        let unsubscribed: HashSet<String> = self
            .unsubscribes
            .filter_unsubscribed(&emails)
            .await?
            .into_iter()
            .collect();

        let queued: Vec<_> = normalized
            .into_iter()
            .filter(|(email, _, _)| !unsubscribed.contains(email))
            .collect();
        let skipped = emails.len() - queued.len();
        if queued.is_empty() {
            return Err(DispatchError::AllUnsubscribed);
        }

        let total_batches = total_batches(queued.len(), batch_size);
        let estimated_time_minutes = estimate_minutes(total_batches, delay_ms);

        let rows: Vec<CreateJobRecipient> = queued
            .iter()
            .enumerate()
            .map(|(index, (email, name, variant))| CreateJobRecipient {
                email: email.clone(),
                name: name.clone(),
                variant: variant.to_string(),
                batch_number: index as i32 / batch_size,
            })
            .collect();

        let job = self
            .jobs
            .create_with_recipients(
                CreateJob {
                    subject: input.subject,
                    html_content: input.html_content,
                    total_recipients: queued.len() as i32,
                    skipped_count: skipped as i32,
                    total_batches,
                    batch_size,
                    delay_between_batches_ms: delay_ms,
                },
                rows,
            )
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DispatchError::ActiveJobExists
                } else {
                    DispatchError::Database(e)
                }
            })?;

        info!(
            "Job {} created: {} recipients in {} batches ({} skipped)",
            job.id, job.total_recipients, total_batches, skipped
        );

        Ok(JobCreated {
            job_id: job.id,
            total_recipients: job.total_recipients,
            total_batches,
            estimated_time_minutes,
        })
    }

    /// Start a pending job
    pub async fn start(&self, job_id: Uuid) -> Result<Job, DispatchError> {
        let job = self
            .jobs
            .get(job_id)
            .await?
            .ok_or(DispatchError::JobNotFound)?;

        match self.jobs.mark_started(job_id).await? {
            Some(updated) => {
                info!("Job {} started", job_id);
                Ok(updated)
            }
            None => Err(DispatchError::InvalidAction {
                action: "start",
                status: job.status,
            }),
        }
    }

    /// Pause a processing job; the in-flight batch completes first
    pub async fn pause(&self, job_id: Uuid) -> Result<Job, DispatchError> {
        let job = self
            .jobs
            .get(job_id)
            .await?
            .ok_or(DispatchError::JobNotFound)?;

        match self.jobs.mark_paused(job_id).await? {
            Some(updated) => {
                info!("Job {} paused", job_id);
                Ok(updated)
            }
            None => Err(DispatchError::InvalidAction {
                action: "pause",
                status: job.status,
            }),
        }
    }

    /// Resume a paused job
    pub async fn resume(&self, job_id: Uuid) -> Result<Job, DispatchError> {
        let job = self
            .jobs
            .get(job_id)
            .await?
            .ok_or(DispatchError::JobNotFound)?;

        match self.jobs.mark_resumed(job_id).await? {
            Some(updated) => {
                info!("Job {} resumed", job_id);
                Ok(updated)
            }
            None => Err(DispatchError::InvalidAction {
                action: "resume",
                status: job.status,
            }),
        }
    }

    /// Cancel a non-terminal job; it lands in 'failed'
    pub async fn cancel(&self, job_id: Uuid) -> Result<Job, DispatchError> {
        let job = self
            .jobs
            .get(job_id)
            .await?
            .ok_or(DispatchError::JobNotFound)?;

        match self.jobs.mark_cancelled(job_id).await? {
            Some(updated) => {
                info!("Job {} cancelled", job_id);
                Ok(updated)
            }
            None => Err(DispatchError::InvalidAction {
                action: "cancel",
                status: job.status,
            }),
        }
    }

    /// Get a job by ID
    pub async fn get_job(&self, job_id: Uuid) -> Result<Job, DispatchError> {
        self.jobs
            .get(job_id)
            .await?
            .ok_or(DispatchError::JobNotFound)
    }

    /// The non-terminal job, if one exists
    pub async fn active_job(&self) -> Result<Option<Job>, DispatchError> {
        Ok(self.jobs.get_active().await?)
    }

    /// The 20 newest jobs plus the active one, if any
    pub async fn job_overview(&self) -> Result<(Vec<Job>, Option<Job>), DispatchError> {
        let jobs = self.jobs.list_recent(20).await?;
        let active = self.jobs.get_active().await?;
        Ok((jobs, active))
    }

    /// A job with its per-status recipient counts
    pub async fn job_stats(
        &self,
        job_id: Uuid,
    ) -> Result<(Job, JobRecipientCounts), DispatchError> {
        let job = self
            .jobs
            .get(job_id)
            .await?
            .ok_or(DispatchError::JobNotFound)?;
        let counts = self.recipients.counts(job_id).await?;
        Ok((job, counts))
    }

    /// Delete a job that is not mid-dispatch
    pub async fn delete_job(&self, job_id: Uuid) -> Result<(), DispatchError> {
        let job = self
            .jobs
            .get(job_id)
            .await?
            .ok_or(DispatchError::JobNotFound)?;

        if job.status_enum() == Some(JobStatus::Processing) {
            return Err(DispatchError::InvalidAction {
                action: "delete",
                status: job.status,
            });
        }

        self.jobs.delete(job_id).await?;
        info!("Job {} deleted", job_id);
        Ok(())
    }

    /// Claim and send the next batch of a processing job
    ///
    /// Claims are atomic, so concurrent calls obtain disjoint recipient
    /// sets and resumption never re-sends a claimed row.
    pub async fn process_next_batch(&self, job_id: Uuid) -> Result<BatchOutcome, DispatchError> {
        let job = self
            .jobs
            .get(job_id)
            .await?
            .ok_or(DispatchError::JobNotFound)?;
        if job.status_enum() != Some(JobStatus::Processing) {
            return Err(DispatchError::NotProcessing(job.status));
        }

        let claimed = self
            .recipients
            .claim_pending(job_id, job.batch_size as i64)
            .await?;

        if claimed.is_empty() {
            return self.finish_when_drained(job_id).await;
        }

        let batch_number = claimed[0].batch_number;
        let mut sent = 0i32;
        let mut failed = 0i32;
        let mut errors: Vec<serde_json::Value> = Vec::new();

        for (index, recipient) in claimed.iter().enumerate() {
            let email = self.render_outgoing(&job, recipient);
            match self.mailer.send(&email).await {
                Ok(message_id) => {
                    self.recipients
                        .mark_sent(recipient.id, Some(&message_id))
                        .await?;
                    sent += 1;
                }
                Err(MailerError::Message(message)) => {
                    warn!("Job {} send to {} failed: {}", job_id, recipient.email, message);
                    self.recipients.mark_failed(recipient.id, &message).await?;
                    errors.push(serde_json::json!({
                        "email": recipient.email,
                        "error": message,
                    }));
                    failed += 1;
                }
                Err(MailerError::Transport(message)) => {
                    return self
                        .fail_on_transport(
                            &job,
                            &claimed[index..],
                            batch_number,
                            sent,
                            failed,
                            errors,
                            message,
                        )
                        .await;
                }
            }
        }

        self.jobs
            .record_batch_outcome(job_id, sent, failed, serde_json::Value::Array(errors))
            .await?;

        let pending = self.recipients.count_pending(job_id).await?;
        if pending == 0 {
            self.jobs.finalize(job_id, JobStatus::Completed).await?;
            info!(
                "Job {} completed: final batch {} sent, {} failed",
                job_id, sent, failed
            );
            return Ok(BatchOutcome {
                batch_number,
                sent,
                failed,
                job_completed: true,
                next_batch_in: None,
            });
        }

        Ok(BatchOutcome {
            batch_number,
            sent,
            failed,
            job_completed: false,
            next_batch_in: Some(job.delay_between_batches_ms),
        })
    }

    /// Resolve an empty claim: either the job drained or it raced a
    /// status change or concurrent claim
    async fn finish_when_drained(&self, job_id: Uuid) -> Result<BatchOutcome, DispatchError> {
        let job = self
            .jobs
            .get(job_id)
            .await?
            .ok_or(DispatchError::JobNotFound)?;
        if job.status_enum() != Some(JobStatus::Processing) {
            return Err(DispatchError::NotProcessing(job.status));
        }

        let pending = self.recipients.count_pending(job_id).await?;
        if pending > 0 {
            // A concurrent call holds the claim; try again after the delay
            return Ok(BatchOutcome {
                batch_number: job.current_batch,
                sent: 0,
                failed: 0,
                job_completed: false,
                next_batch_in: Some(job.delay_between_batches_ms),
            });
        }

        self.jobs.finalize(job_id, JobStatus::Completed).await?;
        info!("Job {} completed", job_id);
        Ok(BatchOutcome {
            batch_number: job.current_batch,
            sent: 0,
            failed: 0,
            job_completed: true,
            next_batch_in: None,
        })
    }

    /// Fail the remaining claimed rows and the job after a transport error
    async fn fail_on_transport(
        &self,
        job: &Job,
        unsent: &[JobRecipient],
        batch_number: i32,
        sent: i32,
        mut failed: i32,
        mut errors: Vec<serde_json::Value>,
        message: String,
    ) -> Result<BatchOutcome, DispatchError> {
        error!("Job {} transport failure: {}", job.id, message);

        let ids: Vec<Uuid> = unsent.iter().map(|r| r.id).collect();
        failed += self.recipients.mark_failed_many(&ids, &message).await? as i32;
        errors.push(serde_json::json!({
            "batch": format!("Batch {}", batch_number),
            "error": message,
        }));

        self.jobs
            .record_batch_outcome(job.id, sent, failed, serde_json::Value::Array(errors))
            .await?;
        self.jobs.finalize(job.id, JobStatus::Failed).await?;

        Ok(BatchOutcome {
            batch_number,
            sent,
            failed,
            job_completed: true,
            next_batch_in: None,
        })
    }

    fn render_outgoing(&self, job: &Job, recipient: &JobRecipient) -> OutgoingEmail {
        let subject =
            self.renderer
                .render_subject(&job.subject, &recipient.name, &recipient.email);
        let html_body =
            self.renderer
                .render(&job.html_content, &recipient.name, &recipient.email, None);

        OutgoingEmail {
            to_email: recipient.email.clone(),
            to_name: recipient.name.clone(),
            subject,
            html_body,
        }
    }
}

/// Number of batches needed for `queued` recipients
fn total_batches(queued: usize, batch_size: i32) -> i32 {
    let size = batch_size.max(1) as usize;
    ((queued + size - 1) / size) as i32
}

/// Whole minutes the inter-batch delays add up to, rounded up
fn estimate_minutes(total_batches: i32, delay_ms: i64) -> i64 {
    let total_ms = i64::from(total_batches) * delay_ms;
    (total_ms + 59_999) / 60_000
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(e) if e.code().as_deref() == Some("23505"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_total_batches() {
        assert_eq!(total_batches(50, 100), 1);
        assert_eq!(total_batches(100, 100), 1);
        assert_eq!(total_batches(101, 100), 2);
        assert_eq!(total_batches(250, 100), 3);
        assert_eq!(total_batches(1, 1), 1);
    }

    #[test]
    fn test_batch_number_assignment() {
        let batch_size = 100;
        let numbers: Vec<i32> = (0..250).map(|index| index / batch_size).collect();

        assert_eq!(numbers[0], 0);
        assert_eq!(numbers[99], 0);
        assert_eq!(numbers[100], 1);
        assert_eq!(numbers[199], 1);
        assert_eq!(numbers[200], 2);
        assert_eq!(numbers[249], 2);
    }

    #[test]
    fn test_estimate_minutes() {
        // 10 batches with a 10 s delay round up to 2 minutes
        assert_eq!(estimate_minutes(10, 10_000), 2);
        // exactly one minute stays one minute
        assert_eq!(estimate_minutes(6, 10_000), 1);
        assert_eq!(estimate_minutes(1, 500), 1);
        assert_eq!(estimate_minutes(3, 0), 0);
    }
}
