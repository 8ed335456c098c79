//! Database models

use chrono::{DateTime, Utc};
use sendloop_common::types::{CampaignId, JobId, RecipientId, RecipientListId, TemplateId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Bulk send job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Paused,
    Completed,
    Failed,
}

impl JobStatus {
    /// Terminal states never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Paused => write!(f, "paused"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "paused" => Ok(JobStatus::Paused),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

/// Bulk send job model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub subject: String,
    pub html_content: String,
    pub total_recipients: i32,
    pub sent_count: i32,
    pub failed_count: i32,
    pub skipped_count: i32,
    pub status: String,
    pub current_batch: i32,
    pub total_batches: i32,
    pub batch_size: i32,
    pub delay_between_batches_ms: i64,
    pub error_log: serde_json::Value,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Get status enum
    pub fn status_enum(&self) -> Option<JobStatus> {
        self.status.parse().ok()
    }

    /// Whether the job has reached a terminal status
    pub fn is_terminal(&self) -> bool {
        self.status_enum().map_or(false, |s| s.is_terminal())
    }

    /// Recipients still waiting for an outcome
    pub fn pending_count(&self) -> i32 {
        (self.total_recipients - self.sent_count - self.failed_count).max(0)
    }

    /// Calculate progress percentage
    pub fn progress_percentage(&self) -> f64 {
        if self.total_recipients == 0 {
            0.0
        } else {
            ((self.sent_count + self.failed_count) as f64 / self.total_recipients as f64) * 100.0
        }
    }
}

/// Create job input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJob {
    pub subject: String,
    pub html_content: String,
    pub total_recipients: i32,
    pub skipped_count: i32,
    pub total_batches: i32,
    pub batch_size: i32,
    pub delay_between_batches_ms: i64,
}

/// Job recipient status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientStatus {
    Pending,
    Processing,
    Sent,
    Failed,
    Skipped,
}

impl std::fmt::Display for RecipientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecipientStatus::Pending => write!(f, "pending"),
            RecipientStatus::Processing => write!(f, "processing"),
            RecipientStatus::Sent => write!(f, "sent"),
            RecipientStatus::Failed => write!(f, "failed"),
            RecipientStatus::Skipped => write!(f, "skipped"),
        }
    }
}

impl std::str::FromStr for RecipientStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RecipientStatus::Pending),
            "processing" => Ok(RecipientStatus::Processing),
            "sent" => Ok(RecipientStatus::Sent),
            "failed" => Ok(RecipientStatus::Failed),
            "skipped" => Ok(RecipientStatus::Skipped),
            _ => Err(format!("Invalid recipient status: {}", s)),
        }
    }
}

/// Job recipient model, one row per queued address
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct JobRecipient {
    pub id: RecipientId,
    pub job_id: JobId,
    pub email: String,
    pub name: String,
    pub variant: String,
    pub batch_number: i32,
    pub status: String,
    pub error_message: Option<String>,
    pub message_id: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl JobRecipient {
    /// Get status enum
    pub fn status_enum(&self) -> Option<RecipientStatus> {
        self.status.parse().ok()
    }
}

/// Create job recipient input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJobRecipient {
    pub email: String,
    pub name: String,
    pub variant: String,
    pub batch_number: i32,
}

/// Recipient list model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RecipientList {
    pub id: RecipientListId,
    pub name: String,
    pub description: Option<String>,
    pub total_recipients: i32,
    pub variant_distribution: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create recipient list input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecipientList {
    pub name: String,
    pub description: Option<String>,
    pub variant_distribution: serde_json::Value,
}

/// Stored recipient within a list
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ListRecipient {
    pub id: RecipientId,
    pub recipient_list_id: RecipientListId,
    pub name: String,
    pub email: String,
    pub variant: String,
    pub result_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Create list recipient input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateListRecipient {
    pub name: String,
    pub email: String,
    pub variant: String,
    pub result_id: Option<String>,
}

/// Newsletter campaign status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Sending,
    Completed,
    Failed,
}

impl CampaignStatus {
    /// Terminal states never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(self, CampaignStatus::Completed | CampaignStatus::Failed)
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CampaignStatus::Draft => write!(f, "draft"),
            CampaignStatus::Sending => write!(f, "sending"),
            CampaignStatus::Completed => write!(f, "completed"),
            CampaignStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for CampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(CampaignStatus::Draft),
            "sending" => Ok(CampaignStatus::Sending),
            "completed" => Ok(CampaignStatus::Completed),
            "failed" => Ok(CampaignStatus::Failed),
            _ => Err(format!("Invalid campaign status: {}", s)),
        }
    }
}

/// Newsletter campaign model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub name: String,
    pub subject: String,
    pub template_variant: String,
    pub status: String,
    pub total_recipients: i32,
    pub sent_count: i32,
    pub failed_count: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Get status enum
    pub fn status_enum(&self) -> Option<CampaignStatus> {
        self.status.parse().ok()
    }

    /// Calculate progress percentage
    pub fn progress_percentage(&self) -> f64 {
        if self.total_recipients == 0 {
            0.0
        } else {
            ((self.sent_count + self.failed_count) as f64 / self.total_recipients as f64) * 100.0
        }
    }
}

/// Create campaign input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCampaign {
    pub name: String,
    pub subject: String,
    pub template_variant: String,
    pub total_recipients: i32,
}

/// Campaign send status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendStatus {
    Pending,
    Sent,
    Failed,
}

impl std::fmt::Display for SendStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendStatus::Pending => write!(f, "pending"),
            SendStatus::Sent => write!(f, "sent"),
            SendStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for SendStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SendStatus::Pending),
            "sent" => Ok(SendStatus::Sent),
            "failed" => Ok(SendStatus::Failed),
            _ => Err(format!("Invalid send status: {}", s)),
        }
    }
}

/// Per-recipient campaign send record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CampaignSend {
    pub id: RecipientId,
    pub campaign_id: CampaignId,
    pub email: String,
    pub name: String,
    pub variant: String,
    pub status: String,
    pub message_id: Option<String>,
    pub error_message: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CampaignSend {
    /// Get status enum
    pub fn status_enum(&self) -> Option<SendStatus> {
        self.status.parse().ok()
    }
}

/// Create campaign send input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCampaignSend {
    pub email: String,
    pub name: String,
    pub variant: String,
}

/// Stored email template
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    pub subject: String,
    pub html_content: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create template input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTemplate {
    pub name: String,
    pub subject: String,
    pub html_content: String,
    pub is_default: bool,
}

/// Update template input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTemplate {
    pub name: Option<String>,
    pub subject: Option<String>,
    pub html_content: Option<String>,
    pub is_default: Option<bool>,
}

/// Unsubscribe record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Unsubscribe {
    pub id: uuid::Uuid,
    pub email: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn job_fixture() -> Job {
        Job {
            id: uuid::Uuid::new_v4(),
            subject: "Hello".to_string(),
            html_content: "<p>Hi</p>".to_string(),
            total_recipients: 10,
            sent_count: 4,
            failed_count: 1,
            skipped_count: 0,
            status: "processing".to_string(),
            current_batch: 1,
            total_batches: 2,
            batch_size: 5,
            delay_between_batches_ms: 10_000,
            error_log: serde_json::json!([]),
            started_at: None,
            completed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_job_status_roundtrip() {
        for s in ["pending", "processing", "paused", "completed", "failed"] {
            let status: JobStatus = s.parse().unwrap();
            assert_eq!(status.to_string(), s);
        }
        assert!("cancelled".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_job_terminal_states() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(!JobStatus::Paused.is_terminal());
    }

    #[test]
    fn test_job_pending_count_conservation() {
        let job = job_fixture();
        assert_eq!(
            job.pending_count() + job.sent_count + job.failed_count,
            job.total_recipients
        );
    }

    #[test]
    fn test_job_progress_percentage() {
        let mut job = job_fixture();
        assert_eq!(job.progress_percentage(), 50.0);

        job.total_recipients = 0;
        assert_eq!(job.progress_percentage(), 0.0);
    }

    #[test]
    fn test_campaign_status_roundtrip() {
        for s in ["draft", "sending", "completed", "failed"] {
            let status: CampaignStatus = s.parse().unwrap();
            assert_eq!(status.to_string(), s);
        }
        assert!("paused".parse::<CampaignStatus>().is_err());
    }

    #[test]
    fn test_send_status_roundtrip() {
        for s in ["pending", "sent", "failed"] {
            let status: SendStatus = s.parse().unwrap();
            assert_eq!(status.to_string(), s);
        }
    }
}
