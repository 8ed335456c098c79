//! Bulk send job handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use sendloop_common::types::Variant;
use sendloop_core::{BatchOutcome, JobCreated, NewJob, NewJobRecipient};
use sendloop_storage::models::Job;
use sendloop_storage::JobRecipientCounts;

use crate::auth::AppState;
use crate::error::{dispatch_rejection, error_response, ApiRejection, ApiResponse};

/// One recipient in a job submission
#[derive(Debug, Deserialize)]
pub struct JobRecipientPayload {
    pub email: String,
    #[serde(default)]
    pub name: String,
    /// Content variant; assigned round-robin when missing
    pub variant: Option<String>,
}

/// Request body for creating a job
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    pub recipients: Vec<JobRecipientPayload>,
    pub subject: String,
    pub html_content: String,
    pub batch_size: Option<i32>,
    pub delay_between_batches_ms: Option<i64>,
}

/// Response payload for a created job
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCreatedResponse {
    pub job_id: Uuid,
    pub total_recipients: i32,
    pub total_batches: i32,
    pub estimated_time_minutes: i64,
    pub message: String,
}

impl From<JobCreated> for JobCreatedResponse {
    fn from(created: JobCreated) -> Self {
        let message = format!(
            "Job created! {} emails queued in {} batches. Estimated time: ~{} minutes.",
            created.total_recipients, created.total_batches, created.estimated_time_minutes
        );
        Self {
            job_id: created.job_id,
            total_recipients: created.total_recipients,
            total_batches: created.total_batches,
            estimated_time_minutes: created.estimated_time_minutes,
            message,
        }
    }
}

/// Response payload for the job list
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOverviewResponse {
    pub jobs: Vec<Job>,
    pub active_job: Option<Job>,
}

/// Per-status recipient counts as reported to clients
#[derive(Debug, Serialize)]
pub struct JobStatsPayload {
    pub pending: i64,
    pub sent: i64,
    pub failed: i64,
    pub skipped: i64,
}

impl From<JobRecipientCounts> for JobStatsPayload {
    fn from(counts: JobRecipientCounts) -> Self {
        Self {
            // Claimed rows are still awaiting an outcome
            pending: counts.pending + counts.processing,
            sent: counts.sent,
            failed: counts.failed,
            skipped: counts.skipped,
        }
    }
}

/// Response payload for a single job with its recipient stats
#[derive(Debug, Serialize)]
pub struct JobDetailResponse {
    pub job: Job,
    pub stats: JobStatsPayload,
}

/// Request body for job lifecycle actions
#[derive(Debug, Deserialize)]
pub struct JobActionRequest {
    pub action: String,
}

/// Response payload for a job lifecycle action
#[derive(Debug, Serialize)]
pub struct JobActionResponse {
    pub job: Job,
    pub message: String,
}

/// Response payload for processing one batch
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcomeResponse {
    pub batch_number: i32,
    pub sent: i32,
    pub failed: i32,
    pub job_completed: bool,
    pub next_batch_in: Option<i64>,
}

impl From<BatchOutcome> for BatchOutcomeResponse {
    fn from(outcome: BatchOutcome) -> Self {
        Self {
            batch_number: outcome.batch_number,
            sent: outcome.sent,
            failed: outcome.failed,
            job_completed: outcome.job_completed,
            next_batch_in: outcome.next_batch_in,
        }
    }
}

/// Confirmation message payload
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// POST /api/v1/bulk-sender/jobs
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<ApiResponse<JobCreatedResponse>>), ApiRejection> {
    let mut recipients = Vec::with_capacity(request.recipients.len());
    for (index, payload) in request.recipients.into_iter().enumerate() {
        let variant = match payload.variant.as_deref() {
            Some(value) => value.trim().to_lowercase().parse::<Variant>().map_err(|_| {
                error_response(
                    StatusCode::BAD_REQUEST,
                    format!("Invalid variant: {}", value),
                    "INVALID_VARIANT",
                )
            })?,
            None => Variant::from_index(index),
        };
        recipients.push(NewJobRecipient {
            email: payload.email,
            name: payload.name,
            variant,
        });
    }

    let created = state
        .jobs
        .create_job(NewJob {
            subject: request.subject,
            html_content: request.html_content,
            recipients,
            batch_size: request.batch_size,
            delay_between_batches_ms: request.delay_between_batches_ms,
        })
        .await
        .map_err(dispatch_rejection)?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(JobCreatedResponse::from(created)),
    ))
}

/// GET /api/v1/bulk-sender/jobs
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<JobOverviewResponse>>, ApiRejection> {
    let (jobs, active_job) = state.jobs.job_overview().await.map_err(dispatch_rejection)?;

    Ok(ApiResponse::ok(JobOverviewResponse { jobs, active_job }))
}

/// GET /api/v1/bulk-sender/jobs/:id
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<ApiResponse<JobDetailResponse>>, ApiRejection> {
    let (job, counts) = state.jobs.job_stats(job_id).await.map_err(dispatch_rejection)?;

    Ok(ApiResponse::ok(JobDetailResponse {
        job,
        stats: counts.into(),
    }))
}

/// PATCH /api/v1/bulk-sender/jobs/:id
pub async fn update_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
    Json(request): Json<JobActionRequest>,
) -> Result<Json<ApiResponse<JobActionResponse>>, ApiRejection> {
    let (job, message) = match request.action.as_str() {
        "start" => {
            let job = state.jobs.start(job_id).await.map_err(dispatch_rejection)?;
            state.registry.start(job_id).await;
            if let Err(e) = state.watcher.monitor(job_id).await {
                warn!("Failed to start progress monitor for job {}: {}", job_id, e);
            }
            (job, "Job started successfully")
        }
        "pause" => {
            let job = state.jobs.pause(job_id).await.map_err(dispatch_rejection)?;
            state.registry.pause(job_id).await;
            (job, "Job paused successfully")
        }
        "resume" => {
            let job = state.jobs.resume(job_id).await.map_err(dispatch_rejection)?;
            state.registry.resume(job_id).await;
            (job, "Job resumed successfully")
        }
        "cancel" => {
            let job = state.jobs.cancel(job_id).await.map_err(dispatch_rejection)?;
            state.registry.stop(job_id).await;
            (job, "Job cancelled successfully")
        }
        _ => {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                "Invalid action",
                "INVALID_ACTION",
            ))
        }
    };

    Ok(ApiResponse::ok(JobActionResponse {
        job,
        message: message.to_string(),
    }))
}

/// POST /api/v1/bulk-sender/jobs/:id/process
///
/// Drives one batch. With auto drive enabled the in-process loop calls
/// the same manager method; the claim query keeps the two from sending
/// the same recipient twice.
pub async fn process_batch(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<ApiResponse<BatchOutcomeResponse>>, ApiRejection> {
    let outcome = state
        .jobs
        .process_next_batch(job_id)
        .await
        .map_err(dispatch_rejection)?;

    Ok(ApiResponse::ok(outcome.into()))
}

/// DELETE /api/v1/bulk-sender/jobs/:id
pub async fn delete_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiRejection> {
    state.jobs.delete_job(job_id).await.map_err(dispatch_rejection)?;

    Ok(ApiResponse::ok(MessageResponse {
        message: "Job deleted successfully".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_created_response_is_camel_case() {
        let created = JobCreated {
            job_id: Uuid::nil(),
            total_recipients: 150,
            total_batches: 2,
            estimated_time_minutes: 1,
        };
        let value = serde_json::to_value(JobCreatedResponse::from(created)).unwrap();

        assert_eq!(value["totalRecipients"], 150);
        assert_eq!(value["totalBatches"], 2);
        assert_eq!(value["estimatedTimeMinutes"], 1);
        assert_eq!(
            value["message"],
            "Job created! 150 emails queued in 2 batches. Estimated time: ~1 minutes."
        );
    }

    #[test]
    fn test_stats_fold_claimed_rows_into_pending() {
        let stats = JobStatsPayload::from(JobRecipientCounts {
            pending: 40,
            processing: 10,
            sent: 45,
            failed: 5,
            skipped: 3,
        });

        assert_eq!(stats.pending, 50);
        assert_eq!(stats.sent, 45);
        assert_eq!(stats.failed, 5);
        assert_eq!(stats.skipped, 3);
    }

    #[test]
    fn test_batch_outcome_field_names() {
        let outcome = BatchOutcome {
            batch_number: 3,
            sent: 98,
            failed: 2,
            job_completed: false,
            next_batch_in: Some(10_000),
        };
        let value = serde_json::to_value(BatchOutcomeResponse::from(outcome)).unwrap();

        assert_eq!(value["batchNumber"], 3);
        assert_eq!(value["jobCompleted"], false);
        assert_eq!(value["nextBatchIn"], 10_000);
    }

    #[test]
    fn test_create_request_parses_camel_case() {
        let request: CreateJobRequest = serde_json::from_str(
            r#"{
                "recipients": [{"email": "a@b.co", "name": "A", "variant": "b"}],
                "subject": "Hello",
                "htmlContent": "<p>Hi</p>",
                "batchSize": 50,
                "delayBetweenBatchesMs": 5000
            }"#,
        )
        .unwrap();

        assert_eq!(request.recipients.len(), 1);
        assert_eq!(request.recipients[0].variant.as_deref(), Some("b"));
        assert_eq!(request.batch_size, Some(50));
        assert_eq!(request.delay_between_batches_ms, Some(5000));
    }
}
