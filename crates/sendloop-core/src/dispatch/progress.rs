//! Progress Watcher - Periodic job progress snapshots over a watch channel

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{info, warn};
use uuid::Uuid;

use sendloop_storage::models::{Job, JobStatus};

use super::manager::{DispatchError, JobManager};

/// Point-in-time progress of a job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub status: String,
    pub total: i32,
    pub sent: i32,
    pub failed: i32,
    pub pending: i32,
    pub percent: f64,
}

impl ProgressSnapshot {
    /// Snapshot the persisted counters of a job
    pub fn from_job(job: &Job) -> Self {
        Self {
            status: job.status.clone(),
            total: job.total_recipients,
            sent: job.sent_count,
            failed: job.failed_count,
            pending: job.pending_count(),
            percent: job.progress_percentage(),
        }
    }

    /// Whether the underlying job has finished
    pub fn is_terminal(&self) -> bool {
        self.status
            .parse::<JobStatus>()
            .map(|status| status.is_terminal())
            .unwrap_or(false)
    }
}

/// Progress Watcher - polls job counters and publishes snapshots
///
/// Receivers always see the latest snapshot; once a terminal status is
/// observed polling stops and the final snapshot stays readable.
pub struct ProgressWatcher {
    manager: Arc<JobManager>,
    poll_interval: Duration,
}

impl ProgressWatcher {
    /// Create a watcher polling at the given interval
    pub fn new(manager: Arc<JobManager>, poll_interval_ms: u64) -> Self {
        Self {
            manager,
            poll_interval: Duration::from_millis(poll_interval_ms),
        }
    }

    /// Start polling a job
    ///
    /// Poll errors are logged and skipped; the next tick retries.
    pub async fn watch(
        &self,
        job_id: Uuid,
    ) -> Result<(watch::Receiver<ProgressSnapshot>, JoinHandle<()>), DispatchError> {
        let job = self.manager.get_job(job_id).await?;
        let (tx, rx) = watch::channel(ProgressSnapshot::from_job(&job));

        let manager = self.manager.clone();
        let poll_interval = self.poll_interval;
        let task = tokio::spawn(async move {
            let mut ticker = interval(poll_interval);
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let snapshot = match manager.get_job(job_id).await {
                    Ok(job) => ProgressSnapshot::from_job(&job),
                    Err(DispatchError::JobNotFound) => break,
                    Err(e) => {
                        warn!("Progress poll for job {} failed: {}", job_id, e);
                        continue;
                    }
                };

                let terminal = snapshot.is_terminal();
                if tx.send(snapshot).is_err() {
                    break;
                }
                if terminal {
                    break;
                }
            }
        });

        Ok((rx, task))
    }

    /// Watch a job and log the terminal outcome, for auto-driven jobs
    pub async fn monitor(&self, job_id: Uuid) -> Result<JoinHandle<()>, DispatchError> {
        let (mut rx, _poll_task) = self.watch(job_id).await?;

        Ok(tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow_and_update().clone();
                if !snapshot.is_terminal() {
                    continue;
                }
                if snapshot.status.parse::<JobStatus>().ok() == Some(JobStatus::Completed) {
                    info!(
                        "Job {} completed: {} sent, {} failed",
                        job_id, snapshot.sent, snapshot.failed
                    );
                } else {
                    warn!(
                        "Job {} failed: {} sent, {} failed, {} never attempted",
                        job_id, snapshot.sent, snapshot.failed, snapshot.pending
                    );
                }
                break;
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn job_fixture(total: i32, sent: i32, failed: i32, status: &str) -> Job {
        Job {
            id: Uuid::new_v4(),
            subject: "Hello".to_string(),
            html_content: "<p>Hi {{name}}</p>".to_string(),
            total_recipients: total,
            sent_count: sent,
            failed_count: failed,
            skipped_count: 0,
            status: status.to_string(),
            current_batch: 0,
            total_batches: 3,
            batch_size: 100,
            delay_between_batches_ms: 10_000,
            error_log: serde_json::json!([]),
            started_at: None,
            completed_at: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_snapshot_conserves_counts() {
        let snapshot = ProgressSnapshot::from_job(&job_fixture(250, 120, 30, "processing"));

        assert_eq!(snapshot.total, 250);
        assert_eq!(snapshot.sent, 120);
        assert_eq!(snapshot.failed, 30);
        assert_eq!(snapshot.pending, 100);
        assert_eq!(snapshot.sent + snapshot.failed + snapshot.pending, snapshot.total);
        assert_eq!(snapshot.percent, 60.0);
    }

    #[test]
    fn test_snapshot_pending_never_negative() {
        let snapshot = ProgressSnapshot::from_job(&job_fixture(10, 8, 3, "processing"));
        assert_eq!(snapshot.pending, 0);
    }

    #[test]
    fn test_snapshot_empty_job() {
        let snapshot = ProgressSnapshot::from_job(&job_fixture(0, 0, 0, "pending"));
        assert_eq!(snapshot.percent, 0.0);
        assert_eq!(snapshot.pending, 0);
    }

    #[test]
    fn test_snapshot_terminal_detection() {
        assert!(ProgressSnapshot::from_job(&job_fixture(10, 10, 0, "completed")).is_terminal());
        assert!(ProgressSnapshot::from_job(&job_fixture(10, 4, 6, "failed")).is_terminal());
        assert!(!ProgressSnapshot::from_job(&job_fixture(10, 4, 0, "processing")).is_terminal());
        assert!(!ProgressSnapshot::from_job(&job_fixture(10, 4, 0, "paused")).is_terminal());
    }
}
