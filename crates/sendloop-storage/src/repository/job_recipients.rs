//! Job recipient repository

use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::JobRecipient;

/// Per-status recipient counts for one job
#[derive(Debug, Clone, Default)]
pub struct JobRecipientCounts {
    pub pending: i64,
    pub processing: i64,
    pub sent: i64,
    pub failed: i64,
    pub skipped: i64,
}

impl JobRecipientCounts {
    pub fn total(&self) -> i64 {
        self.pending + self.processing + self.sent + self.failed + self.skipped
    }
}

/// Job recipient repository
#[derive(Clone)]
pub struct JobRecipientRepository {
    pool: PgPool,
}

impl JobRecipientRepository {
    /// Create a new job recipient repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Atomically claim the next batch of pending recipients
    ///
    /// The job row is locked first so concurrent claimers serialize on it;
    /// the claim only proceeds while the job is still processing. Claimed
    /// rows flip to 'processing' in the same statement.
    pub async fn claim_pending(
        &self,
        job_id: Uuid,
        limit: i64,
    ) -> Result<Vec<JobRecipient>, sqlx::Error> {
        sqlx::query_as::<_, JobRecipient>(
            r#"
            WITH locked_job AS (
                SELECT id FROM jobs
                WHERE id = $1 AND status = 'processing'
                FOR UPDATE
            ),
            batch AS (
                SELECT jr.id FROM job_recipients jr
                WHERE jr.job_id IN (SELECT id FROM locked_job)
                  AND jr.status = 'pending'
                ORDER BY jr.batch_number, jr.id
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            UPDATE job_recipients SET status = 'processing'
            WHERE id IN (SELECT id FROM batch)
            RETURNING *
            "#,
        )
        .bind(job_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    /// Record a successful delivery
    pub async fn mark_sent(
        &self,
        id: Uuid,
        message_id: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE job_recipients SET
                status = 'sent',
                message_id = $2,
                sent_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(message_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Record a failed delivery
    pub async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE job_recipients SET
                status = 'failed',
                error_message = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fail a set of claimed recipients in one statement
    pub async fn mark_failed_many(
        &self,
        ids: &[Uuid],
        error: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE job_recipients SET
                status = 'failed',
                error_message = $2
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Count recipients per status for a job
    pub async fn counts(&self, job_id: Uuid) -> Result<JobRecipientCounts, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'pending') as pending,
                COUNT(*) FILTER (WHERE status = 'processing') as processing,
                COUNT(*) FILTER (WHERE status = 'sent') as sent,
                COUNT(*) FILTER (WHERE status = 'failed') as failed,
                COUNT(*) FILTER (WHERE status = 'skipped') as skipped
            FROM job_recipients
            WHERE job_id = $1
            "#,
        )
        .bind(job_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(JobRecipientCounts {
            pending: row.get::<Option<i64>, _>("pending").unwrap_or(0),
            processing: row.get::<Option<i64>, _>("processing").unwrap_or(0),
            sent: row.get::<Option<i64>, _>("sent").unwrap_or(0),
            failed: row.get::<Option<i64>, _>("failed").unwrap_or(0),
            skipped: row.get::<Option<i64>, _>("skipped").unwrap_or(0),
        })
    }

    /// Count pending recipients for a job
    pub async fn count_pending(&self, job_id: Uuid) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM job_recipients WHERE job_id = $1 AND status = 'pending'",
        )
        .bind(job_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// List all recipients of a job in batch order
    pub async fn list_by_job(&self, job_id: Uuid) -> Result<Vec<JobRecipient>, sqlx::Error> {
        sqlx::query_as::<_, JobRecipient>(
            r#"
            SELECT * FROM job_recipients
            WHERE job_id = $1
            ORDER BY batch_number, id
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
    }
}
