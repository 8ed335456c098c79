//! Bulk send job repository

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{CreateJob, CreateJobRecipient, Job, JobStatus};

/// Bulk send job repository
#[derive(Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    /// Create a new job repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the database pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create a job and all of its recipient rows in one transaction
    ///
    /// The partial unique index on non-terminal jobs makes a second active
    /// job fail with a unique violation.
    pub async fn create_with_recipients(
        &self,
        input: CreateJob,
        recipients: Vec<CreateJobRecipient>,
    ) -> Result<Job, sqlx::Error> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        let job = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs (
                id, subject, html_content, total_recipients, skipped_count,
                total_batches, batch_size, delay_between_batches_ms
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.subject)
        .bind(&input.html_content)
        .bind(input.total_recipients)
        .bind(input.skipped_count)
        .bind(input.total_batches)
        .bind(input.batch_size)
        .bind(input.delay_between_batches_ms)
        .fetch_one(&mut *tx)
        .await?;

        for recipient in recipients {
            sqlx::query(
                r#"
                INSERT INTO job_recipients (id, job_id, email, name, variant, batch_number)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(id)
            .bind(&recipient.email)
            .bind(&recipient.name)
            .bind(&recipient.variant)
            .bind(recipient.batch_number)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(job)
    }

    /// Get a job by ID
    pub async fn get(&self, id: Uuid) -> Result<Option<Job>, sqlx::Error> {
        sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Get the active (non-terminal) job, if any
    pub async fn get_active(&self) -> Result<Option<Job>, sqlx::Error> {
        sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs
            WHERE status IN ('pending', 'processing', 'paused')
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
    }

    /// List the most recent jobs
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<Job>, sqlx::Error> {
        sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    /// Move a pending job into processing
    ///
    /// Returns None when the job is missing or not pending.
    pub async fn mark_started(&self, id: Uuid) -> Result<Option<Job>, sqlx::Error> {
        sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs SET
                status = 'processing',
                started_at = COALESCE(started_at, NOW()),
                updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Pause a processing job
    pub async fn mark_paused(&self, id: Uuid) -> Result<Option<Job>, sqlx::Error> {
        sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs SET
                status = 'paused',
                updated_at = NOW()
            WHERE id = $1 AND status = 'processing'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Resume a paused job
    pub async fn mark_resumed(&self, id: Uuid) -> Result<Option<Job>, sqlx::Error> {
        sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs SET
                status = 'processing',
                updated_at = NOW()
            WHERE id = $1 AND status = 'paused'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Cancel a non-terminal job; the job lands in 'failed'
    pub async fn mark_cancelled(&self, id: Uuid) -> Result<Option<Job>, sqlx::Error> {
        sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs SET
                status = 'failed',
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'processing', 'paused')
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Mark a job terminal
    pub async fn finalize(&self, id: Uuid, status: JobStatus) -> Result<Option<Job>, sqlx::Error> {
        sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs SET
                status = $2,
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.to_string())
        .fetch_optional(&self.pool)
        .await
    }

    /// Fold a finished batch into the job counters
    pub async fn record_batch_outcome(
        &self,
        id: Uuid,
        sent_delta: i32,
        failed_delta: i32,
        errors: serde_json::Value,
    ) -> Result<Option<Job>, sqlx::Error> {
        sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs SET
                sent_count = sent_count + $2,
                failed_count = failed_count + $3,
                current_batch = current_batch + 1,
                error_log = error_log || $4,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(sent_delta)
        .bind(failed_delta)
        .bind(errors)
        .fetch_optional(&self.pool)
        .await
    }

    /// Delete a job that is not mid-dispatch
    pub async fn delete(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1 AND status != 'processing'")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
