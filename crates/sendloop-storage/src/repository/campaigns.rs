//! Newsletter campaign repository

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{Campaign, CampaignStatus, CreateCampaign};

/// Aggregate statistics across all campaigns
#[derive(Debug, Clone, Default)]
pub struct CampaignAggregateStats {
    pub total_campaigns: i64,
    pub total_emails_sent: i64,
    pub total_emails_failed: i64,
    pub average_success_rate: Option<f64>,
    pub last_campaign_at: Option<DateTime<Utc>>,
}

/// Newsletter campaign repository
#[derive(Clone)]
pub struct CampaignRepository {
    pool: PgPool,
}

impl CampaignRepository {
    /// Create a new campaign repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a campaign already in the sending state
    pub async fn create(&self, input: CreateCampaign) -> Result<Campaign, sqlx::Error> {
        let id = Uuid::new_v4();

        sqlx::query_as::<_, Campaign>(
            r#"
            INSERT INTO campaigns (
                id, name, subject, template_variant, status, total_recipients, started_at
            )
            VALUES ($1, $2, $3, $4, 'sending', $5, NOW())
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.subject)
        .bind(&input.template_variant)
        .bind(input.total_recipients)
        .fetch_one(&self.pool)
        .await
    }

    /// Get a campaign by ID
    pub async fn get(&self, id: Uuid) -> Result<Option<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// List campaigns, newest first, optionally filtered by status
    pub async fn list(
        &self,
        status: Option<CampaignStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Campaign>, sqlx::Error> {
        if let Some(status) = status {
            sqlx::query_as::<_, Campaign>(
                r#"
                SELECT * FROM campaigns
                WHERE status = $1
                ORDER BY created_at DESC
                LIMIT $2 OFFSET $3
                "#,
            )
            .bind(status.to_string())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, Campaign>(
                r#"
                SELECT * FROM campaigns
                ORDER BY created_at DESC
                LIMIT $1 OFFSET $2
                "#,
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        }
    }

    /// Count campaigns, optionally filtered by status
    pub async fn count(&self, status: Option<CampaignStatus>) -> Result<i64, sqlx::Error> {
        let count: (i64,) = if let Some(status) = status {
            sqlx::query_as("SELECT COUNT(*) FROM campaigns WHERE status = $1")
                .bind(status.to_string())
                .fetch_one(&self.pool)
                .await?
        } else {
            sqlx::query_as("SELECT COUNT(*) FROM campaigns")
                .fetch_one(&self.pool)
                .await?
        };
        Ok(count.0)
    }

    /// Fold a finished batch into the campaign counters
    pub async fn increment_counts(
        &self,
        id: Uuid,
        sent_delta: i32,
        failed_delta: i32,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            r#"
            UPDATE campaigns SET
                sent_count = sent_count + $2,
                failed_count = failed_count + $3,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(sent_delta)
        .bind(failed_delta)
        .fetch_optional(&self.pool)
        .await
    }

    /// Mark a campaign terminal
    pub async fn finalize(
        &self,
        id: Uuid,
        status: CampaignStatus,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            r#"
            UPDATE campaigns SET
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

    /// Compute aggregate delivery statistics across all campaigns
    ///
    /// The success rate is a percentage averaged over completed campaigns
    /// with at least one recipient.
    pub async fn stats(&self) -> Result<CampaignAggregateStats, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) as total_campaigns,
                SUM(sent_count) as total_emails_sent,
                SUM(failed_count) as total_emails_failed,
                AVG(
                    CASE
                        WHEN status = 'completed' AND total_recipients > 0
                        THEN sent_count::float8 / total_recipients * 100.0
                    END
                ) as average_success_rate,
                MAX(created_at) as last_campaign_at
            FROM campaigns
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(CampaignAggregateStats {
            total_campaigns: row.get::<Option<i64>, _>("total_campaigns").unwrap_or(0),
            total_emails_sent: row.get::<Option<i64>, _>("total_emails_sent").unwrap_or(0),
            total_emails_failed: row
                .get::<Option<i64>, _>("total_emails_failed")
                .unwrap_or(0),
            average_success_rate: row.get("average_success_rate"),
            last_campaign_at: row.get("last_campaign_at"),
        })
    }
}
