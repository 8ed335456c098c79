//! Campaign send repository

use std::collections::HashMap;

use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{CampaignSend, CreateCampaignSend};

/// Per-status send counts for one campaign
#[derive(Debug, Clone, Default)]
pub struct CampaignSendCounts {
    pub pending: i64,
    pub sent: i64,
    pub failed: i64,
}

impl CampaignSendCounts {
    pub fn total(&self) -> i64 {
        self.pending + self.sent + self.failed
    }
}

/// Campaign send repository
#[derive(Clone)]
pub struct CampaignSendRepository {
    pool: PgPool,
}

impl CampaignSendRepository {
    /// Create a new campaign send repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert all pending sends for a campaign in one transaction
    pub async fn create_batch(
        &self,
        campaign_id: Uuid,
        sends: Vec<CreateCampaignSend>,
    ) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;

        for send in sends {
            let result = sqlx::query(
                r#"
                INSERT INTO campaign_sends (id, campaign_id, email, name, variant)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (campaign_id, email) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(campaign_id)
            .bind(&send.email)
            .bind(&send.name)
            .bind(&send.variant)
            .execute(&mut *tx)
            .await?;

            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// List the next pending sends of a campaign in insertion order
    pub async fn list_pending(
        &self,
        campaign_id: Uuid,
        limit: i64,
    ) -> Result<Vec<CampaignSend>, sqlx::Error> {
        sqlx::query_as::<_, CampaignSend>(
            r#"
            SELECT * FROM campaign_sends
            WHERE campaign_id = $1 AND status = 'pending'
            ORDER BY created_at, id
            LIMIT $2
            "#,
        )
        .bind(campaign_id)
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
            UPDATE campaign_sends SET
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
            UPDATE campaign_sends SET
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

    /// Count sends per status for a campaign
    pub async fn counts(&self, campaign_id: Uuid) -> Result<CampaignSendCounts, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'pending') as pending,
                COUNT(*) FILTER (WHERE status = 'sent') as sent,
                COUNT(*) FILTER (WHERE status = 'failed') as failed
            FROM campaign_sends
            WHERE campaign_id = $1
            "#,
        )
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(CampaignSendCounts {
            pending: row.get::<Option<i64>, _>("pending").unwrap_or(0),
            sent: row.get::<Option<i64>, _>("sent").unwrap_or(0),
            failed: row.get::<Option<i64>, _>("failed").unwrap_or(0),
        })
    }

    /// Count sends per status for many campaigns in one query
    pub async fn counts_for(
        &self,
        campaign_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, CampaignSendCounts>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT
                campaign_id,
                COUNT(*) FILTER (WHERE status = 'pending') as pending,
                COUNT(*) FILTER (WHERE status = 'sent') as sent,
                COUNT(*) FILTER (WHERE status = 'failed') as failed
            FROM campaign_sends
            WHERE campaign_id = ANY($1)
            GROUP BY campaign_id
            "#,
        )
        .bind(campaign_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = HashMap::with_capacity(rows.len());
        for row in rows {
            counts.insert(
                row.get("campaign_id"),
                CampaignSendCounts {
                    pending: row.get::<Option<i64>, _>("pending").unwrap_or(0),
                    sent: row.get::<Option<i64>, _>("sent").unwrap_or(0),
                    failed: row.get::<Option<i64>, _>("failed").unwrap_or(0),
                },
            );
        }
        Ok(counts)
    }

    /// Count pending sends for a campaign
    pub async fn count_pending(&self, campaign_id: Uuid) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM campaign_sends WHERE campaign_id = $1 AND status = 'pending'",
        )
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0)
    }
}
