//! Unsubscribe repository

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Unsubscribe;

/// Unsubscribe repository
#[derive(Clone)]
pub struct UnsubscribeRepository {
    pool: PgPool,
}

impl UnsubscribeRepository {
    /// Create a new unsubscribe repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Add an email to the suppression set
    ///
    /// Returns false when the email was already suppressed.
    pub async fn add(&self, email: &str, reason: Option<&str>) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO unsubscribes (id, email, reason)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove an email from the suppression set (re-subscribe)
    pub async fn remove(&self, email: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM unsubscribes WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Check if an email is suppressed
    pub async fn contains(&self, email: &str) -> Result<bool, sqlx::Error> {
        let result: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM unsubscribes WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;

        Ok(result.0)
    }

    /// List suppressed emails, newest first, with an optional search term
    pub async fn list(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Unsubscribe>, sqlx::Error> {
        if let Some(search) = search {
            let pattern = format!("%{}%", search);
            sqlx::query_as::<_, Unsubscribe>(
                r#"
                SELECT * FROM unsubscribes
                WHERE email ILIKE $1 OR reason ILIKE $1
                ORDER BY created_at DESC
                LIMIT $2 OFFSET $3
                "#,
            )
            .bind(pattern)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, Unsubscribe>(
                r#"
                SELECT * FROM unsubscribes
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

    /// Count suppressed emails, with an optional search term
    pub async fn count(&self, search: Option<&str>) -> Result<i64, sqlx::Error> {
        let count: (i64,) = if let Some(search) = search {
            let pattern = format!("%{}%", search);
            sqlx::query_as(
                "SELECT COUNT(*) FROM unsubscribes WHERE email ILIKE $1 OR reason ILIKE $1",
            )
            .bind(pattern)
            .fetch_one(&self.pool)
            .await?
        } else {
            sqlx::query_as("SELECT COUNT(*) FROM unsubscribes")
                .fetch_one(&self.pool)
                .await?
        };
        Ok(count.0)
    }

    /// Return the subset of the given emails that are suppressed
    pub async fn filter_unsubscribed(
        &self,
        emails: &[String],
    ) -> Result<Vec<String>, sqlx::Error> {
        let result: Vec<(String,)> =
            sqlx::query_as("SELECT email FROM unsubscribes WHERE email = ANY($1)")
                .bind(emails)
                .fetch_all(&self.pool)
                .await?;

        Ok(result.into_iter().map(|(email,)| email).collect())
    }
}
