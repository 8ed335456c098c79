//! Email template repository

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{CreateTemplate, Template, UpdateTemplate};

/// Email template repository
#[derive(Clone)]
pub struct TemplateRepository {
    pool: PgPool,
}

impl TemplateRepository {
    /// Create a new template repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a template; a new default demotes any previous default
    pub async fn create(&self, input: CreateTemplate) -> Result<Template, sqlx::Error> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        if input.is_default {
            sqlx::query("UPDATE templates SET is_default = FALSE WHERE is_default")
                .execute(&mut *tx)
                .await?;
        }

        let template = sqlx::query_as::<_, Template>(
            r#"
            INSERT INTO templates (id, name, subject, html_content, is_default)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.subject)
        .bind(&input.html_content)
        .bind(input.is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(template)
    }

    /// Get a template by ID
    pub async fn get(&self, id: Uuid) -> Result<Option<Template>, sqlx::Error> {
        sqlx::query_as::<_, Template>("SELECT * FROM templates WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// List templates, default first, then newest first
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Template>, sqlx::Error> {
        sqlx::query_as::<_, Template>(
            r#"
            SELECT * FROM templates
            ORDER BY is_default DESC, created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    /// Count stored templates
    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM templates")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    /// Update a template; promoting to default demotes any other default
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateTemplate,
    ) -> Result<Option<Template>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        if input.is_default == Some(true) {
            sqlx::query("UPDATE templates SET is_default = FALSE WHERE is_default AND id != $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        let template = sqlx::query_as::<_, Template>(
            r#"
            UPDATE templates SET
                name = COALESCE($2, name),
                subject = COALESCE($3, subject),
                html_content = COALESCE($4, html_content),
                is_default = COALESCE($5, is_default),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.subject)
        .bind(&input.html_content)
        .bind(input.is_default)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(template)
    }

    /// Delete a template
    pub async fn delete(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM templates WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
