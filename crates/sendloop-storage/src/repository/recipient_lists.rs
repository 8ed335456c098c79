//! Recipient list repository

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{CreateListRecipient, CreateRecipientList, ListRecipient, RecipientList};

/// Recipient list repository
#[derive(Clone)]
pub struct RecipientListRepository {
    pool: PgPool,
}

impl RecipientListRepository {
    /// Create a new recipient list repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a list and its members in one transaction
    ///
    /// A duplicate list name surfaces as a unique violation on
    /// recipient_lists.name.
    pub async fn create_with_recipients(
        &self,
        input: CreateRecipientList,
        recipients: Vec<CreateListRecipient>,
    ) -> Result<RecipientList, sqlx::Error> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        let list = sqlx::query_as::<_, RecipientList>(
            r#"
            INSERT INTO recipient_lists (id, name, description, total_recipients, variant_distribution)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(recipients.len() as i32)
        .bind(&input.variant_distribution)
        .fetch_one(&mut *tx)
        .await?;

        for recipient in recipients {
            sqlx::query(
                r#"
                INSERT INTO list_recipients (id, recipient_list_id, name, email, variant, result_id)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(id)
            .bind(&recipient.name)
            .bind(&recipient.email)
            .bind(&recipient.variant)
            .bind(&recipient.result_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(list)
    }

    /// Get a list by ID
    pub async fn get(&self, id: Uuid) -> Result<Option<RecipientList>, sqlx::Error> {
        sqlx::query_as::<_, RecipientList>("SELECT * FROM recipient_lists WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Get a list by its unique name
    pub async fn get_by_name(&self, name: &str) -> Result<Option<RecipientList>, sqlx::Error> {
        sqlx::query_as::<_, RecipientList>("SELECT * FROM recipient_lists WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
    }

    /// List recipient lists, newest first
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<RecipientList>, sqlx::Error> {
        sqlx::query_as::<_, RecipientList>(
            r#"
            SELECT * FROM recipient_lists
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    /// Count stored lists
    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipient_lists")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    /// Delete a list and its members
    pub async fn delete(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM recipient_lists WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// List the members of a list
    pub async fn list_recipients(
        &self,
        list_id: Uuid,
    ) -> Result<Vec<ListRecipient>, sqlx::Error> {
        sqlx::query_as::<_, ListRecipient>(
            r#"
            SELECT * FROM list_recipients
            WHERE recipient_list_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(list_id)
        .fetch_all(&self.pool)
        .await
    }
}
