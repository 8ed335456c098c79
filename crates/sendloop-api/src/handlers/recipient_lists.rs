//! Recipient list handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use sendloop_common::types::{EmailAddress, Variant};
use sendloop_storage::models::{CreateListRecipient, CreateRecipientList, ListRecipient};
use sendloop_storage::RecipientListRepository;

use crate::auth::AppState;
use crate::error::{database_rejection, error_response, ApiRejection, ApiResponse};

const MAX_NAME_LENGTH: usize = 100;
const MAX_DESCRIPTION_LENGTH: usize = 500;
const MAX_RECIPIENTS_PER_LIST: usize = 10_000;

/// One recipient in a list submission
#[derive(Debug, Deserialize)]
pub struct ListRecipientPayload {
    pub name: String,
    pub email: String,
    pub variant: String,
    #[serde(rename = "resultId")]
    pub result_id: Option<String>,
}

/// Request body for saving a recipient list
#[derive(Debug, Deserialize)]
pub struct CreateListRequest {
    pub name: String,
    pub description: Option<String>,
    pub recipients: Vec<ListRecipientPayload>,
}

/// Response payload for a created list
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCreatedResponse {
    pub list_id: Uuid,
    pub name: String,
    pub total_recipients: i32,
}

/// Query parameters for listing
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

/// Recipient list entry as reported to clients
#[derive(Debug, Serialize)]
pub struct RecipientListPayload {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub total_recipients: i32,
    pub variant_distribution: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<sendloop_storage::models::RecipientList> for RecipientListPayload {
    fn from(list: sendloop_storage::models::RecipientList) -> Self {
        Self {
            id: list.id,
            name: list.name,
            description: list.description,
            total_recipients: list.total_recipients,
            variant_distribution: list.variant_distribution,
            created_at: list.created_at,
        }
    }
}

/// Response payload for the paged list of lists
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientListsResponse {
    pub lists: Vec<RecipientListPayload>,
    pub total: i64,
    pub has_more: bool,
}

/// Stored recipient as reported to clients
#[derive(Debug, Serialize)]
pub struct ListRecipientResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub variant: String,
    #[serde(rename = "resultId")]
    pub result_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ListRecipient> for ListRecipientResponse {
    fn from(r: ListRecipient) -> Self {
        Self {
            id: r.id,
            name: r.name,
            email: r.email,
            variant: r.variant,
            result_id: r.result_id,
            created_at: r.created_at,
        }
    }
}

/// Response payload for one list with its members
#[derive(Debug, Serialize)]
pub struct RecipientListDetailResponse {
    pub list: RecipientListPayload,
    pub recipients: Vec<ListRecipientResponse>,
}

/// Deletion confirmation payload
#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub success: bool,
}

fn validation_error(message: impl Into<String>) -> ApiRejection {
    error_response(StatusCode::BAD_REQUEST, message, "VALIDATION_ERROR")
}

/// POST /api/v1/admin/newsletter/recipient-lists
pub async fn create_recipient_list(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateListRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ListCreatedResponse>>), ApiRejection> {
    let name = request.name.trim().to_string();
    if name.is_empty() {
        return Err(validation_error("List name is required"));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(validation_error("Name too long"));
    }
    if let Some(description) = &request.description {
        if description.len() > MAX_DESCRIPTION_LENGTH {
            return Err(validation_error("Description too long"));
        }
    }
    if request.recipients.is_empty() {
        return Err(validation_error("At least one recipient is required"));
    }
    if request.recipients.len() > MAX_RECIPIENTS_PER_LIST {
        return Err(validation_error("Maximum 10,000 recipients per list"));
    }

    let repo = RecipientListRepository::new(state.db_pool.pool().clone());

    let count = repo.count().await.map_err(database_rejection)?;
    if count >= state.max_recipient_lists {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!(
                "Maximum {} recipient lists allowed",
                state.max_recipient_lists
            ),
            "MAX_LISTS_EXCEEDED",
        ));
    }

    // Validate and normalize every row before touching the database
    let mut seen = HashSet::new();
    let mut duplicates: Vec<String> = Vec::new();
    let mut rows = Vec::with_capacity(request.recipients.len());
    let mut distribution = (0u32, 0u32, 0u32);

    for recipient in request.recipients {
        if recipient.name.trim().is_empty() {
            return Err(validation_error("Name is required"));
        }
        let email = recipient.email.trim().to_lowercase();
        if EmailAddress::parse(&email).is_none() {
            return Err(validation_error("Invalid email format"));
        }
        let variant = recipient
            .variant
            .trim()
            .to_lowercase()
            .parse::<Variant>()
            .map_err(|_| validation_error("Variant is required"))?;

        if !seen.insert(email.clone()) {
            duplicates.push(email);
            continue;
        }

        match variant {
            Variant::A => distribution.0 += 1,
            Variant::B => distribution.1 += 1,
            Variant::C => distribution.2 += 1,
        }
        rows.push(CreateListRecipient {
            name: recipient.name.trim().to_string(),
            email,
            variant: variant.to_string(),
            result_id: recipient.result_id,
        });
    }

    if !duplicates.is_empty() {
        let shown = duplicates
            .iter()
            .take(3)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        let suffix = if duplicates.len() > 3 {
            format!(" and {} more", duplicates.len() - 3)
        } else {
            String::new()
        };
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("Duplicate emails found in list: {}{}", shown, suffix),
            "DUPLICATE_EMAILS",
        ));
    }

    if repo
        .get_by_name(&name)
        .await
        .map_err(database_rejection)?
        .is_some()
    {
        return Err(duplicate_list_rejection(&name));
    }

    let input = CreateRecipientList {
        name: name.clone(),
        description: request.description,
        variant_distribution: serde_json::json!({
            "a": distribution.0,
            "b": distribution.1,
            "c": distribution.2,
        }),
    };

    // The unique name constraint backstops the pre-check under races
    let list = repo
        .create_with_recipients(input, rows)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                duplicate_list_rejection(&name)
            } else {
                database_rejection(e)
            }
        })?;

    info!(
        "Recipient list {} saved with {} recipients",
        list.id, list.total_recipients
    );

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(ListCreatedResponse {
            list_id: list.id,
            name: list.name,
            total_recipients: list.total_recipients,
        }),
    ))
}

/// GET /api/v1/admin/newsletter/recipient-lists
pub async fn list_recipient_lists(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<RecipientListsResponse>>, ApiRejection> {
    let limit = query.limit.clamp(1, 100);
    let offset = query.offset.max(0);

    let repo = RecipientListRepository::new(state.db_pool.pool().clone());
    let lists = repo.list(limit, offset).await.map_err(database_rejection)?;
    let total = repo.count().await.map_err(database_rejection)?;

    Ok(ApiResponse::ok(RecipientListsResponse {
        lists: lists.into_iter().map(Into::into).collect(),
        total,
        has_more: offset + limit < total,
    }))
}

/// GET /api/v1/admin/newsletter/recipient-lists/:list_id
pub async fn get_recipient_list(
    State(state): State<Arc<AppState>>,
    Path(list_id): Path<Uuid>,
) -> Result<Json<ApiResponse<RecipientListDetailResponse>>, ApiRejection> {
    let repo = RecipientListRepository::new(state.db_pool.pool().clone());

    let list = repo
        .get(list_id)
        .await
        .map_err(database_rejection)?
        .ok_or_else(list_not_found)?;
    let recipients = repo
        .list_recipients(list_id)
        .await
        .map_err(database_rejection)?;

    Ok(ApiResponse::ok(RecipientListDetailResponse {
        list: list.into(),
        recipients: recipients.into_iter().map(Into::into).collect(),
    }))
}

/// DELETE /api/v1/admin/newsletter/recipient-lists/:list_id
pub async fn delete_recipient_list(
    State(state): State<Arc<AppState>>,
    Path(list_id): Path<Uuid>,
) -> Result<Json<ApiResponse<DeletedResponse>>, ApiRejection> {
    let repo = RecipientListRepository::new(state.db_pool.pool().clone());

    let deleted = repo.delete(list_id).await.map_err(database_rejection)?;
    if !deleted {
        return Err(list_not_found());
    }

    info!("Recipient list {} deleted", list_id);

    Ok(ApiResponse::ok(DeletedResponse { success: true }))
}

fn list_not_found() -> ApiRejection {
    error_response(
        StatusCode::NOT_FOUND,
        "Recipient list not found",
        "LIST_NOT_FOUND",
    )
}

fn duplicate_list_rejection(name: &str) -> ApiRejection {
    error_response(
        StatusCode::CONFLICT,
        format!("A list named \"{}\" already exists", name),
        "DUPLICATE_LIST",
    )
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(e) if e.code().as_deref() == Some("23505"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_create_request_parses_result_id() {
        let request: CreateListRequest = serde_json::from_str(
            r#"{
                "name": "Spring wave",
                "recipients": [
                    {"name": "Anna", "email": "anna@example.com", "variant": "a",
                     "resultId": "r-1"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(request.name, "Spring wave");
        assert_eq!(request.recipients[0].result_id.as_deref(), Some("r-1"));
    }

    #[test]
    fn test_list_created_response_is_camel_case() {
        let value = serde_json::to_value(ListCreatedResponse {
            list_id: Uuid::nil(),
            name: "Spring wave".to_string(),
            total_recipients: 42,
        })
        .unwrap();

        assert_eq!(value["listId"], Uuid::nil().to_string());
        assert_eq!(value["totalRecipients"], 42);
    }

    #[test]
    fn test_duplicate_list_rejection() {
        let (status, Json(body)) = duplicate_list_rejection("Spring wave");
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error.code, "DUPLICATE_LIST");
        assert!(body.error.message.contains("Spring wave"));
    }

    #[test]
    fn test_recipient_payload_renames_result_id_only() {
        let value = serde_json::to_value(ListRecipientResponse {
            id: Uuid::nil(),
            name: "Anna".to_string(),
            email: "anna@example.com".to_string(),
            variant: "b".to_string(),
            result_id: Some("r-1".to_string()),
            created_at: Utc::now(),
        })
        .unwrap();

        assert_eq!(value["resultId"], "r-1");
        assert!(value.get("created_at").is_some());
        assert!(value.get("result_id").is_none());
    }
}
