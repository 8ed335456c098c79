//! Suppression list handlers
//!
//! Admin CRUD over the unsubscribe set, plus the public endpoint that
//! unsubscribe links in outgoing mail point at.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use sendloop_common::types::EmailAddress;
use sendloop_storage::models::Unsubscribe;
use sendloop_storage::UnsubscribeRepository;

use crate::auth::AppState;
use crate::error::{database_rejection, error_response, ApiRejection, ApiResponse};

/// Query parameters for the unsubscribe list
#[derive(Debug, Deserialize)]
pub struct UnsubscribeListQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub search: Option<String>,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    50
}

/// Paginated unsubscribe list
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsubscribeListResponse {
    pub unsubscribes: Vec<Unsubscribe>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

/// Request body for adding suppressions
///
/// Accepts a single email or a batch; both are normalized to lowercase.
#[derive(Debug, Deserialize)]
pub struct AddUnsubscribesRequest {
    pub email: Option<String>,
    pub emails: Option<Vec<String>>,
    pub reason: Option<String>,
}

/// Outcome of an add request
#[derive(Debug, Serialize)]
pub struct UnsubscribesAddedResponse {
    pub added: usize,
    pub skipped: usize,
    pub duplicates: Vec<String>,
    pub message: String,
}

/// Query parameters for removing a suppression
#[derive(Debug, Deserialize)]
pub struct RemoveUnsubscribeQuery {
    pub email: String,
}

/// Removal confirmation
#[derive(Debug, Serialize)]
pub struct UnsubscribeRemovedResponse {
    pub deleted: bool,
    pub message: String,
}

/// Request body for the public unsubscribe endpoint
///
/// Mailed links carry a token; the plain form posts an email.
#[derive(Debug, Deserialize)]
pub struct PublicUnsubscribeRequest {
    pub token: Option<String>,
    pub email: Option<String>,
}

/// Public unsubscribe confirmation
#[derive(Debug, Serialize)]
pub struct PublicUnsubscribeResponse {
    pub success: bool,
}

/// GET /api/v1/bulk-sender/unsubscribes
pub async fn list_unsubscribes(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UnsubscribeListQuery>,
) -> Result<Json<ApiResponse<UnsubscribeListResponse>>, ApiRejection> {
    if query.page < 1 || query.limit < 1 || query.limit > 100 {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Invalid pagination parameters",
            "VALIDATION_ERROR",
        ));
    }

    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let offset = (query.page - 1) * query.limit;

    let repo = UnsubscribeRepository::new(state.db_pool.pool().clone());
    let total = repo.count(search).await.map_err(database_rejection)?;
    let unsubscribes = repo
        .list(search, query.limit, offset)
        .await
        .map_err(database_rejection)?;

    // Ceiling division
    let total_pages = (total + query.limit - 1) / query.limit;

    Ok(ApiResponse::ok(UnsubscribeListResponse {
        unsubscribes,
        total,
        page: query.page,
        limit: query.limit,
        total_pages,
    }))
}

/// POST /api/v1/bulk-sender/unsubscribes
pub async fn add_unsubscribes(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AddUnsubscribesRequest>,
) -> Result<Json<ApiResponse<UnsubscribesAddedResponse>>, ApiRejection> {
    let emails = normalize_emails(request.email, request.emails).ok_or_else(|| {
        error_response(
            StatusCode::BAD_REQUEST,
            "Either email or emails array is required",
            "VALIDATION_ERROR",
        )
    })?;

    let invalid: Vec<&str> = emails
        .iter()
        .filter(|e| EmailAddress::parse(e).is_none())
        .map(String::as_str)
        .collect();
    if !invalid.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("Invalid email format: {}", invalid.join(", ")),
            "INVALID_EMAIL",
        ));
    }

    let reason = request.reason.as_deref();
    let repo = UnsubscribeRepository::new(state.db_pool.pool().clone());

    let mut added = 0;
    let mut duplicates = Vec::new();
    for email in &emails {
        if repo.add(email, reason).await.map_err(database_rejection)? {
            added += 1;
        } else {
            duplicates.push(email.clone());
        }
    }

    tracing::info!(
        "Suppression add: {} added, {} already present",
        added,
        duplicates.len()
    );

    let message = format!(
        "Added {} email(s), skipped {} duplicate(s)",
        added,
        duplicates.len()
    );

    Ok(ApiResponse::ok(UnsubscribesAddedResponse {
        added,
        skipped: duplicates.len(),
        duplicates,
        message,
    }))
}

/// DELETE /api/v1/bulk-sender/unsubscribes?email=
pub async fn remove_unsubscribe(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RemoveUnsubscribeQuery>,
) -> Result<Json<ApiResponse<UnsubscribeRemovedResponse>>, ApiRejection> {
    let email = query.email.trim().to_lowercase();

    let repo = UnsubscribeRepository::new(state.db_pool.pool().clone());
    let deleted = repo.remove(&email).await.map_err(database_rejection)?;

    if !deleted {
        return Err(error_response(
            StatusCode::NOT_FOUND,
            "Unsubscribe not found",
            "UNSUBSCRIBE_NOT_FOUND",
        ));
    }

    Ok(ApiResponse::ok(UnsubscribeRemovedResponse {
        deleted: true,
        message: "Unsubscribe removed successfully".to_string(),
    }))
}

/// POST /unsubscribe (public, no API key)
///
/// Always succeeds for an address that is already suppressed.
pub async fn public_unsubscribe(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PublicUnsubscribeRequest>,
) -> Result<Json<ApiResponse<PublicUnsubscribeResponse>>, ApiRejection> {
    let email = match (request.token.as_deref(), request.email.as_deref()) {
        (Some(token), _) => {
            let (email, _campaign_id) =
                state.renderer.parse_unsubscribe_token(token).ok_or_else(|| {
                    error_response(
                        StatusCode::BAD_REQUEST,
                        "Invalid unsubscribe token",
                        "INVALID_TOKEN",
                    )
                })?;
            email
        }
        (None, Some(email)) => {
            let email = email.trim().to_lowercase();
            if EmailAddress::parse(&email).is_none() {
                return Err(error_response(
                    StatusCode::BAD_REQUEST,
                    format!("Invalid email address: {}", email),
                    "INVALID_EMAIL",
                ));
            }
            email
        }
        (None, None) => {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                "Email is required",
                "VALIDATION_ERROR",
            ));
        }
    };

    let repo = UnsubscribeRepository::new(state.db_pool.pool().clone());
    let newly_added = repo
        .add(&email, Some("unsubscribe link"))
        .await
        .map_err(database_rejection)?;

    if newly_added {
        tracing::info!("Unsubscribed {}", email);
    }

    Ok(ApiResponse::ok(PublicUnsubscribeResponse { success: true }))
}

/// Merge the single and batch forms into one deduplicated list
fn normalize_emails(email: Option<String>, emails: Option<Vec<String>>) -> Option<Vec<String>> {
    let raw = match (email, emails) {
        (Some(single), _) => vec![single],
        (None, Some(batch)) if !batch.is_empty() => batch,
        _ => return None,
    };

    let mut seen = HashSet::new();
    let mut normalized = Vec::new();
    for entry in raw {
        let entry = entry.trim().to_lowercase();
        if seen.insert(entry.clone()) {
            normalized.push(entry);
        }
    }
    Some(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_emails_single() {
        let result = normalize_emails(Some("  Anna@Example.COM ".to_string()), None).unwrap();
        assert_eq!(result, vec!["anna@example.com".to_string()]);
    }

    #[test]
    fn test_normalize_emails_batch_dedupes() {
        let result = normalize_emails(
            None,
            Some(vec![
                "a@example.com".to_string(),
                "A@EXAMPLE.COM".to_string(),
                "b@example.com".to_string(),
            ]),
        )
        .unwrap();
        assert_eq!(
            result,
            vec!["a@example.com".to_string(), "b@example.com".to_string()]
        );
    }

    #[test]
    fn test_normalize_emails_rejects_empty() {
        assert_eq!(normalize_emails(None, None), None);
        assert_eq!(normalize_emails(None, Some(vec![])), None);
    }

    #[test]
    fn test_list_response_uses_camel_case_total_pages() {
        let response = UnsubscribeListResponse {
            unsubscribes: vec![],
            total: 101,
            page: 1,
            limit: 50,
            total_pages: 3,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["totalPages"], 3);
        assert_eq!(value["total"], 101);
    }
}
