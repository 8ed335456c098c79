//! Email template handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use sendloop_storage::models::{CreateTemplate, Template, UpdateTemplate};
use sendloop_storage::TemplateRepository;

use crate::auth::AppState;
use crate::error::{database_rejection, error_response, ApiRejection, ApiResponse};

/// Query parameters for the template list
#[derive(Debug, Deserialize)]
pub struct TemplateListQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

/// Paginated template list
#[derive(Debug, Serialize)]
pub struct TemplateListResponse {
    pub templates: Vec<Template>,
    pub total: i64,
}

/// Request body for creating a template
#[derive(Debug, Deserialize)]
pub struct CreateTemplateRequest {
    pub name: String,
    pub subject: String,
    pub html_content: String,
    #[serde(default)]
    pub is_default: bool,
}

/// Request body for updating a template
///
/// Omitted fields keep their stored values.
#[derive(Debug, Deserialize)]
pub struct UpdateTemplateRequest {
    pub id: Uuid,
    pub name: Option<String>,
    pub subject: Option<String>,
    pub html_content: Option<String>,
    pub is_default: Option<bool>,
}

/// A template with an action message
#[derive(Debug, Serialize)]
pub struct TemplateActionResponse {
    pub template: Template,
    pub message: String,
}

/// Query parameters for deleting a template
#[derive(Debug, Deserialize)]
pub struct DeleteTemplateQuery {
    pub id: Uuid,
}

/// Deletion confirmation
#[derive(Debug, Serialize)]
pub struct TemplateDeletedResponse {
    pub message: String,
}

fn template_not_found() -> ApiRejection {
    error_response(
        StatusCode::NOT_FOUND,
        "Template not found",
        "TEMPLATE_NOT_FOUND",
    )
}

fn empty_field_rejection(message: &str) -> ApiRejection {
    error_response(StatusCode::BAD_REQUEST, message, "VALIDATION_ERROR")
}

/// GET /api/v1/bulk-sender/templates
pub async fn list_templates(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TemplateListQuery>,
) -> Result<Json<ApiResponse<TemplateListResponse>>, ApiRejection> {
    let page = query.page.max(1);
    let limit = query.limit.clamp(1, 100);
    let offset = (page - 1) * limit;

    let repo = TemplateRepository::new(state.db_pool.pool().clone());
    let total = repo.count().await.map_err(database_rejection)?;
    let templates = repo.list(limit, offset).await.map_err(database_rejection)?;

    Ok(ApiResponse::ok(TemplateListResponse { templates, total }))
}

/// POST /api/v1/bulk-sender/templates
pub async fn create_template(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateTemplateRequest>,
) -> Result<Json<ApiResponse<TemplateActionResponse>>, ApiRejection> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(empty_field_rejection("Template name is required"));
    }

    let subject = request.subject.trim();
    if subject.is_empty() {
        return Err(empty_field_rejection("Template subject is required"));
    }

    let html_content = request.html_content.trim();
    if html_content.is_empty() {
        return Err(empty_field_rejection("Template HTML content is required"));
    }

    let repo = TemplateRepository::new(state.db_pool.pool().clone());
    let template = repo
        .create(CreateTemplate {
            name: name.to_string(),
            subject: subject.to_string(),
            html_content: html_content.to_string(),
            is_default: request.is_default,
        })
        .await
        .map_err(database_rejection)?;

    tracing::info!("Created template {} ({})", template.name, template.id);

    Ok(ApiResponse::ok(TemplateActionResponse {
        template,
        message: "Template created successfully".to_string(),
    }))
}

/// PUT /api/v1/bulk-sender/templates
pub async fn update_template(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UpdateTemplateRequest>,
) -> Result<Json<ApiResponse<TemplateActionResponse>>, ApiRejection> {
    // Provided fields must not be blank; omitted fields pass through
    let name = normalize_field(request.name, "Template name is required")?;
    let subject = normalize_field(request.subject, "Template subject is required")?;
    let html_content =
        normalize_field(request.html_content, "Template HTML content is required")?;

    let repo = TemplateRepository::new(state.db_pool.pool().clone());
    let template = repo
        .update(
            request.id,
            UpdateTemplate {
                name,
                subject,
                html_content,
                is_default: request.is_default,
            },
        )
        .await
        .map_err(database_rejection)?
        .ok_or_else(template_not_found)?;

    Ok(ApiResponse::ok(TemplateActionResponse {
        template,
        message: "Template updated successfully".to_string(),
    }))
}

/// DELETE /api/v1/bulk-sender/templates?id=
pub async fn delete_template(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DeleteTemplateQuery>,
) -> Result<Json<ApiResponse<TemplateDeletedResponse>>, ApiRejection> {
    let repo = TemplateRepository::new(state.db_pool.pool().clone());
    let deleted = repo.delete(query.id).await.map_err(database_rejection)?;

    if !deleted {
        return Err(template_not_found());
    }

    Ok(ApiResponse::ok(TemplateDeletedResponse {
        message: "Template deleted successfully".to_string(),
    }))
}

fn normalize_field(value: Option<String>, message: &str) -> Result<Option<String>, ApiRejection> {
    match value {
        Some(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                Err(empty_field_rejection(message))
            } else {
                Ok(Some(trimmed.to_string()))
            }
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_field_trims() {
        let result = normalize_field(Some("  Welcome  ".to_string()), "required").unwrap();
        assert_eq!(result, Some("Welcome".to_string()));
    }

    #[test]
    fn test_normalize_field_rejects_blank() {
        let result = normalize_field(Some("   ".to_string()), "Template name is required");
        let (status, Json(body)) = result.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error.message, "Template name is required");
    }

    #[test]
    fn test_normalize_field_passes_through_none() {
        let result = normalize_field(None, "required").unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn test_create_request_defaults_is_default() {
        let request: CreateTemplateRequest = serde_json::from_str(
            r#"{"name": "Welcome", "subject": "Hi", "html_content": "<p>Hi</p>"}"#,
        )
        .unwrap();
        assert!(!request.is_default);
    }
}
