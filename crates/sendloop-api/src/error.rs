//! Response envelope and error mapping

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::error;

use sendloop_core::{CampaignError, DispatchError, IngestError};

/// Machine-readable error payload
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub message: String,
    pub code: String,
}

/// Success envelope: `{"data": ..., "error": null}`
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
    pub error: Option<ApiError>,
}

impl<T> ApiResponse<T> {
    /// Wrap a payload in the success envelope
    pub fn ok(data: T) -> Json<Self> {
        Json(Self { data, error: None })
    }
}

/// Failure envelope: `{"data": null, "error": {...}}`
#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorResponse {
    pub data: Option<()>,
    pub error: ApiError,
}

/// Rejection type shared by all handlers
pub type ApiRejection = (StatusCode, Json<ApiErrorResponse>);

/// Build a rejection with an explicit status, message and code
pub fn error_response(
    status: StatusCode,
    message: impl Into<String>,
    code: impl Into<String>,
) -> ApiRejection {
    (
        status,
        Json(ApiErrorResponse {
            data: None,
            error: ApiError {
                message: message.into(),
                code: code.into(),
            },
        }),
    )
}

/// Map a dispatch error to its HTTP rejection
pub fn dispatch_rejection(err: DispatchError) -> ApiRejection {
    let status = match &err {
        DispatchError::JobNotFound => StatusCode::NOT_FOUND,
        DispatchError::ActiveJobExists => StatusCode::CONFLICT,
        DispatchError::Database(_) | DispatchError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        _ => StatusCode::BAD_REQUEST,
    };

    let message = match &err {
        DispatchError::Database(e) => {
            error!("Database error: {}", e);
            "Database error".to_string()
        }
        DispatchError::Internal(e) => {
            error!("Internal error: {}", e);
            "An unexpected error occurred".to_string()
        }
        _ => err.to_string(),
    };

    error_response(status, message, err.code())
}

/// Map a campaign error to its HTTP rejection
pub fn campaign_rejection(err: CampaignError) -> ApiRejection {
    let status = match &err {
        CampaignError::NotFound => StatusCode::NOT_FOUND,
        CampaignError::Database(_) | CampaignError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        _ => StatusCode::BAD_REQUEST,
    };

    let message = match &err {
        CampaignError::Database(e) => {
            error!("Database error: {}", e);
            "Database error".to_string()
        }
        CampaignError::Internal(e) => {
            error!("Internal error: {}", e);
            "An unexpected error occurred".to_string()
        }
        _ => err.to_string(),
    };

    error_response(status, message, err.code())
}

/// Map an ingestion error to its HTTP rejection
///
/// Every ingestion failure rejects the upload as a whole, so they all
/// surface as 400s.
pub fn ingest_rejection(err: IngestError) -> ApiRejection {
    error_response(StatusCode::BAD_REQUEST, err.to_string(), err.code())
}

/// Map a repository error from a handler-level query
pub fn database_rejection(err: sqlx::Error) -> ApiRejection {
    error!("Database error: {}", err);
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Database error",
        "DATABASE_ERROR",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_success_envelope_shape() {
        let Json(body) = ApiResponse::ok(serde_json::json!({"jobId": "abc"}));
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["data"]["jobId"], "abc");
        assert_eq!(value["error"], serde_json::Value::Null);
    }

    #[test]
    fn test_error_envelope_shape() {
        let (status, Json(body)) =
            error_response(StatusCode::BAD_REQUEST, "No recipients", "NO_RECIPIENTS");
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(value["data"], serde_json::Value::Null);
        assert_eq!(value["error"]["message"], "No recipients");
        assert_eq!(value["error"]["code"], "NO_RECIPIENTS");
    }

    #[test]
    fn test_dispatch_error_statuses() {
        let (status, _) = dispatch_rejection(DispatchError::JobNotFound);
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = dispatch_rejection(DispatchError::ActiveJobExists);
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, Json(body)) = dispatch_rejection(DispatchError::NoRecipients);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error.code, "NO_RECIPIENTS");
    }

    #[test]
    fn test_campaign_error_statuses() {
        let (status, Json(body)) = campaign_rejection(CampaignError::TooManyRecipients(1000));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error.code, "TOO_MANY_RECIPIENTS");

        let (status, Json(body)) = campaign_rejection(CampaignError::NotFound);
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error.code, "CAMPAIGN_NOT_FOUND");
    }

    #[test]
    fn test_ingest_error_statuses() {
        let (status, Json(body)) = ingest_rejection(IngestError::TooManyRows { limit: 1000 });
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error.code, "TOO_MANY_ROWS");
    }
}
