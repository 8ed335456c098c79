//! Authentication module

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use sendloop_core::{
    CampaignManager, DispatchRegistry, JobManager, ProgressWatcher, RecipientIngestor,
    TemplateRenderer,
};
use sendloop_storage::DatabasePool;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::warn;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DatabasePool,
    pub jobs: Arc<JobManager>,
    pub campaigns: Arc<CampaignManager>,
    pub registry: DispatchRegistry,
    pub watcher: Arc<ProgressWatcher>,
    pub ingestor: Arc<RecipientIngestor>,
    pub renderer: Arc<TemplateRenderer>,
    /// SHA-256 hex digest of the API key; None disables authentication
    pub api_key_sha256: Option<String>,
    pub max_recipient_lists: i64,
}

/// Extract API key from request
pub fn extract_api_key(req: &Request) -> Option<&str> {
    // Check Authorization header
    if let Some(auth) = req.headers().get("authorization") {
        if let Ok(auth_str) = auth.to_str() {
            if auth_str.starts_with("Bearer ") {
                return Some(&auth_str[7..]);
            }
        }
    }

    // Check X-API-Key header
    if let Some(key) = req.headers().get("x-api-key") {
        if let Ok(key_str) = key.to_str() {
            return Some(key_str);
        }
    }

    None
}

/// Hash an API key for comparison
pub fn hash_api_key(api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    let result = hasher.finalize();
    hex::encode(result)
}

/// Authentication middleware
///
/// Compares the presented key's SHA-256 digest against the configured
/// digest. Unset digest means an open instance; the server logs a
/// warning at boot for that case.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = state.api_key_sha256.as_deref() else {
        return Ok(next.run(request).await);
    };

    let api_key = extract_api_key(&request).ok_or_else(|| {
        warn!("Missing API key in request to {}", request.uri().path());
        StatusCode::UNAUTHORIZED
    })?;

    if hash_api_key(api_key) != expected {
        warn!("API key rejected for {}", request.uri().path());
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hash_api_key() {
        assert_eq!(
            hash_api_key("sendloop-admin-key"),
            "d86ff990a8f683b83d0ea22f57f650e489ab589b3ad5324b0da3e9e61d3e6ead"
        );
        assert_ne!(hash_api_key("wrong-key"), hash_api_key("sendloop-admin-key"));
    }

    #[test]
    fn test_extract_api_key_bearer() {
        let req = Request::builder()
            .header("authorization", "Bearer secret123")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_api_key(&req), Some("secret123"));
    }

    #[test]
    fn test_extract_api_key_header() {
        let req = Request::builder()
            .header("x-api-key", "secret456")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_api_key(&req), Some("secret456"));
    }

    #[test]
    fn test_extract_api_key_missing() {
        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(extract_api_key(&req), None);

        let req = Request::builder()
            .header("authorization", "Basic dXNlcjpwYXNz")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_api_key(&req), None);
    }
}
