//! API routes

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use sendloop_common::config::ApiConfig;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{auth_middleware, AppState};
use crate::handlers::{
    health, ingest, jobs, newsletter, recipient_lists, templates, unsubscribes,
};
use crate::openapi::create_openapi_routes;

/// Create the API router
pub fn create_router(state: Arc<AppState>, api_config: &ApiConfig) -> Router {
    // Health check routes (no auth required)
    let health_routes = Router::new()
        .route("/", get(health::health))
        .route("/live", get(health::liveness))
        .route("/ready", get(health::readiness))
        .route("/detailed", get(health::health_detailed))
        .with_state(state.clone());

    // Public unsubscribe endpoint, linked from outgoing mail
    let public_routes = Router::new()
        .route("/unsubscribe", post(unsubscribes::public_unsubscribe))
        .with_state(state.clone());

    // Bulk sender job routes
    let job_routes = Router::new()
        .route("/", post(jobs::create_job))
        .route("/", get(jobs::list_jobs))
        .route("/:job_id", get(jobs::get_job))
        .route("/:job_id", patch(jobs::update_job))
        .route("/:job_id", delete(jobs::delete_job))
        .route("/:job_id/process", post(jobs::process_batch));

    // CSV ingestion preview
    let recipient_routes = Router::new().route("/parse", post(ingest::parse_recipients));

    // Template routes
    let template_routes = Router::new()
        .route("/", get(templates::list_templates))
        .route("/", post(templates::create_template))
        .route("/", put(templates::update_template))
        .route("/", delete(templates::delete_template));

    // Suppression list routes
    let unsubscribe_routes = Router::new()
        .route("/", get(unsubscribes::list_unsubscribes))
        .route("/", post(unsubscribes::add_unsubscribes))
        .route("/", delete(unsubscribes::remove_unsubscribe));

    // Recipient list routes
    let recipient_list_routes = Router::new()
        .route("/", get(recipient_lists::list_recipient_lists))
        .route("/", post(recipient_lists::create_recipient_list))
        .route("/:list_id", get(recipient_lists::get_recipient_list))
        .route("/:list_id", delete(recipient_lists::delete_recipient_list));

    // Newsletter campaign routes
    let newsletter_routes = Router::new()
        .route("/send", post(newsletter::send_campaign))
        .route("/status/:campaign_id", get(newsletter::campaign_status))
        .route("/campaigns", get(newsletter::list_campaigns))
        .route("/campaigns/stats", get(newsletter::campaign_stats))
        .route(
            "/campaigns/:campaign_id/progress",
            get(newsletter::campaign_progress),
        )
        .nest("/recipient-lists", recipient_list_routes);

    // API v1 routes with authentication
    let api_v1 = Router::new()
        .nest("/bulk-sender/jobs", job_routes)
        .nest("/bulk-sender/recipients", recipient_routes)
        .nest("/bulk-sender/templates", template_routes)
        .nest("/bulk-sender/unsubscribes", unsubscribe_routes)
        .nest("/admin/newsletter", newsletter_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state.clone());

    // Combine all routes
    let mut router = Router::new()
        .nest("/health", health_routes)
        .merge(public_routes)
        .nest("/api/v1", api_v1);

    if api_config.enable_swagger {
        router = router.merge(create_openapi_routes());
    }

    let mut router = router.layer(TraceLayer::new_for_http());

    if !api_config.cors_origins.is_empty() {
        router = router.layer(cors_layer(&api_config.cors_origins));
    }

    router
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-api-key"),
        ])
}
