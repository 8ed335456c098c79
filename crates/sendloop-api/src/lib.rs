//! Sendloop API - REST API server
//!
//! This crate provides the REST API for Sendloop: bulk send job
//! management, recipient ingestion, newsletter campaigns, and the
//! public unsubscribe endpoint.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod openapi;
pub mod routes;

pub use auth::AppState;
pub use openapi::create_openapi_routes;
pub use routes::create_router;
