//! Sendloop Storage - Database layer
//!
//! This crate provides the PostgreSQL storage layer for Sendloop:
//! connection pooling, migrations, models, and repositories.

pub mod db;
pub mod models;
pub mod repository;

pub use db::{Database, DatabasePool};
pub use models::*;
pub use repository::*;
