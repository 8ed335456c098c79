//! API request handlers

pub mod health;
pub mod ingest;
pub mod jobs;
pub mod newsletter;
pub mod recipient_lists;
pub mod templates;
pub mod unsubscribes;

pub use health::*;
