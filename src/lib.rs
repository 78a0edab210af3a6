//! Live Feed - real-time notification layer for a post feed
//!
//! Fans post events out to server-sent event streams and fronts the
//! identity and permission checks with a short-TTL cache.

pub mod api;
pub mod auth;
pub mod broadcast;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod posts;

pub use api::{create_router, AppState};
pub use config::Config;
