//! API Module
//!
//! HTTP handlers and routing for the notification service.
//!
//! # Endpoints
//! - `GET /api/events` - Server-sent event stream
//! - `/api/*` post endpoints - Token-authenticated post operations
//! - `GET /stats` - Cache and subscriber statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
