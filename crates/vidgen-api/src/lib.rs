//! Axum HTTP API for video render submissions.
//!
//! This crate provides:
//! - Narration and quiz submission endpoints backed by the worker intake
//! - Firebase ID token verification
//! - Per-client rate limiting and security headers
//! - Static serving of temporary render assets
//! - Prometheus metrics, liveness and readiness probes

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
