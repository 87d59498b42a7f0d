//! API routes.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;

use crate::handlers::{health, ready, submit_narration, submit_quiz};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit, request_id, request_logging, security_headers, ClientRateLimiter,
};
use crate::state::AppState;

pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let limiter = ClientRateLimiter::new(state.config.rate_limit_rps);

    let video_routes = Router::new()
        .route("/videos/narration", post(submit_narration))
        .route("/videos/quiz", post(submit_quiz))
        .layer(middleware::from_fn_with_state(limiter, rate_limit));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    let metrics_routes = match metrics_handle {
        Some(handle) => Router::new().route("/metrics", get(move || async move { handle.render() })),
        None => Router::new(),
    };

    let max_body = state.config.max_body_size;
    Router::new()
        .nest("/api", video_routes)
        .nest_service("/temp", ServeDir::new(&state.temp_dir))
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(DefaultBodyLimit::max(max_body))
        .layer(RequestBodyLimitLayer::new(max_body))
        .layer(TimeoutLayer::new(state.config.request_timeout))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_logging))
        .layer(middleware::from_fn(request_id))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
