//! HTTP surface
//!
//! Router, shared state, API key authentication, and handlers. `/health`
//! and `/metrics` are open; everything under `/api` requires a valid
//! `X-API-Key` and is subject to that key's rate limit.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::analytics::RiskAnalytics;
use crate::cache::RiskCache;
use crate::metrics::Metrics;
use crate::risk::RiskEngine;

use auth::ApiKeyRegistry;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RiskEngine>,
    pub analytics: Arc<RiskAnalytics>,
    pub cache: Option<Arc<dyn RiskCache>>,
    pub metrics: Arc<Metrics>,
    pub auth: Arc<ApiKeyRegistry>,
}

/// Create the application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/event", post(handlers::handle_event))
        .route("/stats", get(handlers::get_stats))
        .route("/cache/stats", get(handlers::get_cache_stats))
        .route("/analytics/risk-distribution", get(handlers::get_risk_distribution))
        .route("/analytics/user/:user_id", get(handlers::get_user_behavior))
        .route("/analytics/top-risky", get(handlers::get_top_risky))
        .route("/analytics/performance", get(handlers::get_performance))
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_middleware));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::export_metrics))
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
