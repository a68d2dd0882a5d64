//! HTTP handlers for the risk engine API

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use riskmesh_common::constants::app;
use riskmesh_errors::{Result, RiskMeshError};

use crate::cache::CacheStats;
use crate::models::{
    EventRequest, PerformanceReport, RiskDistribution, RiskResponse, StatsResponse, TopRiskyUser,
    UserBehavior,
};

use super::AppState;

/// Lookback window for the distribution and performance queries.
#[derive(Debug, Deserialize)]
pub struct HoursQuery {
    pub hours: Option<u32>,
}

impl HoursQuery {
    fn resolve(&self) -> Result<u32> {
        let hours = self.hours.unwrap_or(24);
        if !(1..=720).contains(&hours) {
            return Err(RiskMeshError::validation(
                "hours must be between 1 and 720",
                Some("hours"),
            ));
        }
        Ok(hours)
    }
}

/// Lookback window for per-user behavior.
#[derive(Debug, Deserialize)]
pub struct DaysQuery {
    pub days: Option<u32>,
}

impl DaysQuery {
    fn resolve(&self) -> Result<u32> {
        let days = self.days.unwrap_or(30);
        if !(1..=365).contains(&days) {
            return Err(RiskMeshError::validation(
                "days must be between 1 and 365",
                Some("days"),
            ));
        }
        Ok(days)
    }
}

/// Result cap for the top-risky ranking.
#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

impl LimitQuery {
    fn resolve(&self) -> Result<u32> {
        let limit = self.limit.unwrap_or(10);
        if !(1..=100).contains(&limit) {
            return Err(RiskMeshError::validation(
                "limit must be between 1 and 100",
                Some("limit"),
            ));
        }
        Ok(limit)
    }
}

/// Process a transaction event and return its risk score.
pub async fn handle_event(
    State(state): State<AppState>,
    Json(event): Json<EventRequest>,
) -> Result<Json<RiskResponse>> {
    state.metrics.requests_total.inc();

    match state.engine.process_event(event).await {
        Ok(response) => {
            state.metrics.request_latency_ms.observe(response.total_latency_ms);
            state
                .metrics
                .propagation_latency_ms
                .observe(response.propagation_latency_ms);

            let (nodes, edges) = state.engine.stats().await;
            state.metrics.graph_nodes.set(nodes as i64);
            state.metrics.graph_edges.set(edges as i64);

            info!(
                transaction_id = %response.transaction_id,
                risk = response.risk_score,
                latency_ms = response.total_latency_ms,
                "event scored"
            );
            Ok(Json(response))
        }
        Err(e) => {
            if !e.is_client_error() {
                state.metrics.errors_total.inc();
            }
            Err(e)
        }
    }
}

/// Current graph size.
pub async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let (graph_nodes, graph_edges) = state.engine.stats().await;
    Json(StatsResponse {
        graph_nodes,
        graph_edges,
        timestamp: Utc::now(),
    })
}

/// Cache counters, or a disabled marker when no cache is wired.
pub async fn get_cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    match &state.cache {
        Some(cache) => Json(cache.stats().await),
        None => Json(CacheStats {
            enabled: false,
            backend: "none".to_string(),
            hits: 0,
            misses: 0,
            sets: 0,
            entries: None,
        }),
    }
}

/// Risk score distribution over the last N hours.
pub async fn get_risk_distribution(
    State(state): State<AppState>,
    Query(query): Query<HoursQuery>,
) -> Result<Json<RiskDistribution>> {
    let hours = query.resolve()?;
    Ok(Json(state.analytics.risk_distribution(hours).await?))
}

/// One user's transaction behavior over the last N days.
pub async fn get_user_behavior(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<DaysQuery>,
) -> Result<Json<UserBehavior>> {
    let days = query.resolve()?;
    Ok(Json(state.analytics.user_behavior(&user_id, days).await?))
}

/// Users ranked by mean risk.
pub async fn get_top_risky(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<TopRiskyUser>>> {
    let limit = query.resolve()?;
    Ok(Json(state.analytics.top_risky_users(limit).await?))
}

/// Throughput and flagging rates over the last N hours.
pub async fn get_performance(
    State(state): State<AppState>,
    Query(query): Query<HoursQuery>,
) -> Result<Json<PerformanceReport>> {
    let hours = query.resolve()?;
    Ok(Json(state.analytics.performance(hours).await?))
}

/// Liveness probe.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": app::NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now(),
    }))
}

/// Prometheus text exposition.
pub async fn export_metrics(State(state): State<AppState>) -> Result<String> {
    state.metrics.render()
}
