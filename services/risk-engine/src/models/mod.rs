//! Wire and domain models for the risk engine service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use riskmesh_errors::RiskMeshError;

use crate::graph::clustering::ClusterReport;
use crate::graph::decay::AgeCategory;
use crate::risk::explainer::Explanation;

/// Transaction event submitted to `POST /api/event`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EventRequest {
    #[validate(length(min = 1))]
    pub user_id: String,

    #[validate(length(min = 1))]
    pub device_id: String,

    #[validate(length(min = 1))]
    pub ip_address: String,

    #[validate(length(min = 1))]
    pub merchant_id: String,

    pub transaction_amount: f64,
}

impl EventRequest {
    /// Field-level validation plus the numeric checks `validator` can't
    /// express: the amount must be finite and non-negative.
    pub fn check(&self) -> Result<(), RiskMeshError> {
        self.validate().map_err(|e| {
            RiskMeshError::validation(format!("invalid event: {e}"), None)
        })?;
        if !self.transaction_amount.is_finite() {
            return Err(RiskMeshError::validation(
                "transaction_amount must be a finite number",
                Some("transaction_amount"),
            ));
        }
        if self.transaction_amount < 0.0 {
            return Err(RiskMeshError::validation(
                "transaction_amount must not be negative",
                Some("transaction_amount"),
            ));
        }
        Ok(())
    }
}

/// Immutable per-event record appended to the transaction log.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TransactionRecord {
    pub transaction_id: Uuid,
    pub user_id: String,
    pub device_id: String,
    pub ip_address: String,
    pub merchant_id: String,
    pub transaction_amount: f64,
    pub risk_score: f64,
    pub propagation_depth: i32,
    pub timestamp: DateTime<Utc>,
}

/// Response for `POST /api/event`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskResponse {
    pub transaction_id: Uuid,
    pub risk_score: f64,
    pub base_risk: f64,
    pub clustering_boost: f64,
    pub propagation_depth: i32,
    pub propagation_latency_ms: f64,
    pub total_latency_ms: f64,
    pub timestamp: DateTime<Utc>,
    pub cached: bool,
    pub explanation: Option<Explanation>,
    pub clustering_info: Option<ClusterReport>,
}

/// Response for `GET /api/stats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub graph_nodes: usize,
    pub graph_edges: usize,
    pub timestamp: DateTime<Utc>,
}

/// One bucket of the risk histogram.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// Inclusive lower bound of the bucket.
    pub from: f64,
    /// Exclusive upper bound (inclusive for the last bucket).
    pub to: f64,
    pub count: usize,
}

/// Percentiles of the observed risk distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskPercentiles {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Response for `GET /api/analytics/risk-distribution`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskDistribution {
    pub hours: u32,
    pub total_transactions: usize,
    pub mean_risk: f64,
    pub min_risk: f64,
    pub max_risk: f64,
    pub histogram: Vec<HistogramBucket>,
    pub percentiles: RiskPercentiles,
    pub high_risk_count: usize,
    pub medium_risk_count: usize,
    pub low_risk_count: usize,
    pub timestamp: DateTime<Utc>,
}

/// Response for `GET /api/analytics/user/{user_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBehavior {
    pub user_id: String,
    pub days: u32,
    pub total_transactions: usize,
    pub avg_amount: f64,
    pub max_amount: f64,
    pub min_amount: f64,
    pub avg_risk: f64,
    pub max_risk: f64,
    pub unique_merchants: usize,
    pub unique_devices: usize,
    pub unique_ips: usize,
    pub high_risk_ratio: f64,
    pub trend: RiskTrend,
    /// Freshness of the user's latest transaction.
    pub recency: AgeCategory,
    pub timestamp: DateTime<Utc>,
}

/// Direction of a user's recent risk relative to their average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTrend {
    Increasing,
    Stable,
}

/// One entry of `GET /api/analytics/top-risky`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TopRiskyUser {
    pub user_id: String,
    pub transaction_count: i64,
    pub avg_risk: f64,
    pub max_risk: f64,
}

/// Response for `GET /api/analytics/performance`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub hours: u32,
    pub total_transactions: usize,
    pub flagged_count: usize,
    pub flag_rate_percent: f64,
    pub throughput_per_hour: f64,
    pub avg_propagation_depth: f64,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(amount: f64) -> EventRequest {
        EventRequest {
            user_id: "u1".to_string(),
            device_id: "d1".to_string(),
            ip_address: "10.0.0.1".to_string(),
            merchant_id: "m1".to_string(),
            transaction_amount: amount,
        }
    }

    #[test]
    fn test_valid_event_passes() {
        event(50.0).check().unwrap();
    }

    #[test]
    fn test_empty_field_rejected() {
        let mut e = event(50.0);
        e.user_id = String::new();
        assert!(e.check().is_err());
    }

    #[test]
    fn test_non_finite_amount_rejected() {
        assert!(event(f64::NAN).check().is_err());
        assert!(event(f64::INFINITY).check().is_err());
    }

    #[test]
    fn test_negative_amount_rejected() {
        assert!(event(-1.0).check().is_err());
    }
}
