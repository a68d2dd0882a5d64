//! Risk analytics
//!
//! Statistical views over the transaction log: score distribution with
//! percentiles, per-user behavior, top risky users, and throughput. All
//! numbers are computed from the records the log returns so the analytics
//! work identically against Postgres and the in-memory log.

use chrono::{Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;

use riskmesh_errors::Result;

use crate::graph::decay::{AgeCategory, TimeDecay};
use crate::models::{
    HistogramBucket, PerformanceReport, RiskDistribution, RiskPercentiles, RiskTrend, TopRiskyUser,
    TransactionRecord, UserBehavior,
};
use crate::storage::TransactionLog;

const HISTOGRAM_BUCKETS: usize = 10;
const HIGH_RISK: f64 = 0.6;
const LOW_RISK: f64 = 0.3;

/// Analytics engine over the transaction log.
pub struct RiskAnalytics {
    log: Arc<dyn TransactionLog>,
}

impl RiskAnalytics {
    pub fn new(log: Arc<dyn TransactionLog>) -> Self {
        Self { log }
    }

    /// Risk score distribution over the last `hours`.
    pub async fn risk_distribution(&self, hours: u32) -> Result<RiskDistribution> {
        let cutoff = Utc::now() - Duration::hours(hours as i64);
        let records = self.log.since(cutoff).await?;
        let mut risks: Vec<f64> = records.iter().map(|r| r.risk_score).collect();
        risks.sort_by(f64::total_cmp);

        let total = risks.len();
        let (mean, min, max) = if total == 0 {
            (0.0, 0.0, 0.0)
        } else {
            (
                risks.iter().sum::<f64>() / total as f64,
                risks[0],
                risks[total - 1],
            )
        };

        Ok(RiskDistribution {
            hours,
            total_transactions: total,
            mean_risk: mean,
            min_risk: min,
            max_risk: max,
            histogram: histogram(&risks),
            percentiles: RiskPercentiles {
                p50: percentile(&risks, 0.50),
                p95: percentile(&risks, 0.95),
                p99: percentile(&risks, 0.99),
            },
            high_risk_count: risks.iter().filter(|&&r| r >= HIGH_RISK).count(),
            medium_risk_count: risks
                .iter()
                .filter(|&&r| (LOW_RISK..HIGH_RISK).contains(&r))
                .count(),
            low_risk_count: risks.iter().filter(|&&r| r < LOW_RISK).count(),
            timestamp: Utc::now(),
        })
    }

    /// One user's transaction behavior over the last `days`.
    pub async fn user_behavior(&self, user_id: &str, days: u32) -> Result<UserBehavior> {
        let cutoff = Utc::now() - Duration::days(days as i64);
        let records = self.log.for_user(user_id, cutoff).await?;

        if records.is_empty() {
            return Ok(UserBehavior {
                user_id: user_id.to_string(),
                days,
                total_transactions: 0,
                avg_amount: 0.0,
                max_amount: 0.0,
                min_amount: 0.0,
                avg_risk: 0.0,
                max_risk: 0.0,
                unique_merchants: 0,
                unique_devices: 0,
                unique_ips: 0,
                high_risk_ratio: 0.0,
                trend: RiskTrend::Stable,
                recency: AgeCategory::Old,
                timestamp: Utc::now(),
            });
        }

        let total = records.len();
        let amounts: Vec<f64> = records.iter().map(|r| r.transaction_amount).collect();
        let risks: Vec<f64> = records.iter().map(|r| r.risk_score).collect();
        let avg_risk = risks.iter().sum::<f64>() / total as f64;

        let merchants: HashSet<&str> = records.iter().map(|r| r.merchant_id.as_str()).collect();
        let devices: HashSet<&str> = records.iter().map(|r| r.device_id.as_str()).collect();
        let ips: HashSet<&str> = records.iter().map(|r| r.ip_address.as_str()).collect();

        // The log returns records oldest first; the trend compares the
        // latest score against the user's average.
        let trend = if risks[total - 1] > avg_risk {
            RiskTrend::Increasing
        } else {
            RiskTrend::Stable
        };
        let recency =
            AgeCategory::from_age_days(TimeDecay::age_days(records[total - 1].timestamp, Utc::now()));

        Ok(UserBehavior {
            user_id: user_id.to_string(),
            days,
            total_transactions: total,
            avg_amount: amounts.iter().sum::<f64>() / total as f64,
            max_amount: amounts.iter().cloned().fold(f64::MIN, f64::max),
            min_amount: amounts.iter().cloned().fold(f64::MAX, f64::min),
            avg_risk,
            max_risk: risks.iter().cloned().fold(0.0, f64::max),
            unique_merchants: merchants.len(),
            unique_devices: devices.len(),
            unique_ips: ips.len(),
            high_risk_ratio: risks.iter().filter(|&&r| r >= HIGH_RISK).count() as f64 / total as f64,
            trend,
            recency,
            timestamp: Utc::now(),
        })
    }

    /// Users ranked by mean risk, descending.
    pub async fn top_risky_users(&self, limit: u32) -> Result<Vec<TopRiskyUser>> {
        self.log.top_risky(limit as i64).await
    }

    /// Throughput and flagging rates over the last `hours`.
    pub async fn performance(&self, hours: u32) -> Result<PerformanceReport> {
        let cutoff = Utc::now() - Duration::hours(hours as i64);
        let records = self.log.since(cutoff).await?;
        let total = records.len();

        let (flagged, flag_rate, avg_depth) = if total == 0 {
            (0, 0.0, 0.0)
        } else {
            let flagged = records.iter().filter(|r| r.risk_score >= HIGH_RISK).count();
            let avg_depth = records
                .iter()
                .map(|r| r.propagation_depth as f64)
                .sum::<f64>()
                / total as f64;
            (flagged, flagged as f64 / total as f64 * 100.0, avg_depth)
        };

        Ok(PerformanceReport {
            hours,
            total_transactions: total,
            flagged_count: flagged,
            flag_rate_percent: flag_rate,
            throughput_per_hour: total as f64 / hours.max(1) as f64,
            avg_propagation_depth: avg_depth,
            timestamp: Utc::now(),
        })
    }
}

/// Nearest-rank percentile over an ascending-sorted slice.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((sorted.len() as f64 * q).ceil() as usize).clamp(1, sorted.len());
    sorted[rank - 1]
}

/// Fixed-width histogram over `[0, 1]`.
fn histogram(risks: &[f64]) -> Vec<HistogramBucket> {
    let width = 1.0 / HISTOGRAM_BUCKETS as f64;
    (0..HISTOGRAM_BUCKETS)
        .map(|i| {
            let from = i as f64 * width;
            let to = from + width;
            let last = i == HISTOGRAM_BUCKETS - 1;
            let count = risks
                .iter()
                .filter(|&&r| r >= from && (r < to || (last && r <= to)))
                .count();
            HistogramBucket { from, to, count }
        })
        .collect()
}
