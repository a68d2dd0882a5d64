//! Time decay
//!
//! Risk loses relevance as entities go quiet. The operator applies
//! `risk * decay_factor^age_days` with a floor, where `age_days` is the
//! fractional age since the node was last seen. Values already at or below
//! the floor pass through unchanged, so decay is the identity at zero age
//! and monotone non-increasing in age for every input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use riskmesh_config::EngineConfig;

use super::GraphStore;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Coarse freshness bucket for an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgeCategory {
    Fresh,
    Recent,
    Medium,
    Old,
}

impl AgeCategory {
    pub fn from_age_days(age_days: f64) -> Self {
        if age_days < 1.0 {
            AgeCategory::Fresh
        } else if age_days < 7.0 {
            AgeCategory::Recent
        } else if age_days < 30.0 {
            AgeCategory::Medium
        } else {
            AgeCategory::Old
        }
    }
}

/// Exponential-age decay operator.
#[derive(Debug, Clone)]
pub struct TimeDecay {
    decay_factor: f64,
    min_risk: f64,
}

impl TimeDecay {
    pub fn new(decay_factor: f64, min_risk: f64) -> Self {
        Self {
            decay_factor,
            min_risk,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.decay_factor, config.min_risk)
    }

    /// Fractional days between `last_seen` and `now`, never negative.
    pub fn age_days(last_seen: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let seconds = (now - last_seen).num_milliseconds() as f64 / 1000.0;
        (seconds / SECONDS_PER_DAY).max(0.0)
    }

    /// Apply decay to one risk value. Returns `(decayed_risk, age_days)`.
    pub fn decay(&self, risk: f64, last_seen: DateTime<Utc>, now: DateTime<Utc>) -> (f64, f64) {
        let age = Self::age_days(last_seen, now);
        if risk <= self.min_risk {
            // Sub-floor values are left alone; decay never raises a risk.
            return (risk, age);
        }
        let decayed = (risk * self.decay_factor.powf(age)).max(self.min_risk);
        (decayed, age)
    }

    /// Apply decay to every node, writing back only changed values.
    ///
    /// Ages are measured from the later of `last_seen` and the node's
    /// `decayed_at` watermark, which advances on every write. Re-running the
    /// sweep with the same `now` is therefore a no-op. Returns the number of
    /// updated nodes.
    pub fn sweep(&self, store: &mut GraphStore, now: DateTime<Utc>) -> usize {
        let mut updated = 0;
        for node in store.nodes_mut() {
            let basis = node.last_seen.max(node.decayed_at);
            let (decayed, age) = self.decay(node.risk_score, basis, now);
            if decayed != node.risk_score {
                debug!(key = %node.key, from = node.risk_score, to = decayed, age_days = age, "risk decayed");
                node.risk_score = decayed;
                node.decayed_at = now;
                updated += 1;
            }
        }
        updated
    }
}
