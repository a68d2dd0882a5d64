//! Risk engine tunables
//!
//! Every scoring constant lives here so operators can retune the engine
//! without touching code. The defaults are the calibrated production values.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Fixed conductances for the four edges an event upserts.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EdgeWeights {
    #[validate(range(min = 0.0, max = 1.0))]
    pub user_device: f64,

    #[validate(range(min = 0.0, max = 1.0))]
    pub user_ip: f64,

    #[validate(range(min = 0.0, max = 1.0))]
    pub device_ip: f64,

    #[validate(range(min = 0.0, max = 1.0))]
    pub device_merchant: f64,
}

impl Default for EdgeWeights {
    fn default() -> Self {
        Self {
            user_device: 0.8,
            user_ip: 0.7,
            device_ip: 0.9,
            device_merchant: 0.6,
        }
    }
}

/// Tunables for the per-event scoring pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EngineConfig {
    /// Propagation coefficient applied to each hop.
    #[validate(range(min = 0.0, max = 1.0))]
    pub alpha: f64,

    /// Maximum BFS frontier expansions during propagation.
    #[validate(range(min = 0, max = 16))]
    pub max_depth: u32,

    /// Minimum source risk required to trigger propagation.
    #[validate(range(min = 0.0, max = 1.0))]
    pub risk_threshold: f64,

    /// Per-day multiplicative retention coefficient.
    #[validate(range(min = 0.0, max = 1.0))]
    pub decay_factor: f64,

    /// Floor below which decay never pushes a risk.
    #[validate(range(min = 0.0, max = 1.0))]
    pub min_risk: f64,

    /// Whether the per-event decay sweep runs.
    pub decay_enabled: bool,

    /// Transaction amount above which the high-amount rule fires.
    #[validate(range(min = 0.0))]
    pub high_amount_threshold: f64,

    /// Minimum member count for rings and dense clusters.
    #[validate(range(min = 2))]
    pub min_cluster_size: usize,

    /// Minimum mean member risk for any cluster pattern.
    #[validate(range(min = 0.0, max = 1.0))]
    pub min_avg_risk: f64,

    /// Minimum directed edge density for a dense cluster.
    #[validate(range(min = 0.0, max = 1.0))]
    pub density_threshold: f64,

    /// Minimum out-degree for a star center.
    #[validate(range(min = 1))]
    pub star_min_degree: usize,

    /// Maximal cliques examined per sweep before enumeration stops.
    #[validate(range(min = 1))]
    pub max_cliques: usize,

    /// Whether per-event cluster detection runs.
    pub clustering_enabled: bool,

    /// Boost when the focal user sits in a ring.
    #[validate(range(min = 0.0, max = 1.0))]
    pub ring_boost: f64,

    /// Boost when the focal user is a star center.
    #[validate(range(min = 0.0, max = 1.0))]
    pub star_boost: f64,

    /// Boost when the focal user sits in a dense cluster.
    #[validate(range(min = 0.0, max = 1.0))]
    pub dense_boost: f64,

    /// Cached user risk above which the fast path short-circuits scoring.
    #[validate(range(min = 0.0, max = 1.0))]
    pub cache_fast_path_threshold: f64,

    /// Final risk above which the result is written to the cache.
    #[validate(range(min = 0.0, max = 1.0))]
    pub cache_write_threshold: f64,

    /// TTL for cached user risks.
    #[validate(range(min = 1))]
    pub cache_ttl_minutes: u64,

    /// Budget for a single cache round trip.
    #[validate(range(min = 1))]
    pub cache_timeout_ms: u64,

    /// Budget for a single persistence round trip.
    #[validate(range(min = 1))]
    pub persist_timeout_ms: u64,

    /// Overall per-request deadline, checked before graph mutation.
    #[validate(range(min = 1))]
    pub request_deadline_ms: u64,

    /// Events admitted to the pipeline concurrently before shedding.
    #[validate(range(min = 1))]
    pub max_concurrent_events: usize,

    /// Edge weights for the four per-event upserts.
    #[validate(nested)]
    pub edge_weights: EdgeWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            max_depth: 2,
            risk_threshold: 0.1,
            decay_factor: 0.995,
            min_risk: 0.01,
            decay_enabled: true,
            high_amount_threshold: 1000.0,
            min_cluster_size: 3,
            min_avg_risk: 0.6,
            density_threshold: 0.5,
            star_min_degree: 5,
            max_cliques: 256,
            clustering_enabled: true,
            ring_boost: 0.15,
            star_boost: 0.15,
            dense_boost: 0.10,
            cache_fast_path_threshold: 0.7,
            cache_write_threshold: 0.3,
            cache_ttl_minutes: 30,
            cache_timeout_ms: 50,
            persist_timeout_ms: 200,
            request_deadline_ms: 1000,
            max_concurrent_events: 256,
            edge_weights: EdgeWeights::default(),
        }
    }
}

impl EngineConfig {
    /// Largest boost any single cluster pattern can contribute.
    pub fn max_boost(&self) -> f64 {
        self.ring_boost.max(self.star_boost).max(self.dense_boost)
    }
}
