//! Risk propagation
//!
//! Bounded-depth BFS that distributes a source node's risk along weighted
//! out-edges:
//!
//! ```text
//! new_risk(M) = min(1.0, stored_risk(M) + alpha * carried_risk(N) * weight(N->M))
//! ```
//!
//! Each node is visited at most once; with several inbound paths the first
//! touch in BFS order wins, which keeps the traversal linear in visited
//! edges. The source's own risk is never re-raised by back-edges.

use std::collections::{HashMap, HashSet};
use tracing::debug;

use riskmesh_common::EntityKey;
use riskmesh_config::EngineConfig;

use super::GraphStore;

/// Result of one propagation pass.
#[derive(Debug, Clone)]
pub struct PropagationOutcome {
    /// New risk for every touched node, the source included.
    pub risks: HashMap<EntityKey, f64>,
    /// Deepest BFS layer that produced a new-risk write (0 when nothing
    /// beyond the source was touched).
    pub deepest_write: u32,
}

impl PropagationOutcome {
    fn source_only(source: &EntityKey, source_risk: f64) -> Self {
        Self {
            risks: HashMap::from([(source.clone(), source_risk)]),
            deepest_write: 0,
        }
    }
}

/// Bounded-depth BFS propagator.
#[derive(Debug, Clone)]
pub struct RiskPropagator {
    alpha: f64,
    max_depth: u32,
    risk_threshold: f64,
}

impl RiskPropagator {
    pub fn new(alpha: f64, max_depth: u32, risk_threshold: f64) -> Self {
        Self {
            alpha,
            max_depth,
            risk_threshold,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.alpha, config.max_depth, config.risk_threshold)
    }

    /// Propagate `source_risk` outward from `source`.
    ///
    /// Sources below the trigger threshold short-circuit to a map containing
    /// only themselves.
    pub fn propagate(
        &self,
        store: &GraphStore,
        source: &EntityKey,
        source_risk: f64,
    ) -> PropagationOutcome {
        if source_risk < self.risk_threshold {
            debug!(
                source = %source,
                risk = source_risk,
                threshold = self.risk_threshold,
                "risk below threshold, skipping propagation"
            );
            return PropagationOutcome::source_only(source, source_risk);
        }

        let Some(start) = store.index_of(source) else {
            return PropagationOutcome::source_only(source, source_risk);
        };

        let mut risks = HashMap::from([(source.clone(), source_risk)]);
        let mut visited = HashSet::from([start]);
        let mut frontier = vec![(start, source_risk)];
        let mut deepest_write = 0;

        for depth in 1..=self.max_depth {
            let mut next = Vec::new();

            for (node, carried) in &frontier {
                for (neighbor, weight) in store.out_edges(*node) {
                    // Self-loops and already-touched nodes (the source
                    // included) are skipped; first touch wins.
                    if !visited.insert(neighbor) {
                        continue;
                    }

                    let data = store.node(neighbor);
                    let propagated = self.alpha * carried * weight;
                    let new_risk = (data.risk_score + propagated).min(1.0);

                    debug!(
                        node = %data.key,
                        base = data.risk_score,
                        propagated,
                        new_risk,
                        depth,
                        "risk propagated"
                    );

                    risks.insert(data.key.clone(), new_risk);
                    next.push((neighbor, new_risk));
                    deepest_write = depth;
                }
            }

            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        PropagationOutcome { risks, deepest_write }
    }
}
