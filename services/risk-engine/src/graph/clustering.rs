//! Fraud ring and cluster detection
//!
//! Three detectors over the entity graph:
//! - Rings: strongly connected components (circular relationships)
//! - Dense clusters: maximal cliques of the undirected projection with high
//!   directed edge density
//! - Stars: high-out-degree centers that are themselves risky
//!
//! Clique enumeration is the only super-linear pass; it stops after
//! `max_cliques` maximal cliques so a pathological graph cannot stall the
//! event pipeline.

use petgraph::algo::tarjan_scc;
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use riskmesh_common::EntityKey;
use riskmesh_config::EngineConfig;

use super::GraphStore;

/// A strongly connected component flagged as a fraud ring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ring {
    pub nodes: Vec<String>,
    pub size: usize,
    pub avg_risk: f64,
    pub max_risk: f64,
    pub risk_sum: f64,
}

/// A near-clique of risky entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseCluster {
    pub nodes: Vec<String>,
    pub size: usize,
    pub density: f64,
    pub avg_risk: f64,
}

/// A risky hub with many outgoing relationships.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Star {
    pub center: String,
    pub center_risk: f64,
    pub branches: usize,
    pub avg_neighbor_risk: f64,
}

/// Combined output of all three detectors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterReport {
    pub rings: Vec<Ring>,
    pub dense_clusters: Vec<DenseCluster>,
    pub stars: Vec<Star>,
}

impl ClusterReport {
    pub fn pattern_found(&self) -> bool {
        !self.rings.is_empty() || !self.dense_clusters.is_empty() || !self.stars.is_empty()
    }

    pub fn ring_containing(&self, key: &EntityKey) -> Option<&Ring> {
        let wire = key.to_string();
        self.rings.iter().find(|r| r.nodes.contains(&wire))
    }

    pub fn dense_containing(&self, key: &EntityKey) -> Option<&DenseCluster> {
        let wire = key.to_string();
        self.dense_clusters.iter().find(|c| c.nodes.contains(&wire))
    }

    pub fn star_centered_on(&self, key: &EntityKey) -> Option<&Star> {
        let wire = key.to_string();
        self.stars.iter().find(|s| s.center == wire)
    }
}

/// Ring, dense-cluster, and star detector.
#[derive(Debug, Clone)]
pub struct ClusterDetector {
    min_cluster_size: usize,
    min_avg_risk: f64,
    density_threshold: f64,
    star_min_degree: usize,
    max_cliques: usize,
}

impl ClusterDetector {
    pub fn new(
        min_cluster_size: usize,
        min_avg_risk: f64,
        density_threshold: f64,
        star_min_degree: usize,
        max_cliques: usize,
    ) -> Self {
        Self {
            min_cluster_size,
            min_avg_risk,
            density_threshold,
            star_min_degree,
            max_cliques,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.min_cluster_size,
            config.min_avg_risk,
            config.density_threshold,
            config.star_min_degree,
            config.max_cliques,
        )
    }

    /// Run every detector over the current graph.
    pub fn detect_all(&self, store: &GraphStore) -> ClusterReport {
        ClusterReport {
            rings: self.detect_rings(store),
            dense_clusters: self.detect_dense_subgraphs(store),
            stars: self.detect_star_patterns(store),
        }
    }

    /// Strongly connected components with enough members and enough risk.
    pub fn detect_rings(&self, store: &GraphStore) -> Vec<Ring> {
        let mut rings = Vec::new();

        for component in tarjan_scc(store.raw()) {
            if component.len() < self.min_cluster_size {
                continue;
            }

            let risks: Vec<f64> = component
                .iter()
                .map(|&idx| store.node(idx).risk_score)
                .collect();
            let risk_sum: f64 = risks.iter().sum();
            let avg_risk = risk_sum / risks.len() as f64;
            let max_risk = risks.iter().cloned().fold(0.0, f64::max);

            if avg_risk >= self.min_avg_risk {
                warn!(
                    size = component.len(),
                    avg_risk, "fraud ring detected"
                );
                rings.push(Ring {
                    nodes: component
                        .iter()
                        .map(|&idx| store.node(idx).key.to_string())
                        .collect(),
                    size: component.len(),
                    avg_risk,
                    max_risk,
                    risk_sum,
                });
            }
        }

        rings
    }

    /// Maximal cliques of the undirected projection whose directed edge
    /// density and mean risk clear the thresholds.
    pub fn detect_dense_subgraphs(&self, store: &GraphStore) -> Vec<DenseCluster> {
        let adjacency = undirected_projection(store);
        let mut cliques = Vec::new();
        let mut budget = self.max_cliques;

        let mut p: HashSet<NodeIndex> = adjacency.keys().copied().collect();
        let mut x = HashSet::new();
        bron_kerbosch(&adjacency, &mut Vec::new(), &mut p, &mut x, &mut cliques, &mut budget);
        if budget == 0 {
            debug!(cap = self.max_cliques, "clique enumeration stopped at cap");
        }

        let mut clusters = Vec::new();
        for clique in cliques {
            if clique.len() < self.min_cluster_size {
                continue;
            }

            let possible = clique.len() * (clique.len() - 1);
            let actual = directed_edges_within(store, &clique);
            let density = actual as f64 / possible as f64;
            if density < self.density_threshold {
                continue;
            }

            let risks: Vec<f64> = clique.iter().map(|&idx| store.node(idx).risk_score).collect();
            let avg_risk = risks.iter().sum::<f64>() / risks.len() as f64;
            if avg_risk < self.min_avg_risk {
                continue;
            }

            clusters.push(DenseCluster {
                nodes: clique
                    .iter()
                    .map(|&idx| store.node(idx).key.to_string())
                    .collect(),
                size: clique.len(),
                density,
                avg_risk,
            });
        }

        clusters
    }

    /// High-out-degree nodes whose own risk clears the cluster threshold.
    pub fn detect_star_patterns(&self, store: &GraphStore) -> Vec<Star> {
        let graph = store.raw();
        let mut stars = Vec::new();

        for idx in graph.node_indices() {
            let neighbors: Vec<NodeIndex> = graph.neighbors(idx).filter(|&n| n != idx).collect();
            if neighbors.len() < self.star_min_degree {
                continue;
            }

            let center = store.node(idx);
            if center.risk_score < self.min_avg_risk {
                continue;
            }

            let neighbor_risks: Vec<f64> =
                neighbors.iter().map(|&n| store.node(n).risk_score).collect();
            let avg_neighbor_risk = if neighbor_risks.is_empty() {
                0.0
            } else {
                neighbor_risks.iter().sum::<f64>() / neighbor_risks.len() as f64
            };

            warn!(center = %center.key, branches = neighbors.len(), "star pattern detected");
            stars.push(Star {
                center: center.key.to_string(),
                center_risk: center.risk_score,
                branches: neighbors.len(),
                avg_neighbor_risk,
            });
        }

        stars
    }
}

/// Symmetric neighbor sets over every node, self-loops dropped.
fn undirected_projection(store: &GraphStore) -> HashMap<NodeIndex, HashSet<NodeIndex>> {
    use petgraph::visit::EdgeRef;

    let graph = store.raw();
    let mut adjacency: HashMap<NodeIndex, HashSet<NodeIndex>> = graph
        .node_indices()
        .map(|idx| (idx, HashSet::new()))
        .collect();

    for edge in graph.edge_references() {
        let (a, b) = (edge.source(), edge.target());
        if a == b {
            continue;
        }
        if let Some(neighbors) = adjacency.get_mut(&a) {
            neighbors.insert(b);
        }
        if let Some(neighbors) = adjacency.get_mut(&b) {
            neighbors.insert(a);
        }
    }

    adjacency
}

/// Count directed edges whose endpoints both lie inside `members`.
fn directed_edges_within(store: &GraphStore, members: &[NodeIndex]) -> usize {
    let graph = store.raw();
    let mut count = 0;
    for &a in members {
        for &b in members {
            if a != b && graph.find_edge(a, b).is_some() {
                count += 1;
            }
        }
    }
    count
}

/// Bron-Kerbosch maximal clique enumeration with pivoting. `budget` bounds
/// the number of emitted cliques.
fn bron_kerbosch(
    adjacency: &HashMap<NodeIndex, HashSet<NodeIndex>>,
    current: &mut Vec<NodeIndex>,
    candidates: &mut HashSet<NodeIndex>,
    excluded: &mut HashSet<NodeIndex>,
    out: &mut Vec<Vec<NodeIndex>>,
    budget: &mut usize,
) {
    if *budget == 0 {
        return;
    }
    if candidates.is_empty() && excluded.is_empty() {
        out.push(current.clone());
        *budget -= 1;
        return;
    }

    // Pivot on the vertex covering the most candidates.
    let pivot = candidates
        .union(excluded)
        .max_by_key(|v| adjacency[v].intersection(candidates).count())
        .copied();
    let frontier: Vec<NodeIndex> = match pivot {
        Some(u) => candidates.difference(&adjacency[&u]).copied().collect(),
        None => candidates.iter().copied().collect(),
    };

    for v in frontier {
        let neighbors = &adjacency[&v];
        current.push(v);
        let mut next_candidates: HashSet<NodeIndex> =
            candidates.intersection(neighbors).copied().collect();
        let mut next_excluded: HashSet<NodeIndex> =
            excluded.intersection(neighbors).copied().collect();
        bron_kerbosch(adjacency, current, &mut next_candidates, &mut next_excluded, out, budget);
        current.pop();
        candidates.remove(&v);
        excluded.insert(v);
        if *budget == 0 {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn detector() -> ClusterDetector {
        ClusterDetector::new(3, 0.6, 0.5, 5, 256)
    }

    /// A -> B -> C -> A with the given risks.
    fn ring_graph(risks: [f64; 3]) -> (GraphStore, [EntityKey; 3]) {
        let mut g = GraphStore::new();
        let now = Utc::now();
        let a = EntityKey::user("a");
        let b = EntityKey::user("b");
        let c = EntityKey::user("c");
        g.upsert_node(&a, Some(risks[0]), now);
        g.upsert_node(&b, Some(risks[1]), now);
        g.upsert_node(&c, Some(risks[2]), now);
        g.upsert_edge(&a, &b, 0.8, now);
        g.upsert_edge(&b, &c, 0.8, now);
        g.upsert_edge(&c, &a, 0.8, now);
        (g, [a, b, c])
    }

    #[test]
    fn test_ring_detected() {
        let (g, [a, ..]) = ring_graph([0.8, 0.7, 0.6]);
        let rings = detector().detect_rings(&g);
        assert_eq!(rings.len(), 1);
        let ring = &rings[0];
        assert_eq!(ring.size, 3);
        assert!((ring.avg_risk - 0.7).abs() < 1e-9);
        assert_eq!(ring.max_risk, 0.8);
        assert!((ring.risk_sum - 2.1).abs() < 1e-9);
        assert!(ring.nodes.contains(&a.to_string()));
    }

    #[test]
    fn test_broken_cycle_is_not_a_ring() {
        let (mut g, _) = ring_graph([0.8, 0.7, 0.6]);
        // Rebuild without the closing edge.
        let mut open = GraphStore::new();
        let now = Utc::now();
        let a = EntityKey::user("a");
        let b = EntityKey::user("b");
        let c = EntityKey::user("c");
        open.upsert_node(&a, Some(0.8), now);
        open.upsert_node(&b, Some(0.7), now);
        open.upsert_node(&c, Some(0.6), now);
        open.upsert_edge(&a, &b, 0.8, now);
        open.upsert_edge(&b, &c, 0.8, now);
        assert!(detector().detect_rings(&open).is_empty());

        // And the full cycle with one risk dragged down fails the mean.
        g.set_risk(&EntityKey::user("a"), 0.1);
        g.set_risk(&EntityKey::user("b"), 0.1);
        assert!(detector().detect_rings(&g).is_empty());
    }

    #[test]
    fn test_dense_triangle_detected() {
        // The directed 3-cycle projects to an undirected triangle with
        // directed density 3/6 = 0.5, right at the threshold.
        let (g, _) = ring_graph([0.8, 0.7, 0.6]);
        let dense = detector().detect_dense_subgraphs(&g);
        assert_eq!(dense.len(), 1);
        assert_eq!(dense[0].size, 3);
        assert!((dense[0].density - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_sparse_triangle_rejected_by_density() {
        // A path a-b-c plus edge a-c gives a triangle in projection only if
        // all three undirected edges exist; drop one directed edge pair and
        // the clique shrinks below the size gate.
        let mut g = GraphStore::new();
        let now = Utc::now();
        let a = EntityKey::user("a");
        let b = EntityKey::user("b");
        let c = EntityKey::user("c");
        for k in [&a, &b, &c] {
            g.upsert_node(k, Some(0.9), now);
        }
        g.upsert_edge(&a, &b, 0.8, now);
        g.upsert_edge(&b, &c, 0.8, now);
        assert!(detector().detect_dense_subgraphs(&g).is_empty());
    }

    #[test]
    fn test_star_detected() {
        let mut g = GraphStore::new();
        let now = Utc::now();
        let center = EntityKey::user("hub");
        g.upsert_node(&center, Some(0.8), now);
        for i in 0..5 {
            let leaf = EntityKey::device(format!("d{i}"));
            g.upsert_node(&leaf, Some(0.5), now);
            g.upsert_edge(&center, &leaf, 0.8, now);
        }

        let stars = detector().detect_star_patterns(&g);
        assert_eq!(stars.len(), 1);
        let star = &stars[0];
        assert_eq!(star.center, center.to_string());
        assert_eq!(star.branches, 5);
        assert!((star.avg_neighbor_risk - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_star_requires_center_risk() {
        let mut g = GraphStore::new();
        let now = Utc::now();
        let center = EntityKey::user("hub");
        g.upsert_node(&center, Some(0.3), now);
        for i in 0..6 {
            g.upsert_edge(&center, &EntityKey::device(format!("d{i}")), 0.8, now);
        }
        assert!(detector().detect_star_patterns(&g).is_empty());
    }

    #[test]
    fn test_report_membership_helpers() {
        let (g, [a, ..]) = ring_graph([0.8, 0.7, 0.6]);
        let report = detector().detect_all(&g);
        assert!(report.pattern_found());
        assert!(report.ring_containing(&a).is_some());
        assert!(report.ring_containing(&EntityKey::user("outsider")).is_none());
        assert!(report.star_centered_on(&a).is_none());
    }

    #[test]
    fn test_clique_cap_bounds_enumeration() {
        let mut g = GraphStore::new();
        let now = Utc::now();
        // Many disjoint risky triangles; a cap of 2 stops after two cliques.
        for t in 0..10 {
            let a = EntityKey::user(format!("a{t}"));
            let b = EntityKey::user(format!("b{t}"));
            let c = EntityKey::user(format!("c{t}"));
            for k in [&a, &b, &c] {
                g.upsert_node(k, Some(0.9), now);
            }
            g.upsert_edge(&a, &b, 0.8, now);
            g.upsert_edge(&b, &a, 0.8, now);
            g.upsert_edge(&b, &c, 0.8, now);
            g.upsert_edge(&c, &b, 0.8, now);
            g.upsert_edge(&a, &c, 0.8, now);
            g.upsert_edge(&c, &a, 0.8, now);
        }

        let capped = ClusterDetector::new(3, 0.6, 0.5, 5, 2);
        let dense = capped.detect_dense_subgraphs(&g);
        assert!(dense.len() <= 2);
    }
}
