//! Entity relationship graph
//!
//! The graph is the process-wide working set: a directed, weighted graph of
//! typed entities (users, devices, IPs, merchants) with per-node risk. Nodes
//! live in a petgraph arena addressed by stable indices; a composite-key map
//! provides the external lookup. Entities are inherently cyclic (rings are
//! the point), so the arena avoids owned-reference cycles entirely.

pub mod clustering;
pub mod decay;
pub mod propagation;

use chrono::{DateTime, Utc};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

use riskmesh_common::{saturate, EntityKey, NodeKind};

/// Per-node attributes.
#[derive(Debug, Clone)]
pub struct NodeData {
    pub key: EntityKey,
    /// The entity type as recorded at creation; `Unknown` until an explicit
    /// upsert names a concrete kind.
    pub kind: NodeKind,
    pub risk_score: f64,
    pub last_seen: DateTime<Utc>,
    /// Instant up to which decay has already been applied to `risk_score`.
    /// Keeps repeated sweeps at the same `now` from compounding.
    pub decayed_at: DateTime<Utc>,
}

/// Per-edge attributes.
#[derive(Debug, Clone)]
pub struct EdgeData {
    /// Propagation conductance in `[0, 1]`.
    pub weight: f64,
    /// How many events re-asserted this relationship.
    pub interaction_count: u64,
}

/// Directed entity graph with a composite-key index over the node arena.
#[derive(Debug, Default)]
pub struct GraphStore {
    graph: DiGraph<NodeData, EdgeData>,
    index: HashMap<EntityKey, NodeIndex>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or update a node.
    ///
    /// On an existing key the risk is overwritten only when `risk` is
    /// `Some`; `last_seen` never moves backward; an `Unknown` kind upgrades
    /// to the kind named by the key.
    pub fn upsert_node(&mut self, key: &EntityKey, risk: Option<f64>, now: DateTime<Utc>) -> NodeIndex {
        if let Some(&idx) = self.index.get(key) {
            let node = &mut self.graph[idx];
            if let Some(risk) = risk {
                node.risk_score = saturate(risk);
            }
            if node.kind == NodeKind::Unknown && key.kind() != NodeKind::Unknown {
                node.kind = key.kind();
            }
            if now > node.last_seen {
                node.last_seen = now;
            }
            idx
        } else {
            let idx = self.graph.add_node(NodeData {
                key: key.clone(),
                kind: key.kind(),
                risk_score: saturate(risk.unwrap_or(0.0)),
                last_seen: now,
                decayed_at: now,
            });
            self.index.insert(key.clone(), idx);
            debug!(key = %key, "node created");
            idx
        }
    }

    /// Add or update the directed edge `src -> dst`.
    ///
    /// Missing endpoints are created as `Unknown` with risk 0. A re-add
    /// increments `interaction_count` and takes the new weight.
    pub fn upsert_edge(&mut self, src: &EntityKey, dst: &EntityKey, weight: f64, now: DateTime<Utc>) {
        let src_idx = self.ensure_endpoint(src, now);
        let dst_idx = self.ensure_endpoint(dst, now);
        let weight = weight.clamp(0.0, 1.0);

        if let Some(edge_idx) = self.graph.find_edge(src_idx, dst_idx) {
            let edge = &mut self.graph[edge_idx];
            edge.interaction_count += 1;
            edge.weight = weight;
        } else {
            self.graph.add_edge(
                src_idx,
                dst_idx,
                EdgeData {
                    weight,
                    interaction_count: 1,
                },
            );
        }
    }

    /// Endpoint creation keeps the placeholder kind; only an explicit node
    /// upsert names the concrete type.
    fn ensure_endpoint(&mut self, key: &EntityKey, now: DateTime<Utc>) -> NodeIndex {
        if let Some(&idx) = self.index.get(key) {
            if now > self.graph[idx].last_seen {
                self.graph[idx].last_seen = now;
            }
            idx
        } else {
            let idx = self.graph.add_node(NodeData {
                key: key.clone(),
                kind: NodeKind::Unknown,
                risk_score: 0.0,
                last_seen: now,
                decayed_at: now,
            });
            self.index.insert(key.clone(), idx);
            idx
        }
    }

    pub fn get_node(&self, key: &EntityKey) -> Option<&NodeData> {
        self.index.get(key).map(|&idx| &self.graph[idx])
    }

    pub fn has_edge(&self, src: &EntityKey, dst: &EntityKey) -> bool {
        match (self.index.get(src), self.index.get(dst)) {
            (Some(&s), Some(&d)) => self.graph.find_edge(s, d).is_some(),
            _ => false,
        }
    }

    pub fn edge(&self, src: &EntityKey, dst: &EntityKey) -> Option<&EdgeData> {
        let s = *self.index.get(src)?;
        let d = *self.index.get(dst)?;
        self.graph.find_edge(s, d).map(|e| &self.graph[e])
    }

    /// Overwrite a node's risk (saturated). Returns false if the key is
    /// absent.
    pub fn set_risk(&mut self, key: &EntityKey, risk: f64) -> bool {
        match self.index.get(key) {
            Some(&idx) => {
                self.graph[idx].risk_score = saturate(risk);
                true
            }
            None => false,
        }
    }

    /// Out-neighbors of `key` in arbitrary order.
    pub fn successors(&self, key: &EntityKey) -> Vec<EntityKey> {
        match self.index.get(key) {
            Some(&idx) => self
                .graph
                .neighbors(idx)
                .map(|n| self.graph[n].key.clone())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Unique nodes reachable in `1..=depth` out-edge hops, in BFS discovery
    /// order, excluding the origin.
    pub fn neighbors_within(&self, key: &EntityKey, depth: u32) -> Vec<EntityKey> {
        let Some(&start) = self.index.get(key) else {
            return Vec::new();
        };

        let mut discovered = Vec::new();
        let mut visited: HashSet<NodeIndex> = HashSet::from([start]);
        let mut frontier: VecDeque<NodeIndex> = VecDeque::from([start]);

        for _ in 0..depth {
            let mut next = VecDeque::new();
            while let Some(current) = frontier.pop_front() {
                for neighbor in self.graph.neighbors(current) {
                    if visited.insert(neighbor) {
                        discovered.push(self.graph[neighbor].key.clone());
                        next.push_back(neighbor);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        discovered
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn iter_nodes(&self) -> impl Iterator<Item = &NodeData> {
        self.graph.node_weights()
    }

    // Internal accessors for the propagation, decay, and clustering passes.

    pub(crate) fn index_of(&self, key: &EntityKey) -> Option<NodeIndex> {
        self.index.get(key).copied()
    }

    pub(crate) fn node(&self, idx: NodeIndex) -> &NodeData {
        &self.graph[idx]
    }

    pub(crate) fn out_edges(&self, idx: NodeIndex) -> impl Iterator<Item = (NodeIndex, f64)> + '_ {
        use petgraph::visit::EdgeRef;
        self.graph.edges(idx).map(|e| (e.target(), e.weight().weight))
    }

    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut NodeData> {
        self.graph.node_weights_mut()
    }

    pub(crate) fn raw(&self) -> &DiGraph<NodeData, EdgeData> {
        &self.graph
    }
}
