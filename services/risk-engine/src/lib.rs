//! RiskMesh Risk Engine Service
//!
//! This service computes per-transaction fraud risk in real time by
//! maintaining a directed, weighted entity relationship graph and
//! propagating risk across it:
//! - Typed entity graph (users, devices, IPs, merchants) with per-node risk
//! - Rule-based base risk with per-rule attribution
//! - Bounded-depth BFS risk propagation along weighted edges
//! - Exponential time decay of stale risk
//! - Fraud ring, dense cluster, and star pattern detection
//! - Deterministic risk explanations with recommendations
//! - Redis-backed hot-user cache and append-only transaction log

pub mod analytics;
pub mod api;
pub mod cache;
pub mod graph;
pub mod metrics;
pub mod models;
pub mod risk;
pub mod storage;
