//! Risk engine orchestrator
//!
//! Runs the per-event pipeline: cache probe, graph transaction (snapshot,
//! upserts, base risk, decay, propagation, clustering) under the writer
//! lock, then explanation, persistence, and cache write outside it.
//! Collaborator failures degrade features; only invalid input, overload, or
//! a blown pre-mutation deadline fail the request.

use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, Semaphore};
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use riskmesh_common::{saturate, EntityKey};
use riskmesh_config::EngineConfig;
use riskmesh_errors::{Result, RiskMeshError};

use crate::cache::RiskCache;
use crate::graph::clustering::{ClusterDetector, ClusterReport};
use crate::graph::decay::TimeDecay;
use crate::graph::propagation::{PropagationOutcome, RiskPropagator};
use crate::graph::GraphStore;
use crate::models::{EventRequest, RiskResponse, TransactionRecord};
use crate::risk::base::{BaseRisk, BaseRiskEvaluator, EdgeSnapshot};
use crate::risk::explainer::RiskExplainer;
use crate::storage::TransactionLog;

/// Main risk calculation engine.
pub struct RiskEngine {
    graph: RwLock<GraphStore>,
    evaluator: BaseRiskEvaluator,
    propagator: RiskPropagator,
    decay: TimeDecay,
    detector: ClusterDetector,
    explainer: RiskExplainer,
    cache: Option<Arc<dyn RiskCache>>,
    log: Arc<dyn TransactionLog>,
    admission: Semaphore,
    config: EngineConfig,
}

/// Everything the graph transaction produces, handed across the lock
/// boundary so all collaborator I/O happens outside the critical section.
struct PipelineResult {
    snapshot: EdgeSnapshot,
    base: BaseRisk,
    outcome: PropagationOutcome,
    clusters: Option<ClusterReport>,
    propagation_latency_ms: f64,
}

impl RiskEngine {
    pub fn new(
        config: EngineConfig,
        cache: Option<Arc<dyn RiskCache>>,
        log: Arc<dyn TransactionLog>,
    ) -> Self {
        Self {
            evaluator: BaseRiskEvaluator::from_config(&config),
            propagator: RiskPropagator::from_config(&config),
            decay: TimeDecay::from_config(&config),
            detector: ClusterDetector::from_config(&config),
            explainer: RiskExplainer::new(),
            graph: RwLock::new(GraphStore::new()),
            admission: Semaphore::new(config.max_concurrent_events),
            cache,
            log,
            config,
        }
    }

    /// The shared entity graph. Exposed for stats and for seeding scenario
    /// state; mutation outside the engine must hold the write lock.
    pub fn graph(&self) -> &RwLock<GraphStore> {
        &self.graph
    }

    /// Current graph size as `(nodes, edges)`.
    pub async fn stats(&self) -> (usize, usize) {
        let graph = self.graph.read().await;
        (graph.node_count(), graph.edge_count())
    }

    /// Process one transaction event end to end.
    pub async fn process_event(&self, event: EventRequest) -> Result<RiskResponse> {
        event.check()?;

        let _permit = self
            .admission
            .try_acquire()
            .map_err(|_| RiskMeshError::overload("event admission queue is full"))?;

        let started = Instant::now();
        let now = Utc::now();
        let user_key = EntityKey::user(&event.user_id);

        let cached_risk = self.probe_cache(&event.user_id).await;

        let (result, final_risk, boost, cached) = match cached_risk {
            Some(risk) if risk > self.config.cache_fast_path_threshold => {
                let result = self.fast_path(&event, risk).await;
                (result, risk, 0.0, true)
            }
            _ => {
                // Aborting here leaves no mutation behind; past this point
                // the event always completes.
                if started.elapsed() > Duration::from_millis(self.config.request_deadline_ms) {
                    return Err(RiskMeshError::timeout(
                        "process_event",
                        self.config.request_deadline_ms,
                    ));
                }

                let result = self.graph_transaction(&event, &user_key).await;
                let boost = self.cluster_boost(&user_key, result.clusters.as_ref());
                let final_risk = saturate(result.base.score + boost);
                (result, final_risk, boost, false)
            }
        };

        if !(0.0..=1.0).contains(&final_risk) {
            return Err(RiskMeshError::consistency(
                format!("final risk {final_risk} escaped saturation"),
                Some("risk_bounds"),
            ));
        }

        let age_days = result
            .snapshot
            .user_last_seen
            .map(|seen| TimeDecay::age_days(seen, now))
            .unwrap_or(0.0);

        let explanation = self.explainer.explain(
            &event,
            &user_key,
            &result.base,
            &result.outcome,
            result.clusters.as_ref(),
            boost,
            age_days,
            final_risk,
        );

        let record = TransactionRecord {
            transaction_id: Uuid::new_v4(),
            user_id: event.user_id.clone(),
            device_id: event.device_id.clone(),
            ip_address: event.ip_address.clone(),
            merchant_id: event.merchant_id.clone(),
            transaction_amount: event.transaction_amount,
            risk_score: final_risk,
            propagation_depth: result.outcome.deepest_write as i32,
            timestamp: now,
        };

        self.persist(&record).await;

        if final_risk > self.config.cache_write_threshold {
            self.write_cache(&event.user_id, final_risk).await;
        }

        let total_latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        info!(
            transaction_id = %record.transaction_id,
            user = %event.user_id,
            risk = final_risk,
            depth = record.propagation_depth,
            cached,
            latency_ms = total_latency_ms,
            "event processed"
        );

        Ok(RiskResponse {
            transaction_id: record.transaction_id,
            risk_score: final_risk,
            base_risk: result.base.score,
            clustering_boost: boost,
            propagation_depth: record.propagation_depth,
            propagation_latency_ms: result.propagation_latency_ms,
            total_latency_ms,
            timestamp: now,
            cached,
            explanation: Some(explanation),
            clustering_info: result.clusters,
        })
    }

    /// Steps 2-6 of the pipeline as one graph transaction: the snapshot the
    /// rules see and the state the upserts apply to are the same graph.
    async fn graph_transaction(&self, event: &EventRequest, user_key: &EntityKey) -> PipelineResult {
        let now = Utc::now();
        let device_key = EntityKey::device(&event.device_id);
        let ip_key = EntityKey::ip(&event.ip_address);
        let merchant_key = EntityKey::merchant(&event.merchant_id);
        let weights = &self.config.edge_weights;

        let mut graph = self.graph.write().await;

        let snapshot = EdgeSnapshot::capture(&graph, event);

        graph.upsert_node(user_key, None, now);
        graph.upsert_node(&device_key, None, now);
        graph.upsert_node(&ip_key, None, now);
        graph.upsert_node(&merchant_key, None, now);

        graph.upsert_edge(user_key, &device_key, weights.user_device, now);
        graph.upsert_edge(user_key, &ip_key, weights.user_ip, now);
        graph.upsert_edge(&device_key, &ip_key, weights.device_ip, now);
        graph.upsert_edge(&device_key, &merchant_key, weights.device_merchant, now);

        let base = self.evaluator.evaluate(event, &snapshot);

        if self.config.decay_enabled {
            self.decay.sweep(&mut graph, now);
        }

        graph.set_risk(user_key, base.score);

        let propagation_started = Instant::now();
        let outcome = self.propagator.propagate(&graph, user_key, base.score);
        let propagation_latency_ms = propagation_started.elapsed().as_secs_f64() * 1000.0;

        for (key, risk) in &outcome.risks {
            graph.set_risk(key, *risk);
        }

        let clusters = if self.config.clustering_enabled {
            Some(self.detector.detect_all(&graph))
        } else {
            None
        };

        PipelineResult {
            snapshot,
            base,
            outcome,
            clusters,
            propagation_latency_ms,
        }
    }

    /// Fast path for a hot cached user: keep the relationship evidence by
    /// upserting nodes and edges, but skip scoring entirely.
    async fn fast_path(&self, event: &EventRequest, cached_risk: f64) -> PipelineResult {
        let now = Utc::now();
        let user_key = EntityKey::user(&event.user_id);
        let device_key = EntityKey::device(&event.device_id);
        let ip_key = EntityKey::ip(&event.ip_address);
        let merchant_key = EntityKey::merchant(&event.merchant_id);
        let weights = &self.config.edge_weights;

        let mut graph = self.graph.write().await;

        let snapshot = EdgeSnapshot::capture(&graph, event);

        graph.upsert_node(&user_key, None, now);
        graph.upsert_node(&device_key, None, now);
        graph.upsert_node(&ip_key, None, now);
        graph.upsert_node(&merchant_key, None, now);

        graph.upsert_edge(&user_key, &device_key, weights.user_device, now);
        graph.upsert_edge(&user_key, &ip_key, weights.user_ip, now);
        graph.upsert_edge(&device_key, &ip_key, weights.device_ip, now);
        graph.upsert_edge(&device_key, &merchant_key, weights.device_merchant, now);

        info!(user = %event.user_id, risk = cached_risk, "fast path: using cached risk");

        PipelineResult {
            snapshot,
            base: BaseRisk {
                score: cached_risk,
                attribution: Vec::new(),
            },
            outcome: PropagationOutcome {
                risks: std::collections::HashMap::from([(user_key, cached_risk)]),
                deepest_write: 0,
            },
            clusters: None,
            propagation_latency_ms: 0.0,
        }
    }

    /// Largest applicable boost for the focal user; boosts never stack.
    fn cluster_boost(&self, user_key: &EntityKey, clusters: Option<&ClusterReport>) -> f64 {
        let Some(report) = clusters else {
            return 0.0;
        };

        let mut boost: f64 = 0.0;
        if report.ring_containing(user_key).is_some() {
            boost = boost.max(self.config.ring_boost);
        }
        if report.star_centered_on(user_key).is_some() {
            boost = boost.max(self.config.star_boost);
        }
        if report.dense_containing(user_key).is_some() {
            boost = boost.max(self.config.dense_boost);
        }
        boost
    }

    /// Best-effort cache probe with its own timeout.
    async fn probe_cache(&self, user_id: &str) -> Option<f64> {
        let cache = self.cache.as_ref()?;
        let budget = Duration::from_millis(self.config.cache_timeout_ms);
        match timeout(budget, cache.get_user_risk(user_id)).await {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                warn!(user = user_id, error = %e, "cache lookup failed");
                None
            }
            Err(_) => {
                warn!(user = user_id, timeout_ms = self.config.cache_timeout_ms, "cache lookup timed out");
                None
            }
        }
    }

    /// Best-effort cache write with its own timeout.
    async fn write_cache(&self, user_id: &str, risk: f64) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        let ttl = Duration::from_secs(self.config.cache_ttl_minutes * 60);
        let budget = Duration::from_millis(self.config.cache_timeout_ms);
        match timeout(budget, cache.set_user_risk(user_id, risk, ttl)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(user = user_id, error = %e, "cache write failed"),
            Err(_) => warn!(user = user_id, "cache write timed out"),
        }
    }

    /// Best-effort append to the transaction log with its own timeout.
    async fn persist(&self, record: &TransactionRecord) {
        let budget = Duration::from_millis(self.config.persist_timeout_ms);
        match timeout(budget, self.log.append(record)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(transaction_id = %record.transaction_id, error = %e, "failed to persist transaction");
            }
            Err(_) => {
                warn!(transaction_id = %record.transaction_id, "transaction persistence timed out");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryRiskCache;
    use crate::storage::MemoryTransactionLog;
    use async_trait::async_trait;

    struct FailingLog;

    #[async_trait]
    impl TransactionLog for FailingLog {
        async fn append(&self, _record: &TransactionRecord) -> Result<()> {
            Err(RiskMeshError::database("append", "connection refused"))
        }

        async fn since(&self, _cutoff: chrono::DateTime<Utc>) -> Result<Vec<TransactionRecord>> {
            Err(RiskMeshError::database("since", "connection refused"))
        }

        async fn for_user(
            &self,
            _user_id: &str,
            _cutoff: chrono::DateTime<Utc>,
        ) -> Result<Vec<TransactionRecord>> {
            Err(RiskMeshError::database("for_user", "connection refused"))
        }

        async fn top_risky(&self, _limit: i64) -> Result<Vec<crate::models::TopRiskyUser>> {
            Err(RiskMeshError::database("top_risky", "connection refused"))
        }
    }

    fn event(user: &str, device: &str, ip: &str, merchant: &str, amount: f64) -> EventRequest {
        EventRequest {
            user_id: user.to_string(),
            device_id: device.to_string(),
            ip_address: ip.to_string(),
            merchant_id: merchant.to_string(),
            transaction_amount: amount,
        }
    }

    fn engine_with(
        config: EngineConfig,
        cache: Option<Arc<dyn RiskCache>>,
    ) -> RiskEngine {
        RiskEngine::new(config, cache, Arc::new(MemoryTransactionLog::new()))
    }

    #[tokio::test]
    async fn test_event_mutates_graph_and_returns_score() {
        let engine = engine_with(EngineConfig::default(), None);
        let response = engine
            .process_event(event("1", "1", "10.0.0.1", "1", 50.0))
            .await
            .unwrap();

        assert!(!response.cached);
        assert!(response.risk_score >= 0.0 && response.risk_score <= 1.0);

        let (nodes, edges) = engine.stats().await;
        assert_eq!(nodes, 4);
        assert_eq!(edges, 4);
    }

    #[tokio::test]
    async fn test_fast_path_uses_cached_risk_but_keeps_evidence() {
        let cache: Arc<dyn RiskCache> = Arc::new(MemoryRiskCache::default());
        cache
            .set_user_risk("hot", 0.9, Duration::from_secs(60))
            .await
            .unwrap();

        let engine = engine_with(EngineConfig::default(), Some(cache));
        let response = engine
            .process_event(event("hot", "d9", "10.0.0.9", "m1", 2000.0))
            .await
            .unwrap();

        assert!(response.cached);
        assert_eq!(response.base_risk, 0.9);
        assert_eq!(response.risk_score, 0.9);
        assert_eq!(response.propagation_depth, 0);
        assert_eq!(response.clustering_boost, 0.0);

        // The event's relationship evidence still landed in the graph.
        let (nodes, edges) = engine.stats().await;
        assert_eq!(nodes, 4);
        assert_eq!(edges, 4);
    }

    #[tokio::test]
    async fn test_cached_risk_below_threshold_takes_normal_path() {
        let cache: Arc<dyn RiskCache> = Arc::new(MemoryRiskCache::default());
        cache
            .set_user_risk("warm", 0.5, Duration::from_secs(60))
            .await
            .unwrap();

        let engine = engine_with(EngineConfig::default(), Some(cache));
        let response = engine
            .process_event(event("warm", "d1", "10.0.0.1", "m1", 50.0))
            .await
            .unwrap();
        assert!(!response.cached);
    }

    #[tokio::test]
    async fn test_persistence_failure_does_not_fail_request() {
        let engine = RiskEngine::new(EngineConfig::default(), None, Arc::new(FailingLog));
        let response = engine
            .process_event(event("1", "1", "10.0.0.1", "1", 50.0))
            .await;
        assert!(response.is_ok());
    }

    #[tokio::test]
    async fn test_overload_sheds_when_admission_exhausted() {
        let config = EngineConfig {
            max_concurrent_events: 0,
            ..EngineConfig::default()
        };
        let engine = engine_with(config, None);
        let err = engine
            .process_event(event("1", "1", "10.0.0.1", "1", 50.0))
            .await
            .unwrap_err();
        assert!(matches!(err, RiskMeshError::Overload { .. }));
    }

    #[tokio::test]
    async fn test_invalid_event_rejected() {
        let engine = engine_with(EngineConfig::default(), None);
        let err = engine
            .process_event(event("1", "1", "10.0.0.1", "1", f64::NAN))
            .await
            .unwrap_err();
        assert!(matches!(err, RiskMeshError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_high_risk_written_to_cache() {
        let cache = Arc::new(MemoryRiskCache::default());
        let engine = engine_with(
            EngineConfig::default(),
            Some(cache.clone() as Arc<dyn RiskCache>),
        );

        // Cold user, high amount: 0.3 + 0.2 + 0.2 + 0.1 = 0.8 > 0.3.
        engine
            .process_event(event("1", "9", "10.0.0.9", "1", 2000.0))
            .await
            .unwrap();

        let cached = cache.get_user_risk("1").await.unwrap();
        assert!(cached.is_some());
        assert!(cached.unwrap() > 0.3);
    }

    #[tokio::test]
    async fn test_low_risk_not_written_to_cache() {
        let cache = Arc::new(MemoryRiskCache::default());
        let engine = engine_with(
            EngineConfig::default(),
            Some(cache.clone() as Arc<dyn RiskCache>),
        );

        // Seed the familiar edges so only the merchant rule fires (0.1).
        {
            let mut graph = engine.graph().write().await;
            let now = Utc::now();
            graph.upsert_edge(&EntityKey::user("1"), &EntityKey::device("1"), 0.8, now);
            graph.upsert_edge(&EntityKey::user("1"), &EntityKey::ip("10.0.0.1"), 0.7, now);
        }

        let response = engine
            .process_event(event("1", "1", "10.0.0.1", "1", 50.0))
            .await
            .unwrap();
        assert!(response.risk_score <= 0.3);
        assert_eq!(cache.get_user_risk("1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_propagation_depth_reports_deepest_write() {
        let engine = engine_with(EngineConfig::default(), None);

        // device -> merchant exists after the first event, so a risky second
        // event reaches depth 2 (user -> device -> merchant).
        engine
            .process_event(event("1", "1", "10.0.0.1", "1", 50.0))
            .await
            .unwrap();
        let response = engine
            .process_event(event("1", "2", "10.0.0.2", "1", 2000.0))
            .await
            .unwrap();

        assert!(response.propagation_depth >= 1);
        assert!(response.propagation_depth <= 2);
    }
}
