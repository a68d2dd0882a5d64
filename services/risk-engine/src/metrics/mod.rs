//! Prometheus metrics
//!
//! Request and error counters, latency histograms, and graph-size gauges,
//! rendered in text exposition format at `/metrics`.

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};

use riskmesh_errors::{Result, RiskMeshError};

/// Millisecond buckets sized for a sub-100ms latency budget.
const LATENCY_BUCKETS_MS: &[f64] = &[1.0, 2.5, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0];

/// Service metrics registry.
pub struct Metrics {
    registry: Registry,
    pub requests_total: IntCounter,
    pub errors_total: IntCounter,
    pub request_latency_ms: Histogram,
    pub propagation_latency_ms: Histogram,
    pub graph_nodes: IntGauge,
    pub graph_edges: IntGauge,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let requests_total =
            IntCounter::new("riskmesh_requests_total", "Total requests processed")
                .map_err(|e| RiskMeshError::internal(e.to_string()))?;
        let errors_total = IntCounter::new("riskmesh_errors_total", "Total errors")
            .map_err(|e| RiskMeshError::internal(e.to_string()))?;
        let request_latency_ms = Histogram::with_opts(
            HistogramOpts::new("riskmesh_request_latency_ms", "Request latency in milliseconds")
                .buckets(LATENCY_BUCKETS_MS.to_vec()),
        )
        .map_err(|e| RiskMeshError::internal(e.to_string()))?;
        let propagation_latency_ms = Histogram::with_opts(
            HistogramOpts::new(
                "riskmesh_propagation_latency_ms",
                "Risk propagation latency in milliseconds",
            )
            .buckets(LATENCY_BUCKETS_MS.to_vec()),
        )
        .map_err(|e| RiskMeshError::internal(e.to_string()))?;
        let graph_nodes = IntGauge::new("riskmesh_graph_nodes", "Total nodes in graph")
            .map_err(|e| RiskMeshError::internal(e.to_string()))?;
        let graph_edges = IntGauge::new("riskmesh_graph_edges", "Total edges in graph")
            .map_err(|e| RiskMeshError::internal(e.to_string()))?;

        for collector in [
            Box::new(requests_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(errors_total.clone()),
            Box::new(request_latency_ms.clone()),
            Box::new(propagation_latency_ms.clone()),
            Box::new(graph_nodes.clone()),
            Box::new(graph_edges.clone()),
        ] {
            registry
                .register(collector)
                .map_err(|e| RiskMeshError::internal(e.to_string()))?;
        }

        Ok(Self {
            registry,
            requests_total,
            errors_total,
            request_latency_ms,
            propagation_latency_ms,
            graph_nodes,
            graph_edges,
        })
    }

    /// Render the registry in Prometheus text exposition format.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| RiskMeshError::internal(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| RiskMeshError::internal(e.to_string()))
    }
}
