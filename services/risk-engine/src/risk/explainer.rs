//! Risk explanations
//!
//! Deterministic assembly of the evidence behind a score: which rules fired,
//! where risk propagated, what clustering found, and the arithmetic
//! breakdown, ending in a category and a recommendation.

use serde::{Deserialize, Serialize};

use riskmesh_common::{EntityKey, Recommendation, RiskCategory};

use crate::graph::clustering::ClusterReport;
use crate::graph::propagation::PropagationOutcome;
use crate::models::EventRequest;
use crate::risk::base::BaseRisk;

/// Impacted nodes listed per explanation.
const TOP_K: usize = 5;
/// Risk above which an impacted node is flagged.
const HIGH_RISK: f64 = 0.6;

/// One fired rule, rendered for the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleExplanation {
    pub rule: String,
    pub contribution: f64,
    pub description: String,
}

/// One node the propagation touched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropagationImpact {
    pub node: String,
    pub risk: f64,
    pub high_risk: bool,
}

/// Where the risk went.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropagationExplanation {
    pub source: String,
    /// Most-impacted nodes, highest new risk first, source excluded.
    pub propagated_to: Vec<PropagationImpact>,
    pub total_nodes_affected: usize,
}

/// What clustering found, if anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringExplanation {
    pub pattern_found: bool,
    pub dominant_pattern: Option<String>,
    pub summary: Option<String>,
}

/// The arithmetic path from base risk to the final score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskBreakdown {
    pub base: f64,
    pub post_propagation: f64,
    pub post_decay: f64,
    pub age_days: f64,
    pub cluster_boost: f64,
}

/// Full explanation attached to a risk response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    pub rules_triggered: Vec<RuleExplanation>,
    pub propagation: PropagationExplanation,
    pub clustering: ClusteringExplanation,
    pub breakdown: RiskBreakdown,
    pub category: RiskCategory,
    pub recommendation: Recommendation,
}

/// Deterministic explanation assembler.
#[derive(Debug, Clone, Default)]
pub struct RiskExplainer;

impl RiskExplainer {
    pub fn new() -> Self {
        Self
    }

    #[allow(clippy::too_many_arguments)]
    pub fn explain(
        &self,
        event: &EventRequest,
        source: &EntityKey,
        base: &BaseRisk,
        propagation: &PropagationOutcome,
        clusters: Option<&ClusterReport>,
        cluster_boost: f64,
        age_days: f64,
        final_risk: f64,
    ) -> Explanation {
        let rules_triggered = base
            .attribution
            .iter()
            .map(|c| RuleExplanation {
                rule: c.rule.name().to_string(),
                contribution: c.contribution,
                description: c.rule.describe(event),
            })
            .collect();

        let propagation = self.explain_propagation(source, propagation);
        let clustering = self.explain_clustering(clusters);

        let post_propagation = propagation_peak(base.score, &propagation);
        let breakdown = RiskBreakdown {
            base: base.score,
            post_propagation,
            // The boost is the last term applied, so stripping it recovers
            // the decayed value.
            post_decay: (final_risk - cluster_boost).max(0.0),
            age_days,
            cluster_boost,
        };

        let category = RiskCategory::from_score(final_risk);
        Explanation {
            rules_triggered,
            propagation,
            clustering,
            breakdown,
            category,
            recommendation: category.into(),
        }
    }

    fn explain_propagation(
        &self,
        source: &EntityKey,
        outcome: &PropagationOutcome,
    ) -> PropagationExplanation {
        let source_wire = source.to_string();

        let mut impacted: Vec<PropagationImpact> = outcome
            .risks
            .iter()
            .filter(|(key, _)| key.to_string() != source_wire)
            .map(|(key, &risk)| PropagationImpact {
                node: key.to_string(),
                risk,
                high_risk: risk > HIGH_RISK,
            })
            .collect();
        impacted.sort_by(|a, b| b.risk.total_cmp(&a.risk).then(a.node.cmp(&b.node)));
        impacted.truncate(TOP_K);

        PropagationExplanation {
            source: source_wire,
            propagated_to: impacted,
            total_nodes_affected: outcome.risks.len(),
        }
    }

    fn explain_clustering(&self, clusters: Option<&ClusterReport>) -> ClusteringExplanation {
        let Some(report) = clusters else {
            return ClusteringExplanation {
                pattern_found: false,
                dominant_pattern: None,
                summary: None,
            };
        };

        // Precedence: rings beat stars beat dense clusters.
        if let Some(ring) = report.rings.iter().max_by_key(|r| r.size) {
            return ClusteringExplanation {
                pattern_found: true,
                dominant_pattern: Some("ring".to_string()),
                summary: Some(format!(
                    "fraud ring of {} entities (avg risk {:.3})",
                    ring.size, ring.avg_risk
                )),
            };
        }
        if let Some(star) = report.stars.first() {
            return ClusteringExplanation {
                pattern_found: true,
                dominant_pattern: Some("star".to_string()),
                summary: Some(format!(
                    "star pattern centered on {} with {} branches",
                    star.center, star.branches
                )),
            };
        }
        if let Some(dense) = report.dense_clusters.first() {
            return ClusteringExplanation {
                pattern_found: true,
                dominant_pattern: Some("dense_cluster".to_string()),
                summary: Some(format!(
                    "dense cluster of {} entities (density {:.3})",
                    dense.size, dense.density
                )),
            };
        }

        ClusteringExplanation {
            pattern_found: false,
            dominant_pattern: None,
            summary: None,
        }
    }
}

/// Highest risk the propagation produced anywhere, the source included.
fn propagation_peak(base: f64, propagation: &PropagationExplanation) -> f64 {
    propagation
        .propagated_to
        .iter()
        .map(|i| i.risk)
        .fold(base, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::base::{RuleContribution, RuleKind};
    use std::collections::HashMap;

    fn event() -> EventRequest {
        EventRequest {
            user_id: "1".to_string(),
            device_id: "1".to_string(),
            ip_address: "10.0.0.1".to_string(),
            merchant_id: "1".to_string(),
            transaction_amount: 2000.0,
        }
    }

    fn outcome(entries: &[(&EntityKey, f64)]) -> PropagationOutcome {
        PropagationOutcome {
            risks: entries
                .iter()
                .map(|(k, r)| ((*k).clone(), *r))
                .collect::<HashMap<_, _>>(),
            deepest_write: 1,
        }
    }

    #[test]
    fn test_rules_rendered_with_descriptions() {
        let source = EntityKey::user("1");
        let base = BaseRisk {
            score: 0.3,
            attribution: vec![RuleContribution {
                rule: RuleKind::HighAmount,
                contribution: 0.3,
            }],
        };
        let prop = outcome(&[(&source, 0.3)]);

        let explanation =
            RiskExplainer::new().explain(&event(), &source, &base, &prop, None, 0.0, 0.0, 0.3);

        assert_eq!(explanation.rules_triggered.len(), 1);
        assert_eq!(explanation.rules_triggered[0].rule, "high_amount");
        assert!(explanation.rules_triggered[0].description.contains("2000.00"));
    }

    #[test]
    fn test_propagation_top_k_sorted_and_flagged() {
        let source = EntityKey::user("1");
        let keys: Vec<EntityKey> = (0..8).map(|i| EntityKey::device(format!("d{i}"))).collect();
        let mut entries: Vec<(&EntityKey, f64)> =
            keys.iter().enumerate().map(|(i, k)| (k, 0.1 * i as f64)).collect();
        entries.push((&source, 0.9));
        let prop = outcome(&entries);

        let explanation = RiskExplainer::new().explain(
            &event(),
            &source,
            &BaseRisk::default(),
            &prop,
            None,
            0.0,
            0.0,
            0.9,
        );

        let listed = &explanation.propagation.propagated_to;
        assert_eq!(listed.len(), 5, "top-5 only, source excluded");
        assert!(listed.windows(2).all(|w| w[0].risk >= w[1].risk));
        assert!(listed[0].high_risk);
        assert_eq!(explanation.propagation.total_nodes_affected, 9);
    }

    #[test]
    fn test_category_and_recommendation() {
        let source = EntityKey::user("1");
        let prop = outcome(&[(&source, 0.8)]);
        let explanation = RiskExplainer::new().explain(
            &event(),
            &source,
            &BaseRisk { score: 0.8, attribution: vec![] },
            &prop,
            None,
            0.0,
            0.0,
            0.8,
        );
        assert_eq!(explanation.category, RiskCategory::High);
        assert_eq!(explanation.recommendation, Recommendation::Challenge);
    }

    #[test]
    fn test_breakdown_strips_boost() {
        let source = EntityKey::user("1");
        let prop = outcome(&[(&source, 0.5)]);
        let explanation = RiskExplainer::new().explain(
            &event(),
            &source,
            &BaseRisk { score: 0.5, attribution: vec![] },
            &prop,
            None,
            0.15,
            2.0,
            0.65,
        );
        assert!((explanation.breakdown.post_decay - 0.5).abs() < 1e-9);
        assert_eq!(explanation.breakdown.cluster_boost, 0.15);
        assert_eq!(explanation.breakdown.age_days, 2.0);
    }

    #[test]
    fn test_clustering_precedence_ring_over_star() {
        use crate::graph::clustering::{Ring, Star};

        let report = ClusterReport {
            rings: vec![Ring {
                nodes: vec!["user_a".into()],
                size: 3,
                avg_risk: 0.7,
                max_risk: 0.8,
                risk_sum: 2.1,
            }],
            dense_clusters: vec![],
            stars: vec![Star {
                center: "user_hub".into(),
                center_risk: 0.8,
                branches: 6,
                avg_neighbor_risk: 0.4,
            }],
        };

        let source = EntityKey::user("a");
        let prop = outcome(&[(&source, 0.7)]);
        let explanation = RiskExplainer::new().explain(
            &event(),
            &source,
            &BaseRisk::default(),
            &prop,
            Some(&report),
            0.15,
            0.0,
            0.85,
        );

        assert!(explanation.clustering.pattern_found);
        assert_eq!(explanation.clustering.dominant_pattern.as_deref(), Some("ring"));
    }
}
