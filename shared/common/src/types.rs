//! Common risk types used across RiskMesh crates

use serde::{Deserialize, Serialize};

/// Clamp a risk value into the canonical `[0, 1]` range.
///
/// Non-finite inputs collapse to 0 so a bad upstream value can never poison
/// the graph.
pub fn saturate(risk: f64) -> f64 {
    if risk.is_finite() {
        risk.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Risk level bucket used across scoring and analytics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskCategory {
    Low,
    Medium,
    High,
}

impl RiskCategory {
    /// Bucket a saturated risk score: `< 0.3` low, `< 0.6` medium, else high.
    pub fn from_score(score: f64) -> Self {
        if score < 0.3 {
            RiskCategory::Low
        } else if score < 0.6 {
            RiskCategory::Medium
        } else {
            RiskCategory::High
        }
    }
}

/// Action recommended to the caller for a scored transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Approve,
    Review,
    Challenge,
}

impl From<RiskCategory> for Recommendation {
    fn from(category: RiskCategory) -> Self {
        match category {
            RiskCategory::Low => Recommendation::Approve,
            RiskCategory::Medium => Recommendation::Review,
            RiskCategory::High => Recommendation::Challenge,
        }
    }
}

impl Recommendation {
    pub fn from_score(score: f64) -> Self {
        RiskCategory::from_score(score).into()
    }
}
