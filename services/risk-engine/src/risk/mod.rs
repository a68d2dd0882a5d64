//! Risk scoring: base rules, explanation assembly, and the per-event engine

pub mod base;
pub mod engine;
pub mod explainer;

pub use base::{BaseRisk, BaseRiskEvaluator, EdgeSnapshot, RuleKind};
pub use engine::RiskEngine;
pub use explainer::RiskExplainer;
