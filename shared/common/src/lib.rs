//! RiskMesh Common Library
//!
//! Shared vocabulary for all RiskMesh crates: composite entity keys and node
//! kinds, risk categories and recommendations, saturation helpers, and the
//! constants that fix the wire contract.

pub mod constants;
pub mod keys;
pub mod types;

// Re-export commonly used types
pub use keys::{EntityKey, KeyParseError, NodeKind};
pub use types::{saturate, Recommendation, RiskCategory};

// Re-export external dependencies for consistency
pub use chrono::{DateTime, Utc};
pub use uuid::Uuid;
