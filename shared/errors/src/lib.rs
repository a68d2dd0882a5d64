//! RiskMesh Error Handling Library
//!
//! One error taxonomy for every RiskMesh crate, plus the HTTP mapping that
//! turns each kind into a status code and structured body. Collaborator
//! failures are modeled explicitly so the engine can degrade features instead
//! of failing requests.

pub mod http;
pub mod types;

pub use http::{HttpError, HttpErrorResponse};
pub use types::{Result, RiskMeshError};
