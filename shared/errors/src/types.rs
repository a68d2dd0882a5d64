//! Core error types for RiskMesh

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for RiskMesh services.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum RiskMeshError {
    /// Invalid request input (missing field, non-finite amount, bad range)
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        code: String,
    },

    /// Missing or invalid API key
    #[error("Authentication failed: {message}")]
    Authentication { message: String, code: String },

    /// Per-key token bucket exhausted
    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        limit: u32,
        retry_after: Option<u32>,
        code: String,
    },

    /// Resource not found
    #[error("Resource not found: {resource_type} with ID {resource_id}")]
    NotFound {
        resource_type: String,
        resource_id: String,
        code: String,
    },

    /// Transient collaborator failure (cache, persistence, decay sweep)
    #[error("Collaborator '{service}' failed: {message}")]
    Collaborator {
        service: String,
        message: String,
        code: String,
    },

    /// A bounded operation exceeded its deadline
    #[error("Operation timed out: {operation}")]
    Timeout {
        operation: String,
        timeout_ms: u64,
        code: String,
    },

    /// Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        operation: String,
        code: String,
    },

    /// Internal invariant violation (risk out of range, dangling endpoint)
    #[error("Consistency violation: {message}")]
    Consistency {
        message: String,
        invariant: Option<String>,
        code: String,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        key: Option<String>,
        code: String,
    },

    /// Engine admission queue is full
    #[error("Service overloaded: {message}")]
    Overload {
        message: String,
        retry_after: Option<u32>,
        code: String,
    },

    /// Internal server errors
    #[error("Internal server error: {message}")]
    Internal { message: String, code: String },
}

impl RiskMeshError {
    /// Get the machine-readable error code.
    pub fn code(&self) -> &str {
        match self {
            Self::Validation { code, .. } => code,
            Self::Authentication { code, .. } => code,
            Self::RateLimit { code, .. } => code,
            Self::NotFound { code, .. } => code,
            Self::Collaborator { code, .. } => code,
            Self::Timeout { code, .. } => code,
            Self::Database { code, .. } => code,
            Self::Consistency { code, .. } => code,
            Self::Configuration { code, .. } => code,
            Self::Overload { code, .. } => code,
            Self::Internal { code, .. } => code,
        }
    }

    /// Check if the error is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::Authentication { .. }
                | Self::RateLimit { .. }
                | Self::NotFound { .. }
        )
    }

    /// Transient errors degrade a feature but never fail the request.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Collaborator { .. } | Self::Timeout { .. })
    }

    pub fn validation(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::Validation {
            message: message.into(),
            field: field.map(|f| f.to_string()),
            code: "VALIDATION_ERROR".to_string(),
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
            code: "AUTHENTICATION_FAILED".to_string(),
        }
    }

    pub fn rate_limit(limit: u32, retry_after: Option<u32>) -> Self {
        Self::RateLimit {
            message: format!("request quota of {limit} per minute exhausted"),
            limit,
            retry_after,
            code: "RATE_LIMIT_EXCEEDED".to_string(),
        }
    }

    pub fn not_found(resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            code: "RESOURCE_NOT_FOUND".to_string(),
        }
    }

    pub fn collaborator(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Collaborator {
            service: service.into(),
            message: message.into(),
            code: "COLLABORATOR_FAILED".to_string(),
        }
    }

    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
            code: "TIMEOUT".to_string(),
        }
    }

    pub fn database(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            operation: operation.into(),
            code: "DATABASE_ERROR".to_string(),
        }
    }

    pub fn consistency(message: impl Into<String>, invariant: Option<&str>) -> Self {
        Self::Consistency {
            message: message.into(),
            invariant: invariant.map(|i| i.to_string()),
            code: "CONSISTENCY_VIOLATION".to_string(),
        }
    }

    pub fn configuration(message: impl Into<String>, key: Option<&str>) -> Self {
        Self::Configuration {
            message: message.into(),
            key: key.map(|k| k.to_string()),
            code: "CONFIGURATION_ERROR".to_string(),
        }
    }

    pub fn overload(message: impl Into<String>) -> Self {
        Self::Overload {
            message: message.into(),
            retry_after: Some(1),
            code: "OVERLOADED".to_string(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            code: "INTERNAL_ERROR".to_string(),
        }
    }
}

/// Result type alias for RiskMesh operations.
pub type Result<T> = std::result::Result<T, RiskMeshError>;
