//! HTTP error handling and response utilities

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{error, warn};
use uuid::Uuid;

use crate::types::RiskMeshError;

/// HTTP error response structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpErrorResponse {
    pub success: bool,
    pub error: HttpError,
    pub request_id: Uuid,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// HTTP error details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpError {
    pub code: String,
    pub message: String,
    pub details: Option<HashMap<String, serde_json::Value>>,
    pub retry_after: Option<u32>,
}

impl IntoResponse for RiskMeshError {
    fn into_response(self) -> Response {
        let (status_code, http_error) = match &self {
            RiskMeshError::Validation { message, field, code } => {
                let mut details = HashMap::new();
                if let Some(field) = field {
                    details.insert("field".to_string(), serde_json::Value::String(field.clone()));
                }
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    HttpError {
                        code: code.clone(),
                        message: message.clone(),
                        details: if details.is_empty() { None } else { Some(details) },
                        retry_after: None,
                    },
                )
            }
            RiskMeshError::Authentication { message, code } => (
                StatusCode::UNAUTHORIZED,
                HttpError {
                    code: code.clone(),
                    message: message.clone(),
                    details: None,
                    retry_after: None,
                },
            ),
            RiskMeshError::RateLimit { message, limit, retry_after, code } => {
                let mut details = HashMap::new();
                details.insert("limit".to_string(), serde_json::Value::Number((*limit).into()));
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    HttpError {
                        code: code.clone(),
                        message: message.clone(),
                        details: Some(details),
                        retry_after: *retry_after,
                    },
                )
            }
            RiskMeshError::NotFound { resource_type, resource_id, code } => {
                let mut details = HashMap::new();
                details.insert(
                    "resource_type".to_string(),
                    serde_json::Value::String(resource_type.clone()),
                );
                details.insert(
                    "resource_id".to_string(),
                    serde_json::Value::String(resource_id.clone()),
                );
                (
                    StatusCode::NOT_FOUND,
                    HttpError {
                        code: code.clone(),
                        message: format!("{} not found", resource_type),
                        details: Some(details),
                        retry_after: None,
                    },
                )
            }
            RiskMeshError::Collaborator { service, message, code } => {
                let mut details = HashMap::new();
                details.insert("service".to_string(), serde_json::Value::String(service.clone()));
                (
                    StatusCode::BAD_GATEWAY,
                    HttpError {
                        code: code.clone(),
                        message: format!("Collaborator '{}' error: {}", service, message),
                        details: Some(details),
                        retry_after: None,
                    },
                )
            }
            RiskMeshError::Timeout { operation, timeout_ms, code } => {
                let mut details = HashMap::new();
                details.insert(
                    "operation".to_string(),
                    serde_json::Value::String(operation.clone()),
                );
                details.insert(
                    "timeout_ms".to_string(),
                    serde_json::Value::Number((*timeout_ms).into()),
                );
                (
                    StatusCode::REQUEST_TIMEOUT,
                    HttpError {
                        code: code.clone(),
                        message: format!("Operation '{}' timed out", operation),
                        details: Some(details),
                        retry_after: None,
                    },
                )
            }
            RiskMeshError::Overload { message, retry_after, code } => (
                StatusCode::SERVICE_UNAVAILABLE,
                HttpError {
                    code: code.clone(),
                    message: message.clone(),
                    details: None,
                    retry_after: *retry_after,
                },
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                HttpError {
                    code: self.code().to_string(),
                    message: "Internal server error".to_string(),
                    details: None,
                    retry_after: None,
                },
            ),
        };

        let response = HttpErrorResponse {
            success: false,
            error: http_error,
            request_id: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
        };

        if status_code.is_server_error() {
            error!(
                error = %self,
                status_code = %status_code,
                request_id = %response.request_id,
                "HTTP error response"
            );
        } else {
            warn!(
                error = %self,
                status_code = %status_code,
                request_id = %response.request_id,
                "HTTP error response"
            );
        }

        (status_code, Json(response)).into_response()
    }
}
