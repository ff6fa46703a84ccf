use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

pub const INITIALIZATION_MESSAGE: &str =
    "Failed to initialize database. Please refresh the page and try again.";

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Store initialization failed: {cause}")]
    Initialization { cause: String },

    #[error("Query failed for {operation}: {cause}")]
    QueryFailed { operation: String, cause: String },

    #[error("Validation failed: {} field(s) invalid", .errors.len())]
    Validation { errors: BTreeMap<String, String> },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn query(operation: &str, cause: impl Into<String>) -> Self {
        GatewayError::QueryFailed {
            operation: operation.to_string(),
            cause: cause.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, String>>,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, error_response) = match self {
            GatewayError::Initialization { cause } => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse {
                    error: "initialization_failed".to_string(),
                    message: INITIALIZATION_MESSAGE.to_string(),
                    cause: Some(cause),
                    fields: None,
                },
            ),
            GatewayError::QueryFailed { operation, cause } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error: "query_failed".to_string(),
                    message: format!("Failed to {}", operation),
                    cause: Some(cause),
                    fields: None,
                },
            ),
            GatewayError::Validation { errors } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: "validation_failed".to_string(),
                    message: "Please correct the highlighted fields".to_string(),
                    cause: None,
                    fields: Some(errors),
                },
            ),
            GatewayError::InvalidRequest { message } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: "invalid_request".to_string(),
                    message,
                    cause: None,
                    fields: None,
                },
            ),
            GatewayError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error: "internal_error".to_string(),
                    message: msg,
                    cause: None,
                    fields: None,
                },
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

/// Store failures outside of a named operation happen while bringing the
/// store up.
impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        GatewayError::Initialization {
            cause: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Internal(format!("Serialization error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (
                GatewayError::Initialization {
                    cause: "disk full".to_string(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                GatewayError::query("list patients", "no such table"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                GatewayError::Validation {
                    errors: BTreeMap::new(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                GatewayError::InvalidRequest {
                    message: "bad".to_string(),
                },
                StatusCode::BAD_REQUEST,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_store_error_maps_to_initialization() {
        let err: GatewayError = StoreError::Open {
            cause: "locked".to_string(),
        }
        .into();
        assert!(matches!(err, GatewayError::Initialization { .. }));
        assert!(err.to_string().contains("locked"));
    }
}
