//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how it is
//! rendered as an HTTP response.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use schoolhub_core::ports::PortError;
use serde::Serialize;
use utoipa::ToSchema;

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// Body of every error response: `{"error": {"code", "message"}}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Port(e) => match e {
                PortError::NotFound(_) => StatusCode::NOT_FOUND,
                PortError::Conflict(_) => StatusCode::CONFLICT,
                PortError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                PortError::Unauthorized => StatusCode::UNAUTHORIZED,
                PortError::Forbidden(_) => StatusCode::FORBIDDEN,
                PortError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ApiError::Port(e) => match e {
                PortError::NotFound(_) => "NOT_FOUND",
                PortError::Conflict(_) => "CONFLICT",
                PortError::InvalidInput(_) => "INVALID_INPUT",
                PortError::Unauthorized => "UNAUTHORIZED",
                PortError::Forbidden(_) => "FORBIDDEN",
                PortError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
                PortError::Unexpected(_) => "INTERNAL_ERROR",
            },
            ApiError::Database(_) => "DATABASE_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        // Client errors carry their message; server errors are logged and masked.
        let message = match &self {
            ApiError::Port(PortError::NotFound(m))
            | ApiError::Port(PortError::Conflict(m))
            | ApiError::Port(PortError::InvalidInput(m))
            | ApiError::Port(PortError::Forbidden(m)) => m.clone(),
            ApiError::Port(PortError::Unauthorized) => "Authentication required".to_string(),
            ApiError::Port(PortError::StoreUnavailable(m)) => {
                tracing::warn!("Store unavailable: {}", m);
                "The data store is temporarily unavailable".to_string()
            }
            other => {
                tracing::error!("Request failed: {:?}", other);
                "An internal error occurred".to_string()
            }
        };

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_errors_map_to_status_codes() {
        let cases = [
            (PortError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (PortError::Conflict("x".into()), StatusCode::CONFLICT),
            (PortError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (PortError::Unauthorized, StatusCode::UNAUTHORIZED),
            (PortError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (PortError::StoreUnavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (PortError::Unexpected("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError::from(error).into_response().status(), status);
        }
        assert_eq!(
            ApiError::Internal("boom".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
