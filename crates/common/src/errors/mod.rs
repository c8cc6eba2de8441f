//! Error types for the starter pack services
//!
//! Provides a single error enum with:
//! - Distinct variants for remote (XRPC) failures and local failures
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Authentication errors (2xxx)
    Unauthorized,
    ExpiredToken,

    // Rate limiting (6xxx)
    RateLimited,

    // External service errors (8xxx)
    UpstreamError,
    UpstreamTransport,

    // Internal errors (9xxx)
    ConfigurationError,
    SerializationError,

    // Service not ready
    NotInitialized,
    Initializing,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::Unauthorized => 2001,
            ErrorCode::ExpiredToken => 2003,

            ErrorCode::RateLimited => 6001,

            ErrorCode::UpstreamError => 8001,
            ErrorCode::UpstreamTransport => 8002,

            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,

            ErrorCode::NotInitialized => 9901,
            ErrorCode::Initializing => 9902,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // Remote XRPC service errors
    #[error("XRPC {method} failed with {status}: {error}{}", detail_suffix(.message))]
    Upstream {
        method: String,
        status: u16,
        error: String,
        message: Option<String>,
    },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Readiness
    #[error("Server is not properly initialized")]
    NotInitialized,

    #[error("Starter pack is still initializing")]
    Initializing,
}

fn detail_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(" ({})", m))
        .unwrap_or_default()
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Unauthorized { .. } => ErrorCode::Unauthorized,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::Upstream { error, .. } if error == "ExpiredToken" => ErrorCode::ExpiredToken,
            AppError::Upstream { .. } => ErrorCode::UpstreamError,
            AppError::HttpClient(_) => ErrorCode::UpstreamTransport,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::NotInitialized => ErrorCode::NotInitialized,
            AppError::Initializing => ErrorCode::Initializing,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,

            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            AppError::Configuration { .. } | AppError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }

            AppError::Upstream { .. } | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,

            AppError::NotInitialized | AppError::Initializing => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// True when the remote service rejected the access token as expired
    pub fn is_expired_token(&self) -> bool {
        self.code() == ErrorCode::ExpiredToken
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for the JSON API.
///
/// Keeps the `success`/`error` shape the public starter pack endpoint has
/// always returned, with the machine-readable code alongside.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: ErrorCode,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Not-ready states are expected during startup, keep them quiet
        if matches!(self, AppError::NotInitialized | AppError::Initializing) {
            tracing::debug!(code = ?code, "Starter pack not ready");
        } else if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            success: false,
            error: message,
            code,
        };

        (status, Json(body)).into_response()
    }
}
