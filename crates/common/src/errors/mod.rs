//! Error types for ClassForge services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
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

/// Quota window that was exhausted
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuotaWindow {
    Daily,
    Monthly,
}

impl std::fmt::Display for QuotaWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuotaWindow::Daily => write!(f, "daily"),
            QuotaWindow::Monthly => write!(f, "monthly"),
        }
    }
}

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    MissingField,
    InvalidFormat,

    // Authentication errors (2xxx)
    Unauthorized,
    InvalidApiKey,
    ExpiredToken,

    // Authorization errors (3xxx)
    Forbidden,
    SchoolMismatch,
    ToolNotAuthorized,

    // Resource errors (4xxx)
    NotFound,
    ContentNotFound,
    AuditNotFound,
    CourseNotFound,
    ToolNotFound,

    // State errors (5xxx)
    InvalidTransition,
    AuditAlreadyResolved,
    PendingAuditExists,

    // Quota errors (6xxx)
    QuotaExceeded,
    RateLimited,

    // Database errors (7xxx)
    DatabaseError,
    ConnectionError,

    // External service errors (8xxx)
    ProviderError,
    StorageError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Validation (1xxx)
            ErrorCode::ValidationError => 1001,
            ErrorCode::MissingField => 1002,
            ErrorCode::InvalidFormat => 1003,

            // Auth (2xxx)
            ErrorCode::Unauthorized => 2001,
            ErrorCode::InvalidApiKey => 2002,
            ErrorCode::ExpiredToken => 2003,

            // Authz (3xxx)
            ErrorCode::Forbidden => 3001,
            ErrorCode::SchoolMismatch => 3002,
            ErrorCode::ToolNotAuthorized => 3003,

            // Resources (4xxx)
            ErrorCode::NotFound => 4001,
            ErrorCode::ContentNotFound => 4002,
            ErrorCode::AuditNotFound => 4003,
            ErrorCode::CourseNotFound => 4004,
            ErrorCode::ToolNotFound => 4005,

            // State (5xxx)
            ErrorCode::InvalidTransition => 5001,
            ErrorCode::AuditAlreadyResolved => 5002,
            ErrorCode::PendingAuditExists => 5003,

            // Quota (6xxx)
            ErrorCode::QuotaExceeded => 6001,
            ErrorCode::RateLimited => 6002,

            // Database (7xxx)
            ErrorCode::DatabaseError => 7001,
            ErrorCode::ConnectionError => 7002,

            // External (8xxx)
            ErrorCode::ProviderError => 8001,
            ErrorCode::StorageError => 8002,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Required field missing: {field}")]
    MissingField { field: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    // Authentication errors
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Token expired")]
    ExpiredToken,

    // Authorization errors
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("School mismatch")]
    SchoolMismatch,

    #[error("Tool not authorized for this school: {tool_code}")]
    ToolNotAuthorized { tool_code: String },

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    #[error("Content not found: {id}")]
    ContentNotFound { id: String },

    #[error("Audit record not found: {id}")]
    AuditNotFound { id: String },

    #[error("Course not found: {id}")]
    CourseNotFound { id: String },

    #[error("AI tool not found: {code}")]
    ToolNotFound { code: String },

    // State errors
    #[error("Invalid state transition: {message}")]
    InvalidTransition { message: String },

    #[error("Audit record already resolved: {id}")]
    AuditAlreadyResolved { id: String },

    #[error("A pending audit already exists for content {content_id}")]
    PendingAuditExists { content_id: String },

    // Quota errors
    #[error("{window} quota exceeded: limit {limit}")]
    QuotaExceeded { window: QuotaWindow, limit: i32 },

    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    // External service errors
    #[error("AI provider error: {message}")]
    Provider { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::MissingField { .. } => ErrorCode::MissingField,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::Unauthorized { .. } => ErrorCode::Unauthorized,
            AppError::InvalidApiKey => ErrorCode::InvalidApiKey,
            AppError::ExpiredToken => ErrorCode::ExpiredToken,
            AppError::Forbidden { .. } => ErrorCode::Forbidden,
            AppError::SchoolMismatch => ErrorCode::SchoolMismatch,
            AppError::ToolNotAuthorized { .. } => ErrorCode::ToolNotAuthorized,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::ContentNotFound { .. } => ErrorCode::ContentNotFound,
            AppError::AuditNotFound { .. } => ErrorCode::AuditNotFound,
            AppError::CourseNotFound { .. } => ErrorCode::CourseNotFound,
            AppError::ToolNotFound { .. } => ErrorCode::ToolNotFound,
            AppError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            AppError::AuditAlreadyResolved { .. } => ErrorCode::AuditAlreadyResolved,
            AppError::PendingAuditExists { .. } => ErrorCode::PendingAuditExists,
            AppError::QuotaExceeded { .. } => ErrorCode::QuotaExceeded,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::Provider { .. } => ErrorCode::ProviderError,
            AppError::Storage { .. } => ErrorCode::StorageError,
            AppError::HttpClient(_) => ErrorCode::ProviderError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. }
            | AppError::MissingField { .. }
            | AppError::InvalidFormat { .. } => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::Unauthorized { .. } | AppError::InvalidApiKey | AppError::ExpiredToken => {
                StatusCode::UNAUTHORIZED
            }

            // 403 Forbidden
            AppError::Forbidden { .. }
            | AppError::SchoolMismatch
            | AppError::ToolNotAuthorized { .. } => StatusCode::FORBIDDEN,

            // 404 Not Found
            AppError::NotFound { .. }
            | AppError::ContentNotFound { .. }
            | AppError::AuditNotFound { .. }
            | AppError::CourseNotFound { .. }
            | AppError::ToolNotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::InvalidTransition { .. }
            | AppError::AuditAlreadyResolved { .. }
            | AppError::PendingAuditExists { .. } => StatusCode::CONFLICT,

            // 429 Too Many Requests
            AppError::QuotaExceeded { .. } | AppError::RateLimited { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }

            // 500 Internal Server Error
            AppError::Database(_)
            | AppError::DatabaseConnection { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::Provider { .. } | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            AppError::Storage { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Message safe to surface to the caller.
    ///
    /// Provider failures carry upstream response bodies and database
    /// errors carry connection details; both are logged server-side and
    /// replaced with a generic message at the boundary.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Provider { .. } | AppError::HttpClient(_) => {
                "AI provider request failed".to_string()
            }
            AppError::Database(_) | AppError::DatabaseConnection { .. } => {
                "Internal storage error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
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
            error: ErrorDetails {
                code,
                message: self.public_message(),
                details: None,
                request_id: None, // Should be filled by middleware
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::ContentNotFound { id: "test".into() };
        assert_eq!(err.code(), ErrorCode::ContentNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_state_error_is_conflict() {
        let err = AppError::AuditAlreadyResolved { id: "a1".into() };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert!(err.is_client_error());
    }

    #[test]
    fn test_quota_exceeded() {
        let err = AppError::QuotaExceeded {
            window: QuotaWindow::Daily,
            limit: 5,
        };
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.to_string(), "daily quota exceeded: limit 5");
    }

    #[test]
    fn test_provider_message_is_masked() {
        let err = AppError::Provider {
            message: "upstream 500: secret internals".into(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.public_message(), "AI provider request failed");
        assert!(err.to_string().contains("secret internals"));
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::Validation {
            message: "Invalid name".into(),
            field: Some("name".into()),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
    }
}
