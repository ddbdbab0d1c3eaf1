//! Application error type.
//!
//! Exploration failures (`InvalidUrl`, `Connection`, `UnsupportedBackend`)
//! abort an exploration call. `MetadataQuery` is what a client returns when a
//! single metadata sub-query fails; drivers downgrade it to a logged warning
//! except where the failing step is the top-level enumeration.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::models::BackendKind;
use crate::response::ApiResponse;
use crate::utils::redact_credentials;

/// Result alias used across the workspace.
pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A backend-specific URL did not match its expected pattern.
    #[error("Invalid {kind} URL format: {url}")]
    InvalidUrl { kind: BackendKind, url: String },

    /// The initial connect/authenticate step failed.
    #[error("{kind} exploration failed: {message}")]
    Connection { kind: BackendKind, message: String },

    /// No driver is registered for the detected kind.
    #[error("Unsupported database type: {0}")]
    UnsupportedBackend(BackendKind),

    /// A metadata query failed after a connection was established.
    #[error("{kind} metadata query failed: {message}")]
    MetadataQuery { kind: BackendKind, message: String },

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Registry file could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Invalid URL error. The stored URL has its credentials redacted.
    pub fn invalid_url(kind: BackendKind, url: &str) -> Self {
        AppError::InvalidUrl {
            kind,
            url: redact_credentials(url),
        }
    }

    pub fn metadata_query(kind: BackendKind, message: impl std::fmt::Display) -> Self {
        AppError::MetadataQuery {
            kind,
            message: message.to_string(),
        }
    }

    pub fn connection(kind: BackendKind, message: impl std::fmt::Display) -> Self {
        AppError::Connection {
            kind,
            message: message.to_string(),
        }
    }

    /// Backend kind of an exploration failure.
    pub fn backend_kind(&self) -> Option<BackendKind> {
        match self {
            AppError::InvalidUrl { kind, .. }
            | AppError::Connection { kind, .. }
            | AppError::MetadataQuery { kind, .. }
            | AppError::UnsupportedBackend(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Stable error code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidUrl { .. } => "INVALID_URL",
            AppError::Connection { .. } => "CONNECTION_FAILED",
            AppError::UnsupportedBackend(_) => "UNSUPPORTED_BACKEND",
            AppError::MetadataQuery { .. } => "METADATA_QUERY_FAILED",
            AppError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            AppError::ConnectionNotFound(_) => "CONNECTION_NOT_FOUND",
            AppError::TableNotFound(_) => "TABLE_NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidUrl { .. }
            | AppError::UnsupportedBackend(_)
            | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::SessionNotFound(_)
            | AppError::ConnectionNotFound(_)
            | AppError::TableNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Connection { .. } | AppError::MetadataQuery { .. } => StatusCode::BAD_GATEWAY,
            AppError::Storage(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "request rejected");
        }
        let body = match self.backend_kind() {
            Some(kind) => ApiResponse::err_with_details(
                self.code(),
                self.to_string(),
                serde_json::json!({ "dbType": kind }),
            ),
            None => ApiResponse::err(self.code(), self.to_string()),
        };
        (status, Json(body)).into_response()
    }
}
