//! Application error type.
//!
//! Every fallible operation in the workspace returns [`AppResult`]. Errors
//! that escape a handler are rendered as an [`ApiResponse`] error envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::response::ApiResponse;

/// Result alias used across the workspace.
pub type AppResult<T> = Result<T, AppError>;

/// Errors produced by the question answering pipeline and its surroundings.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The database could not be reached, or metadata could not be read.
    #[error("database connection failed: {0}")]
    DatabaseConnection(String),

    /// A statement failed while executing.
    #[error("query execution failed: {0}")]
    DatabaseQuery(String),

    /// A statement was rejected by the read-only guard.
    #[error("unsafe SQL rejected: {0}")]
    UnsafeSql(String),

    /// The language model call failed or returned something unusable.
    #[error("query generation failed: {0}")]
    Generation(String),

    /// Request validation failed.
    #[error("validation error: {0}")]
    Validation(String),

    /// The configured database driver is not supported.
    #[error("unsupported database type: {0}")]
    UnsupportedDatabaseType(String),
}

impl AppError {
    /// Stable error code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::DatabaseConnection(_) => "DATABASE_CONNECTION_ERROR",
            AppError::DatabaseQuery(_) => "DATABASE_QUERY_ERROR",
            AppError::UnsafeSql(_) => "UNSAFE_SQL",
            AppError::Generation(_) => "GENERATION_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::UnsupportedDatabaseType(_) => "UNSUPPORTED_DATABASE_TYPE",
        }
    }

    /// HTTP status used when the error escapes a handler.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::UnsafeSql(_) => StatusCode::BAD_REQUEST,
            AppError::DatabaseQuery(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Generation(_) => StatusCode::BAD_GATEWAY,
            AppError::DatabaseConnection(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Config(_) | AppError::UnsupportedDatabaseType(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        } else {
            tracing::warn!(code = self.code(), error = %self, "request rejected");
        }
        let body = ApiResponse::err(self.code(), self.to_string());
        (status, Json(body)).into_response()
    }
}
