//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("missing setting: {0}")]
    Missing(&'static str),
}

/// Errors reported by the remote store. `not found` is never one of them: reads return `None`.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("transport: {0}")]
    Transport(String),
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("permission denied: {0}")]
    Permission(String),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("database: {0}")]
    Database(String),
}

impl StoreError {
    /// Transport failures are the only ones worth retrying on reads.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transport(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Transport(e.to_string()),
            sqlx::Error::Database(db) => {
                let code = db.code().map(|c| c.to_string()).unwrap_or_default();
                if code.starts_with("23") {
                    StoreError::Constraint(db.message().to_string())
                } else if code == "42501" {
                    StoreError::Permission(db.message().to_string())
                } else if code.starts_with("42") || code.starts_with("22") {
                    StoreError::InvalidQuery(db.message().to_string())
                } else {
                    StoreError::Database(db.message().to_string())
                }
            }
            _ => StoreError::Database(e.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("storage: {0}")]
    Storage(String),
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::Store(e) => match e {
                StoreError::Transport(_) => (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable"),
                StoreError::Constraint(_) => (StatusCode::CONFLICT, "conflict"),
                StoreError::Permission(_) => (StatusCode::FORBIDDEN, "forbidden"),
                StoreError::InvalidQuery(_) => (StatusCode::BAD_REQUEST, "invalid_query"),
                StoreError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            },
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Storage(_) => (StatusCode::BAD_GATEWAY, "storage_error"),
            AppError::Serialization(_) => (StatusCode::INTERNAL_SERVER_ERROR, "serialization_error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}
