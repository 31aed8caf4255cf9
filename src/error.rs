//! Typed errors and HTTP mapping.

use crate::response::{error_envelope, ApiError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Error type returned by hooks, middleware and plain handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    InvalidPath { field: &'static str, reason: String },
    #[error("env {name}: {reason}")]
    Env { name: &'static str, reason: String },
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("{0} method not allowed")]
    Unsupported(&'static str),
    #[error("storage: {0}")]
    Storage(String),
    #[error("{0}")]
    Other(BoxError),
}

impl DriverError {
    pub fn other(err: impl Into<BoxError>) -> Self {
        DriverError::Other(err.into())
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Driver(DriverError::Unsupported(_)) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Config(_) | AppError::Driver(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Wire-level error entry for this failure.
    pub fn api_error(&self) -> ApiError {
        let (code, field) = match self {
            AppError::Config(_) => ("config", "service"),
            AppError::Driver(DriverError::Unsupported(_)) => ("not-allowed", "method"),
            AppError::Driver(_) | AppError::Internal(_) => ("internal", "service"),
            AppError::NotFound(_) => ("not-found", "path"),
            AppError::BadRequest(_) => ("bad-request", "request"),
            AppError::PayloadTooLarge(_) => ("too-large", "body"),
        };
        ApiError::new(code, field, self.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(error_envelope(vec![self.api_error()]))).into_response()
    }
}
