//! Error types for the Folio server

use std::sync::OnceLock;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::pdf::PdfError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Whether error responses carry internal details. Set once at startup.
static EXPOSE_DETAILS: OnceLock<bool> = OnceLock::new();

/// Configure whether internal error details are included in responses.
///
/// Only the first call has an effect; later calls are ignored.
pub fn expose_details(enabled: bool) {
    let _ = EXPOSE_DETAILS.set(enabled);
}

fn details_enabled() -> bool {
    *EXPOSE_DETAILS.get().unwrap_or(&cfg!(debug_assertions))
}

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),
}

impl AppError {
    /// Stable machine-readable kind of this error
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Pdf(PdfError::InvalidDocument(_)) => "validation_error",
            AppError::Internal(_) | AppError::Database(_) | AppError::Io(_) | AppError::Pdf(_) => {
                "internal_error"
            }
        }
    }

    /// HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            "validation_error" => StatusCode::BAD_REQUEST,
            "not_found" => StatusCode::NOT_FOUND,
            "conflict" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to clients
    fn public_message(&self) -> String {
        match self {
            AppError::Validation(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::Internal(msg) => msg.clone(),
            AppError::Database(_) => "Database error".to_string(),
            AppError::Io(_) => "IO error".to_string(),
            AppError::Pdf(e) => e.to_string(),
        }
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(kind = self.kind(), "{}", self);
        } else {
            tracing::debug!(kind = self.kind(), "{}", self);
        }

        let body = Json(ErrorResponse {
            error: self.kind(),
            message: self.public_message(),
            details: if details_enabled() {
                Some(format!("{:?}", self))
            } else {
                None
            },
        });

        (status, body).into_response()
    }
}
