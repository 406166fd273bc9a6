//! Route modules for Folio Server

pub mod files;
pub mod health;
pub mod images;
pub mod uploads;

#[cfg(test)]
pub(crate) mod testing;

use axum::{
    body::Body,
    extract::rejection::JsonRejection,
    http::{header, StatusCode},
    response::Response,
    Json, Router,
};

use crate::error::{AppError, Result};
use crate::keys::sanitize_file_name;
use crate::state::AppState;

/// Build the application router
pub fn router(state: AppState) -> Router {
    let max_upload_bytes = state.config().upload.max_bytes;

    Router::new()
        .merge(health::router())
        .nest("/api/v1/uploads", uploads::router())
        .nest("/api/v1/files", files::router(max_upload_bytes))
        .nest("/api/v1/images", images::router())
        .with_state(state)
}

/// Unwrap a JSON body, reporting a malformed one as a validation error
pub(crate) fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| AppError::Validation(e.body_text()))
}

/// Serve stored bytes inline
pub(crate) fn file_response(data: Vec<u8>, mime_type: &str, name: &str) -> Result<Response> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime_type)
        .header(header::CONTENT_LENGTH, data.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", sanitize_file_name(name)),
        )
        .body(Body::from(data))
        .map_err(|e| AppError::Internal(e.to_string()))
}
