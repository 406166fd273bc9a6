//! Upload session routes
//!
//! A client reserves a session id here, passes it to the file upload as
//! `?uploadId=` and polls the session from a separate request.
//!
//! Endpoints:
//! - POST /api/v1/uploads - Reserve an upload session
//! - GET /api/v1/uploads/:id - Get session progress

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::upload::UploadProgress;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateResponse {
    pub upload_id: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(initiate_upload))
        .route("/:id", get(get_progress))
}

/// POST /api/v1/uploads
async fn initiate_upload(State(state): State<AppState>) -> (StatusCode, Json<InitiateResponse>) {
    let upload_id = state.uploads().initiate();
    (StatusCode::CREATED, Json(InitiateResponse { upload_id }))
}

/// GET /api/v1/uploads/:id
async fn get_progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UploadProgress>> {
    state
        .uploads()
        .get(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Upload session {} not found", id)))
}
