//! Image routes
//!
//! Endpoints:
//! - GET /api/v1/images - List images
//! - GET /api/v1/images/:key - Get image record
//! - GET /api/v1/images/:key/download - Image bytes
//! - DELETE /api/v1/images/:key - Delete image

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    routing::get,
    Json, Router,
};

use super::file_response;
use super::files::ImageListResponse;
use crate::error::Result;
use crate::state::AppState;
use crate::store::StoredImage;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_images))
        .route("/:key", get(get_image).delete(delete_image))
        .route("/:key/download", get(download_image))
}

/// GET /api/v1/images
async fn list_images(State(state): State<AppState>) -> Result<Json<ImageListResponse>> {
    let images = state.store().list_images().await?;
    let total = images.len();
    Ok(Json(ImageListResponse { images, total }))
}

/// GET /api/v1/images/:key
async fn get_image(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<StoredImage>> {
    Ok(Json(state.store().get_image(&key).await?))
}

/// GET /api/v1/images/:key/download
async fn download_image(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response> {
    let image = state.store().get_image(&key).await?;
    let data = state.fs().read(&image.path).await?;
    file_response(data, &image.mime_type, &image.name)
}

/// DELETE /api/v1/images/:key
async fn delete_image(State(state): State<AppState>, Path(key): Path<String>) -> Result<StatusCode> {
    state.store().delete_image(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}
