//! File (document) routes
//!
//! Endpoints:
//! - POST /api/v1/files?uploadId= - Multipart upload (`file` field)
//! - GET /api/v1/files - List documents
//! - GET /api/v1/files/:key - Get document record
//! - GET /api/v1/files/:key/download - Document bytes
//! - DELETE /api/v1/files/:key - Delete document, its images and status
//! - POST /api/v1/files/:key/truncate - Run truncation
//! - GET /api/v1/files/:key/truncate/status - Truncation status
//! - POST /api/v1/files/:key/images - Run image conversion
//! - GET /api/v1/files/:key/images/status - Conversion status
//! - GET /api/v1/files/:key/images - List images of a document
//! - DELETE /api/v1/files/:key/images - Delete images of a document

use std::path::Path as FsPath;

use axum::{
    extract::{multipart::Field, rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use super::{file_response, json_body};
use crate::error::{AppError, Result};
use crate::keys::{document_disk_name, generate_key};
use crate::pipeline::{ConversionRequest, ConversionResult, SelectionRequest, TruncationResult};
use crate::state::AppState;
use crate::store::{NewDocument, ProcessingStatus, StatusTable, StoredDocument, StoredImage};

const PDF_SIGNATURE: &[u8] = b"%PDF-";
const PDF_MIME: &str = "application/pdf";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadQuery {
    pub upload_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DocumentListResponse {
    pub files: Vec<StoredDocument>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ImageListResponse {
    pub images: Vec<StoredImage>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: usize,
}

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list_files)
                .post(upload_file)
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/:key", get(get_file).delete(delete_file))
        .route("/:key/download", get(download_file))
        .route("/:key/truncate", post(truncate_file))
        .route("/:key/truncate/status", get(truncation_status))
        .route(
            "/:key/images",
            get(list_file_images)
                .post(convert_file)
                .delete(delete_file_images),
        )
        .route("/:key/images/status", get(conversion_status))
}

// ============================================================================
// Upload
// ============================================================================

/// POST /api/v1/files?uploadId=
///
/// Streams the `file` field to disk. With an `uploadId` the session is moved
/// through `uploading` to `completed` or `error`; its total is the request's
/// `Content-Length`.
async fn upload_file(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<(StatusCode, Json<StoredDocument>)> {
    let upload_id = query.upload_id.as_deref();

    if let Some(id) = upload_id {
        state.uploads().start(id, content_length(&headers))?;
    }

    let result = receive_document(&state, multipart, upload_id).await;

    if let Some(id) = upload_id {
        match &result {
            Ok(_) => state.uploads().complete(id),
            Err(e) => state.uploads().fail(id, e.to_string()),
        }
    }

    result.map(|document| (StatusCode::CREATED, Json(document)))
}

async fn receive_document(
    state: &AppState,
    mut multipart: Multipart,
    upload_id: Option<&str>,
) -> Result<StoredDocument> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            tracing::debug!(field = ?field.name(), "Skipping multipart field");
            continue;
        }

        let name = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "document.pdf".to_string());
        let key = generate_key();
        let disk_name = document_disk_name(&key, &name);
        let path = state.fs().document_path(&disk_name);

        if let Err(e) = write_field(state, field, &path, upload_id).await {
            discard(state, &path).await;
            return Err(e);
        }

        let size = state.fs().stat(&path).await?;
        let stored = state
            .store()
            .store_document(NewDocument {
                key,
                name,
                disk_name,
                path: path.to_string_lossy().to_string(),
                size: size as i64,
                mime_type: PDF_MIME.to_string(),
            })
            .await;

        return match stored {
            Ok(document) => {
                tracing::info!(
                    document_key = %document.key,
                    name = %document.name,
                    size,
                    "Stored uploaded document"
                );
                Ok(document)
            }
            Err(e) => {
                discard(state, &path).await;
                Err(e)
            }
        };
    }

    Err(AppError::Validation(
        "No file provided. Use field name 'file'".to_string(),
    ))
}

/// Stream one multipart field to `path`, rejecting bodies that are not PDFs
async fn write_field(
    state: &AppState,
    mut field: Field<'_>,
    path: &FsPath,
    upload_id: Option<&str>,
) -> Result<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut head = Vec::with_capacity(PDF_SIGNATURE.len());
    let mut loaded = 0u64;

    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if head.len() < PDF_SIGNATURE.len() {
            let needed = PDF_SIGNATURE.len() - head.len();
            head.extend_from_slice(&chunk[..needed.min(chunk.len())]);
            if !PDF_SIGNATURE.starts_with(&head) {
                return Err(not_a_pdf());
            }
        }

        file.write_all(&chunk).await?;
        loaded += chunk.len() as u64;

        if let Some(id) = upload_id {
            state.uploads().update(id, loaded);
        }
    }

    if head.as_slice() != PDF_SIGNATURE {
        return Err(not_a_pdf());
    }

    file.flush().await?;
    Ok(loaded)
}

async fn discard(state: &AppState, path: &FsPath) {
    if let Err(e) = state.fs().delete(path).await {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial upload");
    }
}

fn content_length(headers: &HeaderMap) -> u64 {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    tracing::error!("Failed to read multipart upload: {}", e);
    AppError::Validation(format!("Failed to read upload: {}", e.body_text()))
}

fn not_a_pdf() -> AppError {
    AppError::Validation("Uploaded file is not a PDF".to_string())
}

// ============================================================================
// Documents
// ============================================================================

/// GET /api/v1/files
async fn list_files(State(state): State<AppState>) -> Result<Json<DocumentListResponse>> {
    let files = state.store().list_documents().await?;
    let total = files.len();
    Ok(Json(DocumentListResponse { files, total }))
}

/// GET /api/v1/files/:key
async fn get_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<StoredDocument>> {
    Ok(Json(state.store().get_document(&key).await?))
}

/// GET /api/v1/files/:key/download
async fn download_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response> {
    let document = state.store().get_document(&key).await?;
    let data = state.fs().read(&document.path).await?;
    file_response(data, &document.mime_type, &document.name)
}

/// DELETE /api/v1/files/:key
async fn delete_file(State(state): State<AppState>, Path(key): Path<String>) -> Result<StatusCode> {
    state.store().delete_document(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Pipelines
// ============================================================================

/// POST /api/v1/files/:key/truncate
async fn truncate_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
    payload: std::result::Result<Json<SelectionRequest>, JsonRejection>,
) -> Result<Json<TruncationResult>> {
    let request = json_body(payload)?;
    Ok(Json(state.truncation().run(&key, &request).await?))
}

/// GET /api/v1/files/:key/truncate/status
async fn truncation_status(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ProcessingStatus>> {
    Ok(Json(state.store().get_status(StatusTable::Truncation, &key).await?))
}

/// POST /api/v1/files/:key/images
async fn convert_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
    payload: std::result::Result<Json<ConversionRequest>, JsonRejection>,
) -> Result<Json<ConversionResult>> {
    let request = json_body(payload)?;
    Ok(Json(state.conversion().run(&key, &request).await?))
}

/// GET /api/v1/files/:key/images/status
async fn conversion_status(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ProcessingStatus>> {
    Ok(Json(
        state
            .store()
            .get_status(StatusTable::ImageConversion, &key)
            .await?,
    ))
}

/// GET /api/v1/files/:key/images
async fn list_file_images(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ImageListResponse>> {
    let images = state.store().list_images_by_parent(&key).await?;
    let total = images.len();
    Ok(Json(ImageListResponse { images, total }))
}

/// DELETE /api/v1/files/:key/images
async fn delete_file_images(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeletedResponse>> {
    let deleted = state.store().delete_images_by_parent(&key).await?;
    Ok(Json(DeletedResponse { deleted }))
}
