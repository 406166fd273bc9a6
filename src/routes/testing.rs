//! Router test harness: in-memory store, temporary storage root and a
//! rasterizer that writes small PNGs instead of spawning pdftoppm.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::config::Config;
use crate::pdf::{with_extension, ImageFormat, LopdfExtractor, PageRasterizer, PdfError, PdfResult};
use crate::state::AppState;
use crate::storage::FileSystem;
use crate::store::{MemoryStore, MetadataStore};
use crate::upload::UploadTracker;

pub const BOUNDARY: &str = "folio-test-boundary";

pub struct PngRasterizer;

#[async_trait]
impl PageRasterizer for PngRasterizer {
    async fn render(
        &self,
        _source: &Path,
        page_number: u32,
        format: ImageFormat,
        _scale: f32,
        target_stem: &Path,
    ) -> PdfResult<PathBuf> {
        let path = with_extension(target_stem, format);
        image::RgbImage::new(page_number * 4, 4)
            .save_with_format(&path, image::ImageFormat::Png)
            .map_err(|e| PdfError::RenderError(e.to_string()))?;
        Ok(path)
    }
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let fs = FileSystem::new(dir.path());
        fs.init().await.unwrap();

        let store: Arc<dyn MetadataStore> = Arc::new(MemoryStore::new(fs.clone()));
        let state = AppState::from_parts(
            Config::default(),
            fs,
            store,
            UploadTracker::new(),
            Arc::new(LopdfExtractor::new()),
            Arc::new(PngRasterizer),
        );
        let router = super::router(state.clone());

        Self {
            state,
            router,
            _dir: dir,
        }
    }

    /// Send a request and return the status with the raw body
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    /// Send a request and parse the body as JSON (`Null` when empty)
    pub async fn send_json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, body) = self.send(request).await;
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send_json(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send_json(
            Request::builder()
                .method(Method::DELETE)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send_json(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Upload `data` as the multipart `file` field
    pub async fn upload(&self, uri: &str, file_name: &str, data: &[u8]) -> (StatusCode, Value) {
        let body = multipart_body(file_name, data);
        self.send_json(
            Request::post(uri)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .header(header::CONTENT_LENGTH, body.len())
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }
}

pub fn multipart_body(file_name: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/pdf\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}
