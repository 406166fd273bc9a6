//! Image conversion
//!
//! Renders every selected page concurrently and registers each result as an
//! image linked to the source document. A failed page fails the run, but the
//! images already registered for other pages are kept.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use super::selection::{PageSelection, SelectionRequest};
use super::{record_failure, PROGRESS_RESOLVED, PROGRESS_TRANSFORMED};
use crate::error::{AppError, Result};
use crate::keys::{generate_key, page_image_name};
use crate::pdf::{ImageFormat, PageExtractor, PageRasterizer, MAX_SCALE, MIN_SCALE};
use crate::storage::FileSystem;
use crate::store::{
    MetadataStore, NewImage, ProcessingState, ProcessingStatus, StatusTable, StatusUpdate,
    StoredDocument,
};

const TABLE: StatusTable = StatusTable::ImageConversion;

const DEFAULT_SCALE: f32 = 1.0;

/// Conversion request body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionRequest {
    #[serde(flatten)]
    pub selection: SelectionRequest,
    #[serde(default)]
    pub format: Option<ImageFormat>,
    #[serde(default)]
    pub scale: Option<f32>,
}

impl ConversionRequest {
    fn scale(&self) -> Result<f32> {
        match self.scale {
            None => Ok(DEFAULT_SCALE),
            Some(scale) if (MIN_SCALE..=MAX_SCALE).contains(&scale) => Ok(scale),
            Some(scale) => Err(AppError::Validation(format!(
                "Scale must be between {} and {}, got {}",
                MIN_SCALE, MAX_SCALE, scale
            ))),
        }
    }
}

/// Outcome of a successful conversion
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    pub document_key: String,
    /// Image keys in selection order
    pub image_keys: Vec<String>,
}

/// Image conversion pipeline
#[derive(Clone)]
pub struct ConversionPipeline {
    store: Arc<dyn MetadataStore>,
    fs: FileSystem,
    extractor: Arc<dyn PageExtractor>,
    rasterizer: Arc<dyn PageRasterizer>,
}

impl ConversionPipeline {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        fs: FileSystem,
        extractor: Arc<dyn PageExtractor>,
        rasterizer: Arc<dyn PageRasterizer>,
    ) -> Self {
        Self {
            store,
            fs,
            extractor,
            rasterizer,
        }
    }

    /// Render the selected pages of `document_key` to images.
    ///
    /// A malformed request is rejected before the status row is touched.
    pub async fn run(
        &self,
        document_key: &str,
        request: &ConversionRequest,
    ) -> Result<ConversionResult> {
        let selection = request.selection.selection()?;
        let scale = request.scale()?;
        let format = request.format.unwrap_or_default();

        self.store
            .set_status(
                TABLE,
                document_key,
                ProcessingStatus::new(ProcessingState::Processing),
            )
            .await?;

        match self.execute(document_key, &selection, format, scale).await {
            Ok(result) => Ok(result),
            Err(e) => {
                record_failure(self.store.as_ref(), TABLE, document_key, &e).await;
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        document_key: &str,
        selection: &PageSelection,
        format: ImageFormat,
        scale: f32,
    ) -> Result<ConversionResult> {
        let source = self.store.get_document(document_key).await?;
        let data: Arc<[u8]> = self.fs.read(&source.path).await?.into();

        let page_count = self.extractor.page_count(data).await?;
        let indices = selection.resolve(page_count)?;
        self.store
            .update_status(TABLE, document_key, StatusUpdate::progress(PROGRESS_RESOLVED))
            .await?;

        let conversions = indices
            .iter()
            .map(|&index| self.convert_page(&source, index as u32 + 1, format, scale));
        let results = join_all(conversions).await;

        let mut image_keys = Vec::with_capacity(results.len());
        let mut first_error = None;
        let mut failed = 0;
        for result in results {
            match result {
                Ok(key) => image_keys.push(key),
                Err(e) => {
                    failed += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            tracing::warn!(
                document_key = %document_key,
                converted = image_keys.len(),
                failed,
                "Page conversion failed"
            );
            return Err(e);
        }

        self.store
            .update_status(TABLE, document_key, StatusUpdate::progress(PROGRESS_TRANSFORMED))
            .await?;
        self.store
            .update_status(TABLE, document_key, StatusUpdate::completed())
            .await?;

        tracing::info!(
            document_key = %document_key,
            pages = image_keys.len(),
            format = %format,
            scale,
            "Converted pages to images"
        );

        Ok(ConversionResult {
            document_key: document_key.to_string(),
            image_keys,
        })
    }

    /// Render one page (1-based) and register it
    async fn convert_page(
        &self,
        source: &StoredDocument,
        page_number: u32,
        format: ImageFormat,
        scale: f32,
    ) -> Result<String> {
        let key = generate_key();
        let stem = self.fs.image_path(&key);

        let written = self
            .rasterizer
            .render(Path::new(&source.path), page_number, format, scale, &stem)
            .await?;

        let disk_name = written
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("{}.{}", key, format.extension()));
        let size = self.fs.stat(&written).await?;
        let (width, height) = image_dimensions(written.clone()).await;

        let stored = self
            .store
            .store_image(NewImage {
                key: key.clone(),
                document_key: source.key.clone(),
                name: page_image_name(&source.name, page_number, format.extension()),
                disk_name,
                path: written.to_string_lossy().to_string(),
                size: size as i64,
                mime_type: format.mime_type().to_string(),
                page_number,
                format,
                width,
                height,
            })
            .await;

        if let Err(e) = stored {
            if let Err(cleanup) = self.fs.delete(&written).await {
                tracing::warn!(path = %written.display(), error = %cleanup, "Failed to remove unregistered image");
            }
            return Err(e);
        }

        tracing::debug!(
            document_key = %source.key,
            image_key = %key,
            page = page_number,
            size,
            "Registered page image"
        );

        Ok(key)
    }
}

/// Pixel dimensions of a rendered image, if it can be decoded
async fn image_dimensions(path: PathBuf) -> (Option<u32>, Option<u32>) {
    match tokio::task::spawn_blocking(move || image::image_dimensions(&path)).await {
        Ok(Ok((width, height))) => (Some(width), Some(height)),
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "Could not read image dimensions");
            (None, None)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Dimension read task failed");
            (None, None)
        }
    }
}
