//! Metadata store
//!
//! Durable record of stored documents, rendered page images and the two
//! pipeline status tables. The store also owns the link between a record and
//! its file on disk:
//!
//! - a read that finds the file missing deletes the stale record and reports
//!   not-found
//! - deleting a document removes image files, then the document file, then
//!   the document record, which cascades to its image and status records
//!
//! Two interchangeable implementations: `SqliteStore` (durable) and
//! `MemoryStore` (process-local).

mod memory;
mod sqlite;
mod types;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use types::*;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::storage::FileSystem;

/// Capability interface over the metadata backends
#[async_trait]
pub trait MetadataStore: Send + Sync {
    // Documents

    /// Insert a document record. Fails with `Conflict` if the key exists.
    async fn store_document(&self, document: NewDocument) -> Result<StoredDocument>;

    /// Fetch a document whose file is present on disk
    async fn get_document(&self, key: &str) -> Result<StoredDocument>;

    async fn list_documents(&self) -> Result<Vec<StoredDocument>>;

    /// Delete a document, its images and both status rows, files first
    async fn delete_document(&self, key: &str) -> Result<()>;

    // Images

    /// Insert an image record. Fails with `NotFound` if the parent is unknown.
    async fn store_image(&self, image: NewImage) -> Result<StoredImage>;

    async fn get_image(&self, key: &str) -> Result<StoredImage>;

    async fn list_images(&self) -> Result<Vec<StoredImage>>;

    async fn list_images_by_parent(&self, document_key: &str) -> Result<Vec<StoredImage>>;

    async fn delete_image(&self, key: &str) -> Result<()>;

    /// Delete every image of a document. Returns how many records were removed.
    async fn delete_images_by_parent(&self, document_key: &str) -> Result<usize>;

    // Status

    /// Create or replace the status row for `key`
    async fn set_status(
        &self,
        table: StatusTable,
        key: &str,
        status: ProcessingStatus,
    ) -> Result<()>;

    async fn get_status(&self, table: StatusTable, key: &str) -> Result<ProcessingStatus>;

    /// Merge `update` into the existing row. Fails with `NotFound` if there is none.
    async fn update_status(
        &self,
        table: StatusTable,
        key: &str,
        update: StatusUpdate,
    ) -> Result<ProcessingStatus>;
}

pub(crate) fn document_not_found(key: &str) -> AppError {
    AppError::NotFound(format!("Document {} not found", key))
}

pub(crate) fn image_not_found(key: &str) -> AppError {
    AppError::NotFound(format!("Image {} not found", key))
}

pub(crate) fn status_not_found(table: StatusTable, key: &str) -> AppError {
    AppError::NotFound(format!("No {} entry for {}", table.table_name(), key))
}

/// Paths of the given images, in order
pub(crate) fn image_paths(images: &[StoredImage]) -> Vec<&str> {
    images.iter().map(|image| image.path.as_str()).collect()
}

/// Delete files best-effort, returning a description of each failure
pub(crate) async fn remove_files(fs: &FileSystem, paths: &[&str]) -> Vec<String> {
    let mut failures = Vec::new();
    for path in paths {
        if let Err(e) = fs.delete(path).await {
            tracing::warn!(path = %path, error = %e, "Failed to delete file");
            failures.push(format!("{}: {}", path, e));
        }
    }
    failures
}

/// Turn collected delete failures into an `Internal` error
pub(crate) fn check_removal(failures: Vec<String>) -> Result<()> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(AppError::Internal(format!(
            "Failed to delete {} file(s): {}",
            failures.len(),
            failures.join("; ")
        )))
    }
}

#[cfg(test)]
pub(crate) mod conformance;
