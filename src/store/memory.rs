//! In-memory metadata store
//!
//! Process-local tables behind a single lock. Images reference their parent
//! through `document_key`, and deleting a document removes those rows and
//! both status rows in the same critical section.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{
    check_removal, document_not_found, image_not_found, image_paths, remove_files, status_not_found,
    MetadataStore, NewDocument, NewImage, ProcessingStatus, StatusTable, StatusUpdate,
    StoredDocument, StoredImage,
};
use crate::error::{AppError, Result};
use crate::storage::FileSystem;

/// `MetadataStore` kept in process memory
pub struct MemoryStore {
    fs: FileSystem,
    tables: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    documents: HashMap<String, StoredDocument>,
    images: HashMap<String, StoredImage>,
    truncation_status: HashMap<String, ProcessingStatus>,
    image_status: HashMap<String, ProcessingStatus>,
}

impl Tables {
    fn status(&self, table: StatusTable) -> &HashMap<String, ProcessingStatus> {
        match table {
            StatusTable::Truncation => &self.truncation_status,
            StatusTable::ImageConversion => &self.image_status,
        }
    }

    fn status_mut(&mut self, table: StatusTable) -> &mut HashMap<String, ProcessingStatus> {
        match table {
            StatusTable::Truncation => &mut self.truncation_status,
            StatusTable::ImageConversion => &mut self.image_status,
        }
    }

    /// Remove a document row and everything that cascades from it
    fn remove_document(&mut self, key: &str) -> Option<StoredDocument> {
        let removed = self.documents.remove(key)?;
        self.images.retain(|_, image| image.document_key != key);
        self.truncation_status.remove(key);
        self.image_status.remove(key);
        Some(removed)
    }

    fn images_of(&self, document_key: &str) -> Vec<StoredImage> {
        let mut images: Vec<StoredImage> = self
            .images
            .values()
            .filter(|image| image.document_key == document_key)
            .cloned()
            .collect();
        images.sort_by(|a, b| (a.page_number, a.created_at).cmp(&(b.page_number, b.created_at)));
        images
    }
}

impl MemoryStore {
    pub fn new(fs: FileSystem) -> Self {
        Self {
            fs,
            tables: RwLock::new(Tables::default()),
        }
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn store_document(&self, document: NewDocument) -> Result<StoredDocument> {
        let mut tables = self.tables.write();
        if tables.documents.contains_key(&document.key) {
            return Err(AppError::Conflict(format!(
                "Document {} already exists",
                document.key
            )));
        }

        let record = document.into_record();
        tables.documents.insert(record.key.clone(), record.clone());
        Ok(record)
    }

    async fn get_document(&self, key: &str) -> Result<StoredDocument> {
        let document = self
            .tables
            .read()
            .documents
            .get(key)
            .cloned()
            .ok_or_else(|| document_not_found(key))?;

        if self.fs.exists(&document.path).await {
            return Ok(document);
        }

        tracing::warn!(document_key = %key, path = %document.path, "Document file missing, removing stale record");
        let images = self.tables.read().images_of(key);
        remove_files(&self.fs, &image_paths(&images)).await;
        self.tables.write().remove_document(key);

        Err(document_not_found(key))
    }

    async fn list_documents(&self) -> Result<Vec<StoredDocument>> {
        let mut documents: Vec<StoredDocument> =
            self.tables.read().documents.values().cloned().collect();
        documents.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(documents)
    }

    async fn delete_document(&self, key: &str) -> Result<()> {
        let (document, images) = {
            let tables = self.tables.read();
            let document = tables
                .documents
                .get(key)
                .cloned()
                .ok_or_else(|| document_not_found(key))?;
            (document, tables.images_of(key))
        };

        let mut failures = remove_files(&self.fs, &image_paths(&images)).await;
        failures.extend(remove_files(&self.fs, &[document.path.as_str()]).await);

        self.tables.write().remove_document(key);

        tracing::info!(
            document_key = %key,
            images = images.len(),
            "Deleted document"
        );

        check_removal(failures)
    }

    async fn store_image(&self, image: NewImage) -> Result<StoredImage> {
        let mut tables = self.tables.write();
        if !tables.documents.contains_key(&image.document_key) {
            return Err(document_not_found(&image.document_key));
        }
        if tables.images.contains_key(&image.key) {
            return Err(AppError::Conflict(format!("Image {} already exists", image.key)));
        }

        let record = image.into_record();
        tables.images.insert(record.key.clone(), record.clone());
        Ok(record)
    }

    async fn get_image(&self, key: &str) -> Result<StoredImage> {
        let image = self
            .tables
            .read()
            .images
            .get(key)
            .cloned()
            .ok_or_else(|| image_not_found(key))?;

        if self.fs.exists(&image.path).await {
            return Ok(image);
        }

        tracing::warn!(image_key = %key, path = %image.path, "Image file missing, removing stale record");
        self.tables.write().images.remove(key);
        Err(image_not_found(key))
    }

    async fn list_images(&self) -> Result<Vec<StoredImage>> {
        let mut images: Vec<StoredImage> = self.tables.read().images.values().cloned().collect();
        images.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(images)
    }

    async fn list_images_by_parent(&self, document_key: &str) -> Result<Vec<StoredImage>> {
        Ok(self.tables.read().images_of(document_key))
    }

    async fn delete_image(&self, key: &str) -> Result<()> {
        let image = self
            .tables
            .read()
            .images
            .get(key)
            .cloned()
            .ok_or_else(|| image_not_found(key))?;

        let failures = remove_files(&self.fs, &[image.path.as_str()]).await;
        self.tables.write().images.remove(key);

        check_removal(failures)
    }

    async fn delete_images_by_parent(&self, document_key: &str) -> Result<usize> {
        let images = self.tables.read().images_of(document_key);
        let failures = remove_files(&self.fs, &image_paths(&images)).await;

        let removed = {
            let mut tables = self.tables.write();
            images
                .iter()
                .filter(|image| tables.images.remove(&image.key).is_some())
                .count()
        };

        check_removal(failures)?;
        Ok(removed)
    }

    async fn set_status(
        &self,
        table: StatusTable,
        key: &str,
        status: ProcessingStatus,
    ) -> Result<()> {
        self.tables
            .write()
            .status_mut(table)
            .insert(key.to_string(), status);
        Ok(())
    }

    async fn get_status(&self, table: StatusTable, key: &str) -> Result<ProcessingStatus> {
        self.tables
            .read()
            .status(table)
            .get(key)
            .cloned()
            .ok_or_else(|| status_not_found(table, key))
    }

    async fn update_status(
        &self,
        table: StatusTable,
        key: &str,
        update: StatusUpdate,
    ) -> Result<ProcessingStatus> {
        let mut tables = self.tables.write();
        let status = tables
            .status_mut(table)
            .get_mut(key)
            .ok_or_else(|| status_not_found(table, key))?;

        status.merge(update);
        Ok(status.clone())
    }
}
