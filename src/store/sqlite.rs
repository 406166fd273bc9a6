//! SQLite metadata store
//!
//! `images.document_key` is a foreign key with `ON DELETE CASCADE`; the two
//! status tables are keyed by document key without a constraint (a run may
//! record its status before the document is loaded) and are cleared in the
//! same transaction as the document row.

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::{
    check_removal, document_not_found, image_not_found, image_paths, remove_files, status_not_found,
    MetadataStore, NewDocument, NewImage, ProcessingStatus, StatusTable, StatusUpdate,
    StoredDocument, StoredImage,
};
use crate::error::{AppError, Result};
use crate::storage::FileSystem;

const DOCUMENT_COLUMNS: &str = "key, name, disk_name, path, size, mime_type, created_at";

const IMAGE_COLUMNS: &str = "key, document_key, name, disk_name, path, size, mime_type, \
                             page_number, format, width, height, created_at";

const STATUS_COLUMNS: &str = "status, progress, error, created_at, completed_at";

/// `MetadataStore` persisted in SQLite
pub struct SqliteStore {
    pool: SqlitePool,
    fs: FileSystem,
}

impl SqliteStore {
    /// Wrap a pool whose schema has been initialized
    pub fn new(pool: SqlitePool, fs: FileSystem) -> Self {
        Self { pool, fs }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn find_document(&self, key: &str) -> Result<Option<StoredDocument>> {
        let document = sqlx::query_as::<_, StoredDocument>(&format!(
            "SELECT {} FROM documents WHERE key = ?",
            DOCUMENT_COLUMNS
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(document)
    }

    async fn find_image(&self, key: &str) -> Result<Option<StoredImage>> {
        let image = sqlx::query_as::<_, StoredImage>(&format!(
            "SELECT {} FROM images WHERE key = ?",
            IMAGE_COLUMNS
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(image)
    }

    /// Delete a document row, its status rows and (by cascade) its image rows
    async fn remove_document_rows(&self, key: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for table in [StatusTable::Truncation, StatusTable::ImageConversion] {
            sqlx::query(&format!(
                "DELETE FROM {} WHERE document_key = ?",
                table.table_name()
            ))
            .bind(key)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM documents WHERE key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn remove_image_row(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM images WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// SQLite extended result codes for constraint violations
const SQLITE_CONSTRAINT_FOREIGNKEY: &str = "787";
const SQLITE_CONSTRAINT_PRIMARYKEY: &str = "1555";
const SQLITE_CONSTRAINT_UNIQUE: &str = "2067";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.is_unique_violation()
                || matches!(
                    db.code().as_deref(),
                    Some(SQLITE_CONSTRAINT_PRIMARYKEY) | Some(SQLITE_CONSTRAINT_UNIQUE)
                )
        }
        _ => false,
    }
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.is_foreign_key_violation()
                || db.code().as_deref() == Some(SQLITE_CONSTRAINT_FOREIGNKEY)
        }
        _ => false,
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn store_document(&self, document: NewDocument) -> Result<StoredDocument> {
        let record = document.into_record();

        sqlx::query(
            r#"
            INSERT INTO documents (key, name, disk_name, path, size, mime_type, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.key)
        .bind(&record.name)
        .bind(&record.disk_name)
        .bind(&record.path)
        .bind(record.size)
        .bind(&record.mime_type)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Document {} already exists", record.key))
            } else {
                AppError::Database(e)
            }
        })?;

        Ok(record)
    }

    async fn get_document(&self, key: &str) -> Result<StoredDocument> {
        let document = self
            .find_document(key)
            .await?
            .ok_or_else(|| document_not_found(key))?;

        if self.fs.exists(&document.path).await {
            return Ok(document);
        }

        tracing::warn!(document_key = %key, path = %document.path, "Document file missing, removing stale record");
        let images = self.list_images_by_parent(key).await?;
        remove_files(&self.fs, &image_paths(&images)).await;
        self.remove_document_rows(key).await?;

        Err(document_not_found(key))
    }

    async fn list_documents(&self) -> Result<Vec<StoredDocument>> {
        let documents = sqlx::query_as::<_, StoredDocument>(&format!(
            "SELECT {} FROM documents ORDER BY created_at ASC",
            DOCUMENT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(documents)
    }

    async fn delete_document(&self, key: &str) -> Result<()> {
        let document = self
            .find_document(key)
            .await?
            .ok_or_else(|| document_not_found(key))?;

        let images = self.list_images_by_parent(key).await?;

        let mut failures = remove_files(&self.fs, &image_paths(&images)).await;
        failures.extend(remove_files(&self.fs, &[document.path.as_str()]).await);

        self.remove_document_rows(key).await?;

        tracing::info!(
            document_key = %key,
            images = images.len(),
            "Deleted document"
        );

        check_removal(failures)
    }

    async fn store_image(&self, image: NewImage) -> Result<StoredImage> {
        let record = image.into_record();

        sqlx::query(
            r#"
            INSERT INTO images (key, document_key, name, disk_name, path, size, mime_type,
                                page_number, format, width, height, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.key)
        .bind(&record.document_key)
        .bind(&record.name)
        .bind(&record.disk_name)
        .bind(&record.path)
        .bind(record.size)
        .bind(&record.mime_type)
        .bind(record.page_number)
        .bind(record.format)
        .bind(record.width)
        .bind(record.height)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                document_not_found(&record.document_key)
            } else if is_unique_violation(&e) {
                AppError::Conflict(format!("Image {} already exists", record.key))
            } else {
                AppError::Database(e)
            }
        })?;

        Ok(record)
    }

    async fn get_image(&self, key: &str) -> Result<StoredImage> {
        let image = self
            .find_image(key)
            .await?
            .ok_or_else(|| image_not_found(key))?;

        if self.fs.exists(&image.path).await {
            return Ok(image);
        }

        tracing::warn!(image_key = %key, path = %image.path, "Image file missing, removing stale record");
        self.remove_image_row(key).await?;
        Err(image_not_found(key))
    }

    async fn list_images(&self) -> Result<Vec<StoredImage>> {
        let images = sqlx::query_as::<_, StoredImage>(&format!(
            "SELECT {} FROM images ORDER BY created_at ASC",
            IMAGE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(images)
    }

    async fn list_images_by_parent(&self, document_key: &str) -> Result<Vec<StoredImage>> {
        let images = sqlx::query_as::<_, StoredImage>(&format!(
            "SELECT {} FROM images WHERE document_key = ? ORDER BY page_number ASC, created_at ASC",
            IMAGE_COLUMNS
        ))
        .bind(document_key)
        .fetch_all(&self.pool)
        .await?;

        Ok(images)
    }

    async fn delete_image(&self, key: &str) -> Result<()> {
        let image = self
            .find_image(key)
            .await?
            .ok_or_else(|| image_not_found(key))?;

        let failures = remove_files(&self.fs, &[image.path.as_str()]).await;
        self.remove_image_row(key).await?;

        check_removal(failures)
    }

    async fn delete_images_by_parent(&self, document_key: &str) -> Result<usize> {
        let images = self.list_images_by_parent(document_key).await?;
        let failures = remove_files(&self.fs, &image_paths(&images)).await;

        let mut tx = self.pool.begin().await?;
        let mut removed = 0;
        for image in &images {
            let result = sqlx::query("DELETE FROM images WHERE key = ?")
                .bind(&image.key)
                .execute(&mut *tx)
                .await?;
            removed += result.rows_affected() as usize;
        }
        tx.commit().await?;

        check_removal(failures)?;
        Ok(removed)
    }

    async fn set_status(
        &self,
        table: StatusTable,
        key: &str,
        status: ProcessingStatus,
    ) -> Result<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {} (document_key, status, progress, error, created_at, completed_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(document_key) DO UPDATE SET
                status = excluded.status,
                progress = excluded.progress,
                error = excluded.error,
                created_at = excluded.created_at,
                completed_at = excluded.completed_at
            "#,
            table.table_name()
        ))
        .bind(key)
        .bind(status.status)
        .bind(status.progress)
        .bind(&status.error)
        .bind(status.created_at)
        .bind(status.completed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_status(&self, table: StatusTable, key: &str) -> Result<ProcessingStatus> {
        sqlx::query_as::<_, ProcessingStatus>(&format!(
            "SELECT {} FROM {} WHERE document_key = ?",
            STATUS_COLUMNS,
            table.table_name()
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| status_not_found(table, key))
    }

    async fn update_status(
        &self,
        table: StatusTable,
        key: &str,
        update: StatusUpdate,
    ) -> Result<ProcessingStatus> {
        // Merged in a single statement: a read-then-write transaction would
        // fail with SQLITE_BUSY_SNAPSHOT when another writer commits first
        sqlx::query_as::<_, ProcessingStatus>(&format!(
            r#"
            UPDATE {}
            SET status = COALESCE(?, status),
                progress = COALESCE(?, progress),
                error = COALESCE(?, error),
                completed_at = COALESCE(?, completed_at)
            WHERE document_key = ?
            RETURNING {}
            "#,
            table.table_name(),
            STATUS_COLUMNS
        ))
        .bind(update.status)
        .bind(update.progress)
        .bind(update.error)
        .bind(update.completed_at)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| status_not_found(table, key))
    }
}
