//! Filesystem gateway
//!
//! Thin async wrapper over `tokio::fs` with the semantics the metadata
//! store relies on: idempotent deletes and size lookups.

use std::io;
use std::path::{Path, PathBuf};

const DOCUMENTS_DIR: &str = "documents";
const IMAGES_DIR: &str = "images";

/// Filesystem gateway rooted at the storage directory
#[derive(Debug, Clone)]
pub struct FileSystem {
    root: PathBuf,
}

impl FileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the storage root and its sub-directories
    pub async fn init(&self) -> io::Result<()> {
        self.ensure_dir(&self.documents_dir()).await?;
        self.ensure_dir(&self.images_dir()).await?;
        Ok(())
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.root.join(DOCUMENTS_DIR)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join(IMAGES_DIR)
    }

    /// Absolute path for a document's on-disk name
    pub fn document_path(&self, disk_name: &str) -> PathBuf {
        absolute(self.documents_dir().join(disk_name))
    }

    /// Absolute path for an image's on-disk name
    pub fn image_path(&self, disk_name: &str) -> PathBuf {
        absolute(self.images_dir().join(disk_name))
    }

    pub async fn ensure_dir(&self, path: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    pub async fn exists(&self, path: impl AsRef<Path>) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    /// Delete a file. Returns whether a file was removed; absence is not an error.
    pub async fn delete(&self, path: impl AsRef<Path>) -> io::Result<bool> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Size of a file in bytes
    pub async fn stat(&self, path: impl AsRef<Path>) -> io::Result<u64> {
        Ok(tokio::fs::metadata(path).await?.len())
    }

    pub async fn read(&self, path: impl AsRef<Path>) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    pub async fn write(&self, path: impl AsRef<Path>, data: &[u8]) -> io::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            self.ensure_dir(parent).await?;
        }
        tokio::fs::write(path, data).await
    }
}

fn absolute(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path,
    }
}
