//! Application state management

use std::sync::Arc;

use crate::config::{Config, MetadataBackend};
use crate::db;
use crate::error::Result;
use crate::pdf::{LopdfExtractor, PageExtractor, PageRasterizer, PdftoppmRasterizer};
use crate::pipeline::{ConversionPipeline, TruncationPipeline};
use crate::storage::FileSystem;
use crate::store::{MemoryStore, MetadataStore, SqliteStore};
use crate::upload::UploadTracker;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    fs: FileSystem,
    store: Arc<dyn MetadataStore>,
    uploads: UploadTracker,
    truncation: TruncationPipeline,
    conversion: ConversionPipeline,
}

impl AppState {
    /// Create the state from configuration.
    ///
    /// Prepares the storage layout and opens the selected metadata backend.
    pub async fn new(config: Config) -> Result<Self> {
        let fs = FileSystem::new(&config.storage.root);
        fs.init().await?;

        let store: Arc<dyn MetadataStore> = match config.database.backend {
            MetadataBackend::Sqlite => {
                let pool = db::create_pool(&config.database.url).await?;
                tracing::info!("Database initialized at {}", config.database.url);
                Arc::new(SqliteStore::new(pool, fs.clone()))
            }
            MetadataBackend::Memory => {
                tracing::warn!("Using in-memory metadata store, records are lost on restart");
                Arc::new(MemoryStore::new(fs.clone()))
            }
        };

        let rasterizer = PdftoppmRasterizer::new(config.render.pdftoppm.clone());
        if !rasterizer.is_available().await {
            tracing::warn!(
                program = %config.render.pdftoppm,
                "pdftoppm not found, image conversion will fail"
            );
        }

        let uploads = UploadTracker::with_ttl(config.upload.progress_ttl());

        Ok(Self::from_parts(
            config,
            fs,
            store,
            uploads,
            Arc::new(LopdfExtractor::new()),
            Arc::new(rasterizer),
        ))
    }

    /// Assemble the state from already constructed components
    pub fn from_parts(
        config: Config,
        fs: FileSystem,
        store: Arc<dyn MetadataStore>,
        uploads: UploadTracker,
        extractor: Arc<dyn PageExtractor>,
        rasterizer: Arc<dyn PageRasterizer>,
    ) -> Self {
        let truncation = TruncationPipeline::new(store.clone(), fs.clone(), extractor.clone());
        let conversion = ConversionPipeline::new(store.clone(), fs.clone(), extractor, rasterizer);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                fs,
                store,
                uploads,
                truncation,
                conversion,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the filesystem gateway
    pub fn fs(&self) -> &FileSystem {
        &self.inner.fs
    }

    /// Get the metadata store
    pub fn store(&self) -> &dyn MetadataStore {
        self.inner.store.as_ref()
    }

    /// Get the upload progress tracker
    pub fn uploads(&self) -> &UploadTracker {
        &self.inner.uploads
    }

    pub fn truncation(&self) -> &TruncationPipeline {
        &self.inner.truncation
    }

    pub fn conversion(&self) -> &ConversionPipeline {
        &self.inner.conversion
    }
}
