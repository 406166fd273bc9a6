//! Document truncation
//!
//! Copies a selection of pages into a new stored document.

use std::sync::Arc;

use serde::Serialize;

use super::selection::{PageSelection, SelectionRequest};
use super::{record_failure, PROGRESS_RESOLVED, PROGRESS_TRANSFORMED};
use crate::error::Result;
use crate::keys::{document_disk_name, generate_key, truncated_name};
use crate::pdf::PageExtractor;
use crate::storage::FileSystem;
use crate::store::{
    MetadataStore, NewDocument, ProcessingState, ProcessingStatus, StatusTable, StatusUpdate,
};

const TABLE: StatusTable = StatusTable::Truncation;

/// Outcome of a successful truncation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TruncationResult {
    pub document_key: String,
    pub result_key: String,
}

/// Truncation pipeline
#[derive(Clone)]
pub struct TruncationPipeline {
    store: Arc<dyn MetadataStore>,
    fs: FileSystem,
    extractor: Arc<dyn PageExtractor>,
}

impl TruncationPipeline {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        fs: FileSystem,
        extractor: Arc<dyn PageExtractor>,
    ) -> Self {
        Self {
            store,
            fs,
            extractor,
        }
    }

    /// Build a new document from the selected pages of `document_key`.
    ///
    /// A malformed request is rejected before the status row is touched.
    pub async fn run(
        &self,
        document_key: &str,
        request: &SelectionRequest,
    ) -> Result<TruncationResult> {
        let selection = request.selection()?;

        self.store
            .set_status(
                TABLE,
                document_key,
                ProcessingStatus::new(ProcessingState::Processing),
            )
            .await?;

        match self.execute(document_key, &selection).await {
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
    ) -> Result<TruncationResult> {
        let source = self.store.get_document(document_key).await?;
        let data: Arc<[u8]> = self.fs.read(&source.path).await?.into();

        let page_count = self.extractor.page_count(data.clone()).await?;
        let indices = selection.resolve(page_count)?;
        self.advance(document_key, PROGRESS_RESOLVED).await?;

        let pages = indices.len();
        let output = self.extractor.extract_pages(data, indices).await?;
        self.advance(document_key, PROGRESS_TRANSFORMED).await?;

        let result_key = generate_key();
        let name = truncated_name(&source.name);
        let disk_name = document_disk_name(&result_key, &name);
        let path = self.fs.document_path(&disk_name);

        self.fs.write(&path, &output).await?;
        let size = self.fs.stat(&path).await?;

        let stored = self
            .store
            .store_document(NewDocument {
                key: result_key.clone(),
                name,
                disk_name,
                path: path.to_string_lossy().to_string(),
                size: size as i64,
                mime_type: source.mime_type.clone(),
            })
            .await;

        if let Err(e) = stored {
            if let Err(cleanup) = self.fs.delete(&path).await {
                tracing::warn!(path = %path.display(), error = %cleanup, "Failed to remove unregistered output");
            }
            return Err(e);
        }

        self.store
            .update_status(TABLE, document_key, StatusUpdate::completed())
            .await?;

        tracing::info!(
            document_key = %document_key,
            result_key = %result_key,
            pages,
            size,
            "Truncated document"
        );

        Ok(TruncationResult {
            document_key: document_key.to_string(),
            result_key,
        })
    }

    async fn advance(&self, document_key: &str, progress: u8) -> Result<()> {
        self.store
            .update_status(TABLE, document_key, StatusUpdate::progress(progress))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::error::AppError;
    use crate::pdf::fixtures::{page_widths, sample_pdf};
    use crate::pdf::LopdfExtractor;
    use crate::store::{MemoryStore, SqliteStore, StoredDocument};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        fs: FileSystem,
        store: Arc<dyn MetadataStore>,
        pipeline: TruncationPipeline,
    }

    fn build(dir: TempDir, fs: FileSystem, store: Arc<dyn MetadataStore>) -> Fixture {
        let pipeline =
            TruncationPipeline::new(store.clone(), fs.clone(), Arc::new(LopdfExtractor::new()));
        Fixture {
            _dir: dir,
            fs,
            store,
            pipeline,
        }
    }

    async fn memory_fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let fs = FileSystem::new(dir.path());
        fs.init().await.unwrap();
        let store: Arc<dyn MetadataStore> = Arc::new(MemoryStore::new(fs.clone()));
        build(dir, fs, store)
    }

    async fn sqlite_fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let fs = FileSystem::new(dir.path().join("files"));
        fs.init().await.unwrap();
        let pool = db::create_pool_at(&dir.path().join("folio.db")).await.unwrap();
        let store: Arc<dyn MetadataStore> = Arc::new(SqliteStore::new(pool, fs.clone()));
        build(dir, fs, store)
    }

    async fn upload(fixture: &Fixture, pages: usize) -> StoredDocument {
        let key = generate_key();
        let disk_name = document_disk_name(&key, "report.pdf");
        let path = fixture.fs.document_path(&disk_name);
        let data = sample_pdf(pages);
        fixture.fs.write(&path, &data).await.unwrap();

        fixture
            .store
            .store_document(NewDocument {
                key,
                name: "report.pdf".to_string(),
                disk_name,
                path: path.to_string_lossy().to_string(),
                size: data.len() as i64,
                mime_type: "application/pdf".to_string(),
            })
            .await
            .unwrap()
    }

    async fn output_widths(fixture: &Fixture, key: &str) -> Vec<i64> {
        let document = fixture.store.get_document(key).await.unwrap();
        page_widths(&fixture.fs.read(&document.path).await.unwrap())
    }

    #[tokio::test]
    async fn test_explicit_pages_keep_order() {
        let fixture = memory_fixture().await;
        let source = upload(&fixture, 5).await;

        let result = fixture
            .pipeline
            .run(&source.key, &SelectionRequest::pages(vec![4, 1, 4]))
            .await
            .unwrap();

        assert_eq!(result.document_key, source.key);
        assert_eq!(output_widths(&fixture, &result.result_key).await, vec![103, 100, 103]);

        let produced = fixture.store.get_document(&result.result_key).await.unwrap();
        assert_eq!(produced.name, "report_truncated.pdf");
        assert_eq!(produced.size as u64, fixture.fs.stat(&produced.path).await.unwrap());

        let status = fixture.store.get_status(TABLE, &source.key).await.unwrap();
        assert_eq!(status.status, ProcessingState::Completed);
        assert_eq!(status.progress, 100);
        assert!(status.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_range_is_ascending() {
        let fixture = sqlite_fixture().await;
        let source = upload(&fixture, 6).await;

        let result = fixture
            .pipeline
            .run(&source.key, &SelectionRequest::range(2, Some(4)))
            .await
            .unwrap();
        assert_eq!(output_widths(&fixture, &result.result_key).await, vec![101, 102, 103]);

        let open_ended = fixture
            .pipeline
            .run(&source.key, &SelectionRequest::range(5, None))
            .await
            .unwrap();
        assert_eq!(output_widths(&fixture, &open_ended.result_key).await, vec![104, 105]);
    }

    #[tokio::test]
    async fn test_out_of_range_fails_without_output() {
        let fixture = sqlite_fixture().await;
        let source = upload(&fixture, 3).await;

        for request in [
            SelectionRequest::pages(vec![1, 4]),
            SelectionRequest::pages(vec![0]),
            SelectionRequest::range(4, None),
            SelectionRequest::range(1, Some(9)),
        ] {
            let result = fixture.pipeline.run(&source.key, &request).await;
            assert!(matches!(result, Err(AppError::Validation(_))), "{:?}", request);

            let status = fixture.store.get_status(TABLE, &source.key).await.unwrap();
            assert_eq!(status.status, ProcessingState::Error);
            assert!(status.error.is_some());
            assert!(status.completed_at.is_some());
        }

        assert_eq!(fixture.store.list_documents().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bad_shape_leaves_status_untouched() {
        let fixture = memory_fixture().await;
        let source = upload(&fixture, 3).await;

        let both = SelectionRequest {
            pages: Some(vec![1]),
            range: Some(crate::pipeline::RangeRequest { start: 1, end: None }),
        };
        for request in [both, SelectionRequest::default()] {
            let result = fixture.pipeline.run(&source.key, &request).await;
            assert!(matches!(result, Err(AppError::Validation(_))));
        }

        assert!(matches!(
            fixture.store.get_status(TABLE, &source.key).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_document_records_error() {
        let fixture = memory_fixture().await;

        let result = fixture
            .pipeline
            .run("missing", &SelectionRequest::pages(vec![1]))
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let status = fixture.store.get_status(TABLE, "missing").await.unwrap();
        assert_eq!(status.status, ProcessingState::Error);
    }

    #[tokio::test]
    async fn test_rerun_overwrites_terminal_state() {
        let fixture = memory_fixture().await;
        let source = upload(&fixture, 2).await;

        let _ = fixture
            .pipeline
            .run(&source.key, &SelectionRequest::pages(vec![3]))
            .await;
        fixture
            .pipeline
            .run(&source.key, &SelectionRequest::pages(vec![2]))
            .await
            .unwrap();

        let status = fixture.store.get_status(TABLE, &source.key).await.unwrap();
        assert_eq!(status.status, ProcessingState::Completed);
        assert!(status.error.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_runs_all_complete() {
        let fixture = sqlite_fixture().await;
        let mut sources = Vec::new();
        for _ in 0..16 {
            sources.push(upload(&fixture, 3).await);
        }

        let handles: Vec<_> = sources
            .iter()
            .map(|source| {
                let pipeline = fixture.pipeline.clone();
                let key = source.key.clone();
                tokio::spawn(async move {
                    pipeline
                        .run(&key, &SelectionRequest::range(1, Some(2)))
                        .await
                })
            })
            .collect();

        for handle in handles {
            let result = handle.await.unwrap().unwrap();
            assert_eq!(output_widths(&fixture, &result.result_key).await, vec![100, 101]);
        }
        for source in &sources {
            let status = fixture.store.get_status(TABLE, &source.key).await.unwrap();
            assert_eq!(status.status, ProcessingState::Completed);
            assert_eq!(status.progress, 100);
        }
    }
}
