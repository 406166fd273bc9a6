//! Derivation pipelines
//!
//! Both pipelines take a stored document and a page selection, report their
//! progress through a status table keyed by the source document, and always
//! leave that row in a terminal state when they return.

mod convert;
mod selection;
mod truncate;

pub use convert::{ConversionPipeline, ConversionRequest, ConversionResult};
pub use selection::{PageSelection, RangeRequest, SelectionRequest};
pub use truncate::{TruncationPipeline, TruncationResult};

use crate::error::AppError;
use crate::store::{MetadataStore, StatusTable, StatusUpdate};

/// Progress after the selection has been resolved against the document
pub const PROGRESS_RESOLVED: u8 = 25;

/// Progress after the pages have been transformed
pub const PROGRESS_TRANSFORMED: u8 = 75;

/// Move the status row to `error`, keeping the original failure for the caller
async fn record_failure(
    store: &dyn MetadataStore,
    table: StatusTable,
    document_key: &str,
    err: &AppError,
) {
    tracing::warn!(
        document_key = %document_key,
        table = table.table_name(),
        error = %err,
        "Pipeline run failed"
    );

    if let Err(e) = store
        .update_status(table, document_key, StatusUpdate::failed(err.to_string()))
        .await
    {
        tracing::error!(
            document_key = %document_key,
            error = %e,
            "Failed to record pipeline failure"
        );
    }
}
