//! PDF capability errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdfError {
    /// The bytes are not a readable PDF
    #[error("Invalid PDF document: {0}")]
    InvalidDocument(String),

    /// A page index outside the document was requested
    #[error("Page index {index} out of range (document has {page_count} pages)")]
    PageOutOfRange { index: usize, page_count: usize },

    /// Building or serializing the derived document failed
    #[error("Failed to write PDF: {0}")]
    WriteError(String),

    /// The rendering process failed
    #[error("Render error: {0}")]
    RenderError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Blocking task panicked or was cancelled
    #[error("Task join error: {0}")]
    Join(String),
}

pub type PdfResult<T> = std::result::Result<T, PdfError>;

impl From<tokio::task::JoinError> for PdfError {
    fn from(err: tokio::task::JoinError) -> Self {
        PdfError::Join(err.to_string())
    }
}
