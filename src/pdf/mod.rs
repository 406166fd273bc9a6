//! PDF capabilities
//!
//! Two seams the pipelines consume without knowing the engine behind them:
//!
//! - `PageExtractor`: count pages and copy a subset of pages into a new document
//! - `PageRasterizer`: render a single page to an image file
//!
//! Page copying is done in-process with `lopdf`; rasterizing shells out to
//! poppler's `pdftoppm`.

mod error;
mod extract;
mod render;
mod types;

pub use error::{PdfError, PdfResult};
pub use extract::{LopdfExtractor, PageExtractor};
pub use render::{
    scale_to_dpi, with_extension, PageRasterizer, PdftoppmRasterizer, MAX_SCALE, MIN_SCALE,
};
pub use types::ImageFormat;

#[cfg(test)]
pub(crate) mod fixtures;
