//! Upload progress tracking
//!
//! Clients reserve an upload id, stream the file on a separate request and
//! poll the id for byte-level progress. Sessions live in memory only and
//! expire after an idle window measured from their last state transition.

pub mod tracker;
pub mod types;

pub use tracker::UploadTracker;
pub use types::*;
