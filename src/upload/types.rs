//! Upload progress types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upload session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadState {
    /// Slot reserved, no bytes received yet
    Pending,
    /// Bytes are streaming
    Uploading,
    /// File stored
    Completed,
    /// Streaming or storing failed
    Error,
}

/// Byte-level progress of one upload session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub id: String,
    pub state: UploadState,
    pub total: u64,
    pub loaded: u64,
    pub percentage: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Time of the most recent state transition
    pub updated_at: DateTime<Utc>,
}

impl UploadProgress {
    pub(crate) fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            state: UploadState::Pending,
            total: 0,
            loaded: 0,
            percentage: 0,
            error: None,
            updated_at: Utc::now(),
        }
    }

    /// Recompute `percentage` from `loaded` and `total`
    pub(crate) fn recompute(&mut self) {
        self.percentage = percentage(self.loaded, self.total);
    }
}

/// `loaded / total` as a rounded percentage, 0 when the total is unknown
pub fn percentage(loaded: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (loaded as f64 / total as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}
