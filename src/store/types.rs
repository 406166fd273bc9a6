//! Metadata store records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pdf::ImageFormat;

/// An uploaded or derived PDF
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StoredDocument {
    pub key: String,
    /// Original display name
    pub name: String,
    /// Sanitized on-disk file name
    pub disk_name: String,
    /// Absolute path of the file
    pub path: String,
    pub size: i64,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when registering a document
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub key: String,
    pub name: String,
    pub disk_name: String,
    pub path: String,
    pub size: i64,
    pub mime_type: String,
}

impl NewDocument {
    pub(crate) fn into_record(self) -> StoredDocument {
        StoredDocument {
            key: self.key,
            name: self.name,
            disk_name: self.disk_name,
            path: self.path,
            size: self.size,
            mime_type: self.mime_type,
            created_at: Utc::now(),
        }
    }
}

/// A rendered page image derived from a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StoredImage {
    pub key: String,
    /// Key of the document the page was rendered from
    pub document_key: String,
    pub name: String,
    pub disk_name: String,
    pub path: String,
    pub size: i64,
    pub mime_type: String,
    /// 1-based page number in the parent document
    pub page_number: u32,
    pub format: ImageFormat,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when registering an image
#[derive(Debug, Clone)]
pub struct NewImage {
    pub key: String,
    pub document_key: String,
    pub name: String,
    pub disk_name: String,
    pub path: String,
    pub size: i64,
    pub mime_type: String,
    pub page_number: u32,
    pub format: ImageFormat,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl NewImage {
    pub(crate) fn into_record(self) -> StoredImage {
        StoredImage {
            key: self.key,
            document_key: self.document_key,
            name: self.name,
            disk_name: self.disk_name,
            path: self.path,
            size: self.size,
            mime_type: self.mime_type,
            page_number: self.page_number,
            format: self.format,
            width: self.width,
            height: self.height,
            created_at: Utc::now(),
        }
    }
}

/// Which pipeline a status row belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusTable {
    Truncation,
    ImageConversion,
}

impl StatusTable {
    pub fn table_name(self) -> &'static str {
        match self {
            StatusTable::Truncation => "truncation_status",
            StatusTable::ImageConversion => "image_status",
        }
    }
}

/// Processing state of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ProcessingState {
    Pending,
    Processing,
    Completed,
    Error,
}

impl ProcessingState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessingState::Completed | ProcessingState::Error)
    }
}

/// Current or last state of a pipeline run for one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStatus {
    pub status: ProcessingState,
    pub progress: u8,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProcessingStatus {
    /// A fresh status row in the given state with zero progress
    pub fn new(status: ProcessingState) -> Self {
        Self {
            status,
            progress: 0,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Apply the fields present in `update`, keeping the rest
    pub fn merge(&mut self, update: StatusUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(progress) = update.progress {
            self.progress = progress;
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }
        if let Some(completed_at) = update.completed_at {
            self.completed_at = Some(completed_at);
        }
    }
}

/// Partial status update; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusUpdate {
    pub status: Option<ProcessingState>,
    pub progress: Option<u8>,
    pub error: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StatusUpdate {
    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Self::default()
        }
    }

    pub fn completed() -> Self {
        Self {
            status: Some(ProcessingState::Completed),
            progress: Some(100),
            completed_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(ProcessingState::Error),
            error: Some(message.into()),
            completed_at: Some(Utc::now()),
            ..Self::default()
        }
    }
}
