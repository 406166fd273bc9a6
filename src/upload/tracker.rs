//! Upload Progress Tracker
//!
//! In-memory registry of upload sessions:
//! - every state transition re-arms a one-shot expiry timer
//! - progress updates for unknown or idle sessions are dropped silently
//! - pending timers are aborted when the tracker is dropped

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::types::{UploadProgress, UploadState};
use crate::config::DEFAULT_UPLOAD_PROGRESS_TTL_SECS;
use crate::error::{AppError, Result};

/// Tracks byte-level progress of uploads
#[derive(Clone)]
pub struct UploadTracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    sessions: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
}

struct Entry {
    progress: UploadProgress,
    /// Bumped on every transition so a stale timer never evicts a fresh session
    generation: u64,
    expiry: JoinHandle<()>,
}

impl Drop for TrackerInner {
    fn drop(&mut self) {
        for entry in self.sessions.get_mut().values() {
            entry.expiry.abort();
        }
    }
}

impl UploadTracker {
    /// Create a tracker with the default one hour idle window
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(DEFAULT_UPLOAD_PROGRESS_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                sessions: Mutex::new(HashMap::new()),
                ttl,
            }),
        }
    }

    // ========================================================================
    // Session Lifecycle
    // ========================================================================

    /// Reserve a new upload session in `pending` state
    pub fn initiate(&self) -> String {
        let progress = UploadProgress::new();
        let id = progress.id.clone();

        let expiry = self.schedule_expiry(id.clone(), 0);
        self.inner.sessions.lock().insert(
            id.clone(),
            Entry {
                progress,
                generation: 0,
                expiry,
            },
        );

        tracing::debug!(upload_id = %id, "Upload session initiated");
        id
    }

    /// Begin streaming. Fails with `NotFound` when the session is unknown or expired.
    pub fn start(&self, id: &str, total: u64) -> Result<()> {
        let found = self.transition(id, |progress| {
            progress.state = UploadState::Uploading;
            progress.total = total;
            progress.loaded = 0;
            progress.error = None;
            progress.recompute();
        });

        if !found {
            return Err(AppError::NotFound(format!(
                "Upload session {} not found; initiate a new upload",
                id
            )));
        }

        tracing::debug!(upload_id = %id, total = total, "Upload started");
        Ok(())
    }

    /// Record bytes received so far. Ignored unless the session is `uploading`.
    pub fn update(&self, id: &str, loaded: u64) {
        let mut sessions = self.inner.sessions.lock();
        if let Some(entry) = sessions.get_mut(id) {
            if entry.progress.state == UploadState::Uploading {
                entry.progress.loaded = loaded;
                entry.progress.recompute();
            }
        }
    }

    /// Mark the upload as stored
    pub fn complete(&self, id: &str) {
        let found = self.transition(id, |progress| {
            progress.state = UploadState::Completed;
            progress.loaded = progress.total;
            progress.percentage = 100;
        });

        if found {
            tracing::debug!(upload_id = %id, "Upload completed");
        }
    }

    /// Mark the upload as failed
    pub fn fail(&self, id: &str, message: impl Into<String>) {
        let message = message.into();
        let found = self.transition(id, |progress| {
            progress.state = UploadState::Error;
            progress.error = Some(message.clone());
        });

        if found {
            tracing::debug!(upload_id = %id, error = %message, "Upload failed");
        }
    }

    pub fn get(&self, id: &str) -> Option<UploadProgress> {
        self.inner
            .sessions
            .lock()
            .get(id)
            .map(|entry| entry.progress.clone())
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.lock().len()
    }

    // ========================================================================
    // Expiry
    // ========================================================================

    /// Apply a state change and re-arm the expiry timer. Returns false if unknown.
    fn transition(&self, id: &str, apply: impl FnOnce(&mut UploadProgress)) -> bool {
        let mut sessions = self.inner.sessions.lock();
        let Some(entry) = sessions.get_mut(id) else {
            return false;
        };

        apply(&mut entry.progress);
        entry.progress.updated_at = Utc::now();

        entry.generation += 1;
        entry.expiry.abort();
        entry.expiry = self.schedule_expiry(id.to_string(), entry.generation);
        true
    }

    fn schedule_expiry(&self, id: String, generation: u64) -> JoinHandle<()> {
        let inner: Weak<TrackerInner> = Arc::downgrade(&self.inner);
        let ttl = self.inner.ttl;

        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;

            let Some(inner) = inner.upgrade() else {
                return;
            };
            let mut sessions = inner.sessions.lock();
            if sessions.get(&id).map(|e| e.generation) == Some(generation) {
                sessions.remove(&id);
                tracing::debug!(upload_id = %id, "Expired idle upload session");
            }
        })
    }
}

impl Default for UploadTracker {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
