//! Record-store abstraction for uploaded files.
//!
//! The [`FileStore`] trait is the injected repository the uploader and
//! job poller write through, replacing ambient global storage. Backends
//! must be `Send + Sync` to work with async runtimes.
//!
//! # Invariants enforced on `put`
//!
//! - Status only moves along `uploading → processing → completed | failed`
//!   (`uploading → failed` is allowed; re-putting the same status is a no-op
//!   transition).
//! - Progress never decreases while the stored record is non-terminal.

pub mod memory;

use async_trait::async_trait;

use crate::models::{FileStatus, UploadedFile};

/// Errors raised by record stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid status transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: FileStatus,
        to: FileStatus,
    },

    #[error("progress for {id} cannot decrease ({from}% -> {to}%)")]
    ProgressRegression { id: String, from: u8, to: u8 },

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Check an update against the currently stored record.
pub fn check_update(existing: Option<&UploadedFile>, next: &UploadedFile) -> Result<(), StoreError> {
    let Some(current) = existing else {
        return Ok(());
    };
    if !current.status.can_transition_to(next.status) {
        return Err(StoreError::InvalidTransition {
            id: next.id.clone(),
            from: current.status,
            to: next.status,
        });
    }
    if !current.status.is_terminal() && next.progress < current.progress {
        return Err(StoreError::ProgressRegression {
            id: next.id.clone(),
            from: current.progress,
            to: next.progress,
        });
    }
    Ok(())
}

/// Abstract storage backend for [`UploadedFile`] records.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get`](FileStore::get) | Fetch one record by id |
/// | [`put`](FileStore::put) | Insert or update, enforcing invariants |
/// | [`delete`](FileStore::delete) | Remove one record |
/// | [`list_by_project`](FileStore::list_by_project) | All records of a project, oldest first |
/// | [`delete_project`](FileStore::delete_project) | Remove every record owned by a project |
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<UploadedFile>, StoreError>;

    async fn put(&self, file: &UploadedFile) -> Result<(), StoreError>;

    /// Returns whether a record was removed.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    async fn list_by_project(&self, project_id: &str) -> Result<Vec<UploadedFile>, StoreError>;

    /// Returns the number of records removed.
    async fn delete_project(&self, project_id: &str) -> Result<usize, StoreError>;
}
