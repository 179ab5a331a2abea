//! PDF uploader.
//!
//! Validates a file locally (type and size) before any network call,
//! then performs exactly one multipart upload. On success the returned
//! [`UploadedFile`] is in the `processing` state with 100% progress and
//! carries the backend's URL, path, and file id.
//!
//! Failures are split so callers can tell "never reached the server"
//! ([`UploadError::Transport`]) from "server responded unexpectedly"
//! ([`UploadError::Protocol`]). Nothing is retried.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use paperscope_core::models::{FileStatus, UploadedFile};
use paperscope_core::store::FileStore;

use crate::api::{ApiClient, ApiError};
use crate::config::{Config, UploadConfig};

/// Rejected before any network call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("only {allowed} files are allowed (got '{actual}')")]
    UnsupportedType { allowed: String, actual: String },

    #[error("file size must be at most {} MB (got {size} bytes)", .limit / (1024 * 1024))]
    TooLarge { size: u64, limit: u64 },

    #[error("file is empty")]
    Empty,

    #[error("cannot build upload request: {0}")]
    Unsendable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("upload transport error: {0}")]
    Transport(ApiError),

    #[error("upload protocol error: {0}")]
    Protocol(ApiError),
}

impl From<ApiError> for UploadError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Transport { .. } => UploadError::Transport(err),
            ApiError::Protocol { .. } => UploadError::Protocol(err),
            ApiError::InvalidRequest { message, .. } => {
                UploadError::Validation(ValidationError::Unsendable(message))
            }
        }
    }
}

/// A file ready to be uploaded.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Read a file from disk, deriving its MIME type from the extension.
    ///
    /// The size limit is checked against file metadata before the body is
    /// read, so oversized files are never loaded.
    pub fn from_path(path: &Path, limits: &UploadConfig) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = mime_for_path(path).to_string();
        let size = std::fs::metadata(path)
            .with_context(|| format!("Failed to stat {}", path.display()))?
            .len();
        validate(&mime_type, size, limits)?;

        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Self {
            name,
            mime_type,
            bytes,
        })
    }
}

fn mime_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Check type and size against the configured limits.
pub fn validate(mime_type: &str, size: u64, limits: &UploadConfig) -> Result<(), ValidationError> {
    if mime_type != limits.allowed_mime {
        return Err(ValidationError::UnsupportedType {
            allowed: limits.allowed_mime.clone(),
            actual: mime_type.to_string(),
        });
    }
    if size == 0 {
        return Err(ValidationError::Empty);
    }
    if size > limits.max_bytes {
        return Err(ValidationError::TooLarge {
            size,
            limit: limits.max_bytes,
        });
    }
    Ok(())
}

/// Sends validated files to `POST /upload/`.
pub struct Uploader {
    client: ApiClient,
    limits: UploadConfig,
}

impl Uploader {
    pub fn new(client: ApiClient, limits: UploadConfig) -> Self {
        Self { client, limits }
    }

    /// Validate and upload `file` into `project_id`.
    pub async fn upload(&self, file: FileUpload, project_id: &str) -> Result<UploadedFile, UploadError> {
        validate(&file.mime_type, file.size(), &self.limits)?;

        let mut record = UploadedFile::new_upload(project_id, &file.name, file.size(), &file.mime_type);
        info!(name = %file.name, size = file.size(), project_id, "uploading");

        let response = match self
            .client
            .upload_pdf(&file.name, &file.mime_type, file.bytes)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(name = %record.name, error = %e, "upload failed");
                return Err(e.into());
            }
        };

        record.status = FileStatus::Processing;
        record.advance_progress(100);
        record.url = Some(response.public_url);
        record.file_path = Some(response.file_path);
        record.file_id = Some(response.file_id);
        info!(name = %record.name, file_id = record.backend_id(), "upload complete");
        Ok(record)
    }
}

/// CLI entry point for `psc upload`. Records the file in the store.
pub async fn run_upload(config: &Config, store: &dyn FileStore, path: &Path, project_id: &str) -> Result<()> {
    let file = FileUpload::from_path(path, &config.upload)?;
    let uploader = Uploader::new(ApiClient::new(&config.backend)?, config.upload.clone());

    let mut pending = UploadedFile::new_upload(project_id, &file.name, file.size(), &file.mime_type);
    store.put(&pending).await?;

    match uploader.upload(file, project_id).await {
        Ok(uploaded) => {
            let record = UploadedFile {
                id: pending.id.clone(),
                uploaded_at: pending.uploaded_at,
                ..uploaded
            };
            store.put(&record).await?;
            println!("uploaded {}", record.name);
            println!("  id:       {}", record.id);
            println!("  file_id:  {}", record.backend_id());
            if let Some(url) = &record.url {
                println!("  url:      {}", url);
            }
            println!("  status:   {}", record.status);
            Ok(())
        }
        Err(e) => {
            pending.status = FileStatus::Failed;
            store.put(&pending).await?;
            Err(e.into())
        }
    }
}
