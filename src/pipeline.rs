//! End-to-end analysis: upload → submit → poll → record.
//!
//! [`Pipeline::analyze`] uploads each file in turn. A file that fails
//! validation or upload is reported and skipped; the rest go into a
//! single analysis job. When the job finishes, every file in it is
//! marked `completed` with the result attached, or `failed`.
//!
//! The pipeline carries a liveness token. Once it is cancelled, the
//! poll loop is stopped and no further records are written, even for
//! requests that were already in flight.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use paperscope_core::job::{AnalysisJob, JobStatus};
use paperscope_core::models::{FileStatus, UploadedFile};
use paperscope_core::store::{FileStore, StoreError};

use crate::api::ApiClient;
use crate::config::{Config, UploadConfig};
use crate::jobs::{job_files, print_job, JobSubmitter, SubmitError};
use crate::poller::{wait_terminal, JobPoller};
use crate::upload::{FileUpload, Uploader};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no file could be uploaded")]
    NoFiles,

    #[error("analysis cancelled")]
    Cancelled,

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A file that was left out of the job, and why.
#[derive(Debug, Clone)]
pub struct Rejected {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub job: AnalysisJob,
    pub files: Vec<UploadedFile>,
    pub rejected: Vec<Rejected>,
}

pub struct Pipeline {
    client: ApiClient,
    store: Arc<dyn FileStore>,
    limits: UploadConfig,
    poll_interval: Duration,
    live: CancellationToken,
}

impl Pipeline {
    pub fn new(
        client: ApiClient,
        store: Arc<dyn FileStore>,
        limits: UploadConfig,
        poll_interval: Duration,
    ) -> Self {
        Self {
            client,
            store,
            limits,
            poll_interval,
            live: CancellationToken::new(),
        }
    }

    /// Cancelling this token tears the pipeline down.
    pub fn liveness(&self) -> CancellationToken {
        self.live.clone()
    }

    /// Write `file` unless the pipeline has been torn down.
    async fn record(&self, file: &UploadedFile) -> Result<(), PipelineError> {
        if self.live.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        self.store.put(file).await?;
        Ok(())
    }

    /// Upload one file. The inner `Err` is a per-file rejection; the outer
    /// one aborts the whole run.
    async fn upload_one(
        &self,
        uploader: &Uploader,
        path: &Path,
        project_id: &str,
    ) -> Result<Result<UploadedFile, Rejected>, PipelineError> {
        let rejected = |reason: String| Rejected {
            path: path.to_path_buf(),
            reason,
        };

        let file = match FileUpload::from_path(path, &self.limits) {
            Ok(f) => f,
            Err(e) => return Ok(Err(rejected(format!("{:#}", e)))),
        };

        let mut pending =
            UploadedFile::new_upload(project_id, &file.name, file.size(), &file.mime_type);
        self.record(&pending).await?;

        match uploader.upload(file, project_id).await {
            Ok(uploaded) => {
                let record = UploadedFile {
                    id: pending.id.clone(),
                    uploaded_at: pending.uploaded_at,
                    ..uploaded
                };
                self.record(&record).await?;
                Ok(Ok(record))
            }
            Err(e) => {
                pending.status = FileStatus::Failed;
                self.record(&pending).await?;
                Ok(Err(rejected(e.to_string())))
            }
        }
    }

    /// Upload `paths` into `project_id`, run one job over them, and
    /// record the outcome on every uploaded file.
    pub async fn analyze(
        &self,
        paths: &[PathBuf],
        project_id: &str,
        user_query: Option<&str>,
    ) -> Result<AnalysisOutcome, PipelineError> {
        let uploader = Uploader::new(self.client.clone(), self.limits.clone());
        let mut files = Vec::new();
        let mut rejected = Vec::new();

        for path in paths {
            match self.upload_one(&uploader, path, project_id).await? {
                Ok(file) => files.push(file),
                Err(r) => {
                    warn!(path = %r.path.display(), reason = %r.reason, "file skipped");
                    rejected.push(r);
                }
            }
        }
        if files.is_empty() {
            return Err(PipelineError::NoFiles);
        }
        if self.live.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let submitter = JobSubmitter::new(self.client.clone());
        let job_id = submitter.submit(&job_files(&files), user_query).await?;

        let mut poller = JobPoller::new(self.client.clone(), self.poll_interval);
        let rx = poller.start(&job_id).await;
        let job = tokio::select! {
            job = wait_terminal(rx) => job,
            _ = self.live.cancelled() => {
                poller.stop().await;
                return Err(PipelineError::Cancelled);
            }
        };

        for file in files.iter_mut() {
            match job.status {
                JobStatus::Completed => {
                    file.status = FileStatus::Completed;
                    file.analysis = job.result.clone();
                }
                _ => file.status = FileStatus::Failed,
            }
            self.record(file).await?;
        }
        info!(job_id = %job.id, status = %job.status, files = files.len(), "analysis recorded");

        Ok(AnalysisOutcome {
            job,
            files,
            rejected,
        })
    }
}

/// CLI entry point for `psc analyze`.
pub async fn run_analyze(
    config: &Config,
    store: Arc<dyn FileStore>,
    paths: &[PathBuf],
    project_id: &str,
    user_query: Option<&str>,
) -> Result<()> {
    let pipeline = Pipeline::new(
        ApiClient::new(&config.backend)?,
        store,
        config.upload.clone(),
        config.poll.interval(),
    );

    let live = pipeline.liveness();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            live.cancel();
        }
    });

    let outcome = pipeline.analyze(paths, project_id, user_query).await?;
    for r in &outcome.rejected {
        println!("skipped {}: {}", r.path.display(), r.reason);
    }
    println!(
        "analyzed {} file(s) in project '{}'",
        outcome.files.len(),
        project_id
    );
    print_job(&outcome.job);
    if let Some(err) = &outcome.job.error {
        anyhow::bail!("job {} failed: {}", outcome.job.id, err);
    }
    Ok(())
}
