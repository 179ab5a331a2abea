//! Background analysis job submission.
//!
//! [`JobSubmitter::submit`] posts the uploaded files to
//! `POST /start-analysis-job/` and returns the backend's job id. An
//! empty file mapping is refused before any request is made.

use std::collections::BTreeMap;

use anyhow::Result;
use tracing::info;

use paperscope_core::job::AnalysisJob;
use paperscope_core::models::UploadedFile;
use paperscope_core::store::FileStore;

use crate::api::{ApiClient, ApiError};
use crate::config::Config;
use crate::poller::{wait_terminal, JobPoller};

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("no files to analyze")]
    NoFiles,

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// `file_id → public URL` for every file that has finished uploading.
pub fn job_files(files: &[UploadedFile]) -> BTreeMap<String, String> {
    files
        .iter()
        .filter(|f| f.url.is_some() || f.file_id.is_some())
        .map(|f| (f.backend_id().to_string(), f.url.clone().unwrap_or_default()))
        .collect()
}

pub struct JobSubmitter {
    client: ApiClient,
}

impl JobSubmitter {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Start one job over `files`. Returns the job id.
    pub async fn submit(
        &self,
        files: &BTreeMap<String, String>,
        user_query: Option<&str>,
    ) -> Result<String, SubmitError> {
        if files.is_empty() {
            return Err(SubmitError::NoFiles);
        }
        let response = self.client.start_analysis_job(files, user_query).await?;
        info!(job_id = %response.job_id, files = files.len(), "analysis job started");
        Ok(response.job_id)
    }
}

/// Print a job snapshot in the CLI's key/value style.
pub fn print_job(job: &AnalysisJob) {
    println!("job:     {}", job.id);
    println!("status:  {}", job.status);
    if let Some(err) = &job.error {
        println!("error:   {}", err);
    }
    if let Some(result) = &job.result {
        println!();
        match result.extracted_text() {
            Some(text) => println!("{}", crate::chat::render_answer(text)),
            None => println!(
                "{}",
                serde_json::to_string_pretty(&result.to_value()).unwrap_or_default()
            ),
        }
        if let Some(refs) = result.references() {
            crate::chat::print_references(refs);
        }
    }
}

/// CLI entry point for `psc job start`. Uses every uploaded file of the project.
pub async fn run_job_start(
    config: &Config,
    store: &dyn FileStore,
    project_id: &str,
    user_query: Option<&str>,
) -> Result<()> {
    let files = store.list_by_project(project_id).await?;
    let submitter = JobSubmitter::new(ApiClient::new(&config.backend)?);
    let job_id = submitter.submit(&job_files(&files), user_query).await?;
    println!("{}", job_id);
    Ok(())
}

/// CLI entry point for `psc job status`.
pub async fn run_job_status(config: &Config, job_id: &str) -> Result<()> {
    let client = ApiClient::new(&config.backend)?;
    let mut job = AnalysisJob::pending(job_id);
    job.apply(client.job_status(job_id).await?);
    print_job(&job);
    Ok(())
}

/// CLI entry point for `psc job watch`. Polls until terminal or Ctrl-C.
pub async fn run_job_watch(config: &Config, job_id: &str) -> Result<()> {
    let client = ApiClient::new(&config.backend)?;
    let mut poller = JobPoller::new(client, config.poll.interval());
    let rx = poller.start(job_id).await;

    let job = tokio::select! {
        job = wait_terminal(rx) => job,
        _ = tokio::signal::ctrl_c() => {
            poller.stop().await;
            anyhow::bail!("interrupted while waiting for job {}", job_id);
        }
    };
    print_job(&job);
    if let Some(err) = &job.error {
        anyhow::bail!("job {} failed: {}", job.id, err);
    }
    Ok(())
}
