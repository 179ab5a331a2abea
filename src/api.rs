//! HTTP client for the external analysis backend.
//!
//! # Endpoints
//!
//! | Method | Path | Used by |
//! |--------|------|---------|
//! | `POST` | `/upload/` | [`crate::upload`] |
//! | `POST` | `/start-analysis-job/` | [`crate::jobs`] |
//! | `GET`  | `/job-status/{job_id}` | [`crate::poller`] |
//! | `POST` | `/chat-with-papers/` | [`crate::chat`] |
//! | `GET`  | `/anchors/{file_id}` | [`crate::viewer`] |
//! | `GET`  | `/uploaded_pdfs/{file_id}` | [`crate::pdf`] |
//!
//! # Error contract
//!
//! Every JSON endpoint is decoded the same way:
//!
//! - network failure or non-2xx status → [`ApiError::Transport`]
//! - content-type other than `application/json`, or an undecodable
//!   body → [`ApiError::Protocol`]
//! - a request that cannot be built locally → [`ApiError::InvalidRequest`]
//!   (nothing is sent)
//!
//! Nothing is retried.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use paperscope_core::job::JobStatusResponse;
use paperscope_core::models::{deserialize_references, ReferenceMap};

use crate::config::BackendConfig;

/// How much of an error body is kept in messages.
const ERROR_BODY_LIMIT: usize = 300;

/// Whether a failure means "never reached the server", "server misbehaved",
/// or "request rejected before sending".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Transport,
    Protocol,
    Request,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{endpoint}: transport error{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Transport {
        endpoint: String,
        status: Option<u16>,
        message: String,
    },

    #[error("{endpoint}: protocol error: {message}")]
    Protocol { endpoint: String, message: String },

    #[error("{endpoint}: invalid request: {message}")]
    InvalidRequest { endpoint: String, message: String },
}

impl ApiError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ApiError::Transport { .. } => ErrorCategory::Transport,
            ApiError::Protocol { .. } => ErrorCategory::Protocol,
            ApiError::InvalidRequest { .. } => ErrorCategory::Request,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Transport { status, .. } => *status,
            ApiError::Protocol { .. } | ApiError::InvalidRequest { .. } => None,
        }
    }

    fn transport(endpoint: &str, err: reqwest::Error) -> Self {
        ApiError::Transport {
            endpoint: endpoint.to_string(),
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }

    fn protocol(endpoint: &str, message: impl Into<String>) -> Self {
        ApiError::Protocol {
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }
}

/// Body of a successful `POST /upload/`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct UploadResponse {
    pub public_url: String,
    pub file_path: String,
    pub file_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartJobRequest<'a> {
    /// `file_id → public URL`
    pub files: &'a BTreeMap<String, String>,
    pub links: Vec<String>,
    pub user_query: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartJobResponse {
    pub job_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub user_query: &'a str,
    /// `file_id → server path`
    pub paper_files: &'a BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    #[serde(default, deserialize_with = "deserialize_references")]
    pub references: ReferenceMap,
}

/// Thin typed wrapper over the backend's HTTP API.
///
/// Cloning is cheap; the underlying `reqwest::Client` is shared.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
}

impl ApiClient {
    pub fn new(config: &BackendConfig) -> anyhow::Result<Self> {
        let mut base = Url::parse(&config.base_url)?;
        if !matches!(base.scheme(), "http" | "https") {
            anyhow::bail!("backend URL must be http or https: {}", config.base_url);
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Join path segments onto the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str], trailing_slash: bool) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            path.extend(segments);
            if trailing_slash {
                path.push("");
            }
        }
        url
    }

    /// Resolve a backend-relative path such as `/uploaded_pdfs/x.pdf`.
    pub fn resolve(&self, path: &str) -> Option<Url> {
        self.base.join(path.trim_start_matches('/')).ok()
    }

    async fn decode_json<T: DeserializeOwned>(
        endpoint: &str,
        response: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<T, ApiError> {
        let response = response.map_err(|e| ApiError::transport(endpoint, e))?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Transport {
                endpoint: endpoint.to_string(),
                status: Some(status.as_u16()),
                message: truncate(&body, ERROR_BODY_LIMIT),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.contains("application/json") {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(endpoint, content_type = %content_type, body = %truncate(&body, ERROR_BODY_LIMIT), "expected JSON response");
            return Err(ApiError::protocol(
                endpoint,
                format!(
                    "expected application/json, got '{}'",
                    if content_type.is_empty() { "<none>" } else { &content_type }
                ),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::transport(endpoint, e))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::protocol(endpoint, format!("malformed JSON: {}", e)))
    }

    /// `POST /upload/` with a multipart `file` field.
    pub async fn upload_pdf(
        &self,
        name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadResponse, ApiError> {
        const ENDPOINT: &str = "/upload/";
        let part = multipart::Part::bytes(bytes)
            .file_name(name.to_string())
            .mime_str(mime_type)
            .map_err(|e| ApiError::InvalidRequest {
                endpoint: ENDPOINT.to_string(),
                message: format!("bad content type '{}': {}", mime_type, e),
            })?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(self.endpoint(&["upload"], true))
            .multipart(form)
            .send()
            .await;
        Self::decode_json(ENDPOINT, response).await
    }

    /// `POST /start-analysis-job/`
    pub async fn start_analysis_job(
        &self,
        files: &BTreeMap<String, String>,
        user_query: Option<&str>,
    ) -> Result<StartJobResponse, ApiError> {
        const ENDPOINT: &str = "/start-analysis-job/";
        let body = StartJobRequest {
            files,
            links: Vec::new(),
            user_query,
        };
        let response = self
            .http
            .post(self.endpoint(&["start-analysis-job"], true))
            .json(&body)
            .send()
            .await;
        Self::decode_json(ENDPOINT, response).await
    }

    /// `GET /job-status/{job_id}`
    pub async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, ApiError> {
        const ENDPOINT: &str = "/job-status/";
        let response = self
            .http
            .get(self.endpoint(&["job-status", job_id], false))
            .send()
            .await;
        Self::decode_json(ENDPOINT, response).await
    }

    /// `POST /chat-with-papers/`
    pub async fn chat_with_papers(
        &self,
        user_query: &str,
        paper_files: &BTreeMap<String, String>,
    ) -> Result<ChatResponse, ApiError> {
        const ENDPOINT: &str = "/chat-with-papers/";
        let body = ChatRequest {
            user_query,
            paper_files,
        };
        let response = self
            .http
            .post(self.endpoint(&["chat-with-papers"], true))
            .json(&body)
            .send()
            .await;
        Self::decode_json(ENDPOINT, response).await
    }

    /// `GET /anchors/{file_id}`, returned undecoded so malformed entries
    /// can be skipped individually.
    pub async fn anchors(&self, file_id: &str) -> Result<Value, ApiError> {
        const ENDPOINT: &str = "/anchors/";
        let response = self
            .http
            .get(self.endpoint(&["anchors", file_id], false))
            .send()
            .await;
        Self::decode_json(ENDPOINT, response).await
    }

    /// `GET /uploaded_pdfs/{file_id}`, raw bytes.
    pub async fn fetch_pdf(&self, file_id: &str) -> Result<Vec<u8>, ApiError> {
        const ENDPOINT: &str = "/uploaded_pdfs/";
        let response = self
            .http
            .get(self.endpoint(&["uploaded_pdfs", file_id], false))
            .send()
            .await
            .map_err(|e| ApiError::transport(ENDPOINT, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Transport {
                endpoint: ENDPOINT.to_string(),
                status: Some(status.as_u16()),
                message: format!("could not fetch {}", file_id),
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::transport(ENDPOINT, e))?;
        Ok(bytes.to_vec())
    }
}

/// Source of job status snapshots.
///
/// The poller only depends on this trait, so a push channel can stand in
/// for HTTP polling without changing the poller's contract.
#[async_trait]
pub trait JobStatusSource: Send + Sync + 'static {
    async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, ApiError>;
}

#[async_trait]
impl JobStatusSource for ApiClient {
    async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, ApiError> {
        ApiClient::job_status(self, job_id).await
    }
}

/// Source of a document's anchor list.
#[async_trait]
pub trait AnchorSource: Send + Sync {
    async fn anchors(&self, file_id: &str) -> Result<Value, ApiError>;
}

#[async_trait]
impl AnchorSource for ApiClient {
    async fn anchors(&self, file_id: &str) -> Result<Value, ApiError> {
        ApiClient::anchors(self, file_id).await
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
