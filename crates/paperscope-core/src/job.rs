//! Background analysis jobs: status, result payloads, and state transitions.
//!
//! An [`AnalysisJob`] starts in [`JobStatus::Pending`] as soon as a job id
//! is known and is updated from each status response via
//! [`AnalysisJob::apply`]. `Completed` and `Failed` are terminal.
//!
//! # Result payloads
//!
//! The backend's `result` field is untyped. It is resolved into an
//! [`AnalysisResult`] by explicit priority:
//!
//! 1. `answer` is a string → [`AnalysisResult::Answer`]
//! 2. `text` is a string → [`AnalysisResult::Text`]
//! 3. anything else → [`AnalysisResult::Raw`]
//!
//! An absent or `null` result resolves to `None`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::models::{parse_references, ReferenceMap};

/// Message recorded when a job fails without an error string.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Analysis failed";

/// Status reported by `GET /job-status/:id`.
///
/// Unknown strings (the backend reports `not_found` for unknown ids) are
/// kept verbatim in [`JobStatus::Other`] and are not terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Other(String),
}

impl JobStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => JobStatus::Pending,
            "running" => JobStatus::Running,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            other => JobStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Other(s) => s,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for JobStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(JobStatus::parse(&s))
    }
}

/// Body of `GET /job-status/:id`.
#[derive(Debug, Clone, Deserialize)]
pub struct JobStatusResponse {
    pub status: JobStatus,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// A resolved job result payload.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisResult {
    /// Question-answering job: an answer with `[n]` citation markers.
    Answer {
        answer: String,
        references: ReferenceMap,
    },
    /// Summary job: formatted text plus per-paper summaries.
    Text {
        text: String,
        references: ReferenceMap,
        summaries: BTreeMap<String, Value>,
    },
    /// Anything else, kept as-is.
    Raw(Value),
}

impl AnalysisResult {
    /// Resolve an untyped payload. `null` yields `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        if value.is_null() {
            return None;
        }
        let references = value
            .get("references")
            .map(parse_references)
            .unwrap_or_default();

        if let Some(answer) = value.get("answer").and_then(Value::as_str) {
            return Some(AnalysisResult::Answer {
                answer: answer.to_string(),
                references,
            });
        }
        if let Some(text) = value.get("text").and_then(Value::as_str) {
            let summaries = value
                .get("summaries")
                .and_then(Value::as_object)
                .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default();
            return Some(AnalysisResult::Text {
                text: text.to_string(),
                references,
                summaries,
            });
        }
        Some(AnalysisResult::Raw(value))
    }

    /// The displayable text of the result, if it has one.
    pub fn extracted_text(&self) -> Option<&str> {
        match self {
            AnalysisResult::Answer { answer, .. } => Some(answer),
            AnalysisResult::Text { text, .. } => Some(text),
            AnalysisResult::Raw(v) => v.as_str(),
        }
    }

    /// References carried by the result (empty for raw payloads).
    pub fn references(&self) -> Option<&ReferenceMap> {
        match self {
            AnalysisResult::Answer { references, .. } | AnalysisResult::Text { references, .. } => {
                Some(references)
            }
            AnalysisResult::Raw(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            AnalysisResult::Answer { answer, references } => serde_json::json!({
                "answer": answer,
                "references": references_to_value(references),
            }),
            AnalysisResult::Text {
                text,
                references,
                summaries,
            } => serde_json::json!({
                "text": text,
                "references": references_to_value(references),
                "summaries": summaries,
            }),
            AnalysisResult::Raw(v) => v.clone(),
        }
    }
}

fn references_to_value(references: &ReferenceMap) -> Value {
    let mut map = Map::new();
    for (k, v) in references {
        map.insert(
            k.to_string(),
            serde_json::to_value(v).unwrap_or(Value::Null),
        );
    }
    Value::Object(map)
}

impl Serialize for AnalysisResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AnalysisResult {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(AnalysisResult::from_value(value.clone()).unwrap_or(AnalysisResult::Raw(value)))
    }
}

/// Client-side view of one background job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisJob {
    pub id: String,
    pub status: JobStatus,
    pub result: Option<AnalysisResult>,
    pub error: Option<String>,
    /// Number of status responses applied so far.
    pub polls: u64,
    /// Most recent poll failure, cleared by the next successful response.
    pub last_error: Option<String>,
}

impl AnalysisJob {
    /// A job that has just been accepted by the backend.
    pub fn pending(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Pending,
            result: None,
            error: None,
            polls: 0,
            last_error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply one status response. Returns `true` when the job is now terminal.
    ///
    /// Responses arriving after a terminal state are ignored.
    pub fn apply(&mut self, response: JobStatusResponse) -> bool {
        if self.is_terminal() {
            return true;
        }
        self.polls += 1;
        self.last_error = None;
        self.status = response.status;
        match self.status {
            JobStatus::Completed => {
                self.result = response.result.and_then(AnalysisResult::from_value);
            }
            JobStatus::Failed => {
                self.error = Some(
                    response
                        .error
                        .filter(|e| !e.is_empty())
                        .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
                );
            }
            _ => {}
        }
        self.is_terminal()
    }

    /// Shorthand for the completed result's displayable text.
    pub fn extracted_result(&self) -> Option<&str> {
        self.result.as_ref().and_then(AnalysisResult::extracted_text)
    }
}
