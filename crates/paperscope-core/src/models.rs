//! Core data models used throughout Paperscope.
//!
//! These types describe uploaded papers, chat reference descriptors, and
//! the normalized anchors the backend extracts from each PDF page.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::job::AnalysisResult;

/// Lifecycle of an uploaded file.
///
/// `Uploading → Processing → Completed | Failed`. A file may also fail
/// straight out of `Uploading`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Uploading,
    Processing,
    Completed,
    Failed,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Uploading => "uploading",
            FileStatus::Processing => "processing",
            FileStatus::Completed => "completed",
            FileStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "uploading" => Some(FileStatus::Uploading),
            "processing" => Some(FileStatus::Processing),
            "completed" => Some(FileStatus::Completed),
            "failed" => Some(FileStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FileStatus::Completed | FileStatus::Failed)
    }

    /// Whether a record in this status may be overwritten with `next`.
    pub fn can_transition_to(&self, next: FileStatus) -> bool {
        use FileStatus::*;
        matches!(
            (self, next),
            (Uploading, Uploading)
                | (Uploading, Processing)
                | (Uploading, Failed)
                | (Processing, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Completed, Completed)
                | (Failed, Failed)
        )
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A paper uploaded to the backend and tracked in the local record store.
///
/// Owned by the project named in `project_id`; deleting the project
/// deletes the file record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
    pub status: FileStatus,
    /// Upload progress, 0–100. Never decreases before a terminal status.
    pub progress: u8,
    /// Public URL the backend serves the PDF from (`/uploaded_pdfs/<file_id>`).
    pub url: Option<String>,
    /// Server-side path, used by the chat endpoint.
    pub file_path: Option<String>,
    /// Opaque backend identifier.
    pub file_id: Option<String>,
    pub analysis: Option<AnalysisResult>,
}

impl UploadedFile {
    /// A fresh record in the `Uploading` state with 0% progress.
    pub fn new_upload(project_id: &str, name: &str, size: u64, mime_type: &str) -> Self {
        Self {
            id: format!("file_{}", uuid::Uuid::new_v4().simple()),
            project_id: project_id.to_string(),
            name: name.to_string(),
            size,
            mime_type: mime_type.to_string(),
            uploaded_at: Utc::now(),
            status: FileStatus::Uploading,
            progress: 0,
            url: None,
            file_path: None,
            file_id: None,
            analysis: None,
        }
    }

    /// Raise progress, ignoring any attempt to lower it.
    pub fn advance_progress(&mut self, progress: u8) {
        self.progress = self.progress.max(progress.min(100));
    }

    /// The identifier the backend knows this file by, falling back to the local id.
    pub fn backend_id(&self) -> &str {
        self.file_id.as_deref().unwrap_or(&self.id)
    }
}

/// Identifier of an anchor. The backend emits these as integers but the
/// viewer route carries them as strings, so both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AnchorId(pub String);

impl AnchorId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AnchorId {
    fn from(s: &str) -> Self {
        AnchorId(s.to_string())
    }
}

impl<'de> Deserialize<'de> for AnchorId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Int(i64),
            Float(f64),
            Str(String),
        }
        Ok(match Wire::deserialize(deserializer)? {
            Wire::Int(i) => AnchorId(i.to_string()),
            Wire::Float(f) => AnchorId(f.to_string()),
            Wire::Str(s) => AnchorId(s),
        })
    }
}

/// One occurrence of a reference inside a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageRef {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// Structured pointer from a chat citation marker to a source document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDescriptor {
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
    #[serde(default)]
    pub pages: Vec<PageRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_id: Option<AnchorId>,
}

/// Citation index (`[n]`) → reference descriptor, for one chat turn.
pub type ReferenceMap = BTreeMap<u32, ReferenceDescriptor>;

/// Parse a `references` object from the wire.
///
/// Keys arrive as JSON object keys (strings). Keys that are not plain
/// non-negative integers, and descriptors that do not decode, are dropped.
pub fn parse_references(value: &Value) -> ReferenceMap {
    let mut map = ReferenceMap::new();
    let Some(obj) = value.as_object() else {
        return map;
    };
    for (key, raw) in obj {
        let Ok(index) = key.trim().parse::<u32>() else {
            continue;
        };
        if let Ok(descriptor) = serde_json::from_value::<ReferenceDescriptor>(raw.clone()) {
            map.insert(index, descriptor);
        }
    }
    map
}

/// `deserialize_with` adapter for [`parse_references`].
pub fn deserialize_references<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<ReferenceMap, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(parse_references).unwrap_or_default())
}

/// Bounding box normalized to page dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBoxNorm {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BBoxNorm {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// `0 ≤ x0 ≤ x1 ≤ 1` and `0 ≤ y0 ≤ y1 ≤ 1`, all finite.
    pub fn is_valid(&self) -> bool {
        let unit = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        unit(self.x0)
            && unit(self.x1)
            && unit(self.y0)
            && unit(self.y1)
            && self.x0 <= self.x1
            && self.y0 <= self.y1
    }
}

/// A highlight region on one PDF page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<AnchorId>,
    pub page: u32,
    pub bbox_norm: BBoxNorm,
}

/// Decode an `{ "anchors": [...] }` payload, skipping malformed entries.
///
/// Returns the decoded anchors and the number of entries that could not
/// be decoded.
pub fn parse_anchor_list(value: &Value) -> (Vec<Anchor>, usize) {
    let Some(items) = value.get("anchors").and_then(Value::as_array) else {
        return (Vec::new(), 0);
    };
    let mut anchors = Vec::with_capacity(items.len());
    let mut malformed = 0;
    for item in items {
        match serde_json::from_value::<Anchor>(item.clone()) {
            Ok(a) => anchors.push(a),
            Err(_) => malformed += 1,
        }
    }
    (anchors, malformed)
}
