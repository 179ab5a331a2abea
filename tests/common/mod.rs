//! In-process stand-in for the analysis backend.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use paperscope::config::Config;

/// How `POST /upload/` answers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadMode {
    Ok,
    Html,
    /// `application/json` content type with a body that is not JSON.
    MalformedJson,
    ServerError,
}

pub struct MockState {
    pub upload_mode: UploadMode,
    /// Responses for `/job-status/{id}`; the last one repeats.
    pub statuses: VecDeque<Value>,
    pub anchors: Option<Value>,
    pub chat_answer: Value,
    pub pdf: Vec<u8>,
    /// Request counts by route.
    pub hits: HashMap<&'static str, usize>,
    pub uploaded_names: Vec<String>,
    pub job_requests: Vec<Value>,
    pub chat_requests: Vec<Value>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            upload_mode: UploadMode::Ok,
            statuses: VecDeque::from(vec![json!({"status": "pending"})]),
            anchors: Some(json!({"anchors": []})),
            chat_answer: json!({"answer": "", "references": {}}),
            pdf: Vec::new(),
            hits: HashMap::new(),
            uploaded_names: Vec::new(),
            job_requests: Vec::new(),
            chat_requests: Vec::new(),
        }
    }
}

pub type Shared = Arc<Mutex<MockState>>;

pub struct MockBackend {
    pub addr: SocketAddr,
    pub state: Shared,
}

impl MockBackend {
    pub async fn start(state: MockState) -> Self {
        let state = Arc::new(Mutex::new(state));
        let app = Router::new()
            .route("/upload/", post(upload))
            .route("/start-analysis-job/", post(start_job))
            .route("/job-status/{job_id}", get(job_status))
            .route("/chat-with-papers/", post(chat))
            .route("/anchors/{file_id}", get(anchors))
            .route("/uploaded_pdfs/{file_id}", get(pdf))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn config(&self) -> Config {
        Config::minimal(&self.base_url())
    }

    pub fn hits(&self, route: &str) -> usize {
        self.state.lock().unwrap().hits.get(route).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.state.lock().unwrap().hits.values().sum()
    }
}

fn hit(state: &Shared, route: &'static str) {
    *state.lock().unwrap().hits.entry(route).or_default() += 1;
}

async fn upload(State(state): State<Shared>, mut multipart: Multipart) -> Response {
    hit(&state, "upload");
    let mut name = String::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("file") {
            name = field.file_name().unwrap_or("").to_string();
            let _ = field.bytes().await;
        }
    }

    let mode = {
        let mut s = state.lock().unwrap();
        s.uploaded_names.push(name.clone());
        s.upload_mode
    };
    match mode {
        UploadMode::Ok => {
            let id = format!("{}-stored.pdf", name.trim_end_matches(".pdf"));
            Json(json!({
                "public_url": format!("/uploaded_pdfs/{}", id),
                "file_path": format!("uploaded_pdfs/{}", id),
                "file_id": id,
            }))
            .into_response()
        }
        UploadMode::Html => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/html")],
            "<html>proxy error</html>",
        )
            .into_response(),
        UploadMode::MalformedJson => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            "{not json",
        )
            .into_response(),
        UploadMode::ServerError => {
            (StatusCode::INTERNAL_SERVER_ERROR, "upload failed").into_response()
        }
    }
}

async fn start_job(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    hit(&state, "start-analysis-job");
    state.lock().unwrap().job_requests.push(body);
    Json(json!({"job_id": "job-1"}))
}

async fn job_status(State(state): State<Shared>, Path(_job_id): Path<String>) -> Json<Value> {
    hit(&state, "job-status");
    let mut s = state.lock().unwrap();
    let next = if s.statuses.len() > 1 {
        s.statuses.pop_front().unwrap_or_default()
    } else {
        s.statuses.front().cloned().unwrap_or_default()
    };
    Json(next)
}

async fn chat(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    hit(&state, "chat-with-papers");
    let mut s = state.lock().unwrap();
    s.chat_requests.push(body);
    Json(s.chat_answer.clone())
}

async fn anchors(State(state): State<Shared>, Path(_file_id): Path<String>) -> Response {
    hit(&state, "anchors");
    match state.lock().unwrap().anchors.clone() {
        Some(v) => Json(v).into_response(),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "anchor index missing").into_response(),
    }
}

async fn pdf(State(state): State<Shared>, Path(_file_id): Path<String>) -> Response {
    hit(&state, "uploaded_pdfs");
    let bytes = state.lock().unwrap().pdf.clone();
    if bytes.is_empty() {
        return StatusCode::NOT_FOUND.into_response();
    }
    ([(header::CONTENT_TYPE, "application/pdf")], bytes).into_response()
}

/// A minimal PDF with one page per `(width, height)` entry.
pub fn pdf_bytes(pages: &[(i64, i64)]) -> Vec<u8> {
    use lopdf::{dictionary, Document, Object, ObjectId};

    let mut doc = Document::with_version("1.5");
    let pages_id: ObjectId = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::new();
    for (w, h) in pages {
        let id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), (*w).into(), (*h).into()],
        });
        kids.push(id.into());
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages.len() as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// Write a small file with the given name into `dir`.
pub fn write_file(dir: &std::path::Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}
