mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;

use paperscope::api::ApiClient;
use paperscope::pdf::LopdfRenderer;
use paperscope::pipeline::{Pipeline, PipelineError};
use paperscope::viewer::AnnotationViewer;
use paperscope_core::job::JobStatus;
use paperscope_core::models::FileStatus;
use paperscope_core::overlay::MinSize;
use paperscope_core::store::memory::InMemoryStore;
use paperscope_core::store::FileStore;

use common::{pdf_bytes, write_file, MockBackend, MockState};

fn pipeline(backend: &MockBackend, store: Arc<InMemoryStore>) -> Pipeline {
    let cfg = backend.config();
    Pipeline::new(
        ApiClient::new(&cfg.backend).unwrap(),
        store,
        cfg.upload.clone(),
        Duration::from_millis(20),
    )
}

#[tokio::test]
async fn test_analyze_records_result_on_every_file() {
    let backend = MockBackend::start(MockState {
        statuses: vec![
            json!({"status": "pending"}),
            json!({"status": "running"}),
            json!({"status": "completed", "result": {"text": "Both papers lack baselines."}}),
        ]
        .into(),
        ..Default::default()
    })
    .await;
    let tmp = TempDir::new().unwrap();
    let a = write_file(tmp.path(), "a.pdf", b"%PDF-1.5 a");
    let b = write_file(tmp.path(), "b.pdf", b"%PDF-1.5 b");
    let notes = write_file(tmp.path(), "notes.txt", b"not a pdf");

    let store = Arc::new(InMemoryStore::new());
    let outcome = pipeline(&backend, store.clone())
        .analyze(&[a, notes, b], "thesis", None)
        .await
        .unwrap();

    assert_eq!(outcome.job.status, JobStatus::Completed);
    assert_eq!(outcome.rejected.len(), 1);
    assert!(outcome.rejected[0].path.ends_with("notes.txt"));
    assert_eq!(backend.hits("upload"), 2);
    assert_eq!(backend.hits("start-analysis-job"), 1);

    let job_body = backend.state.lock().unwrap().job_requests[0].clone();
    assert_eq!(
        job_body["files"],
        json!({
            "a-stored.pdf": "/uploaded_pdfs/a-stored.pdf",
            "b-stored.pdf": "/uploaded_pdfs/b-stored.pdf"
        })
    );

    let files = store.list_by_project("thesis").await.unwrap();
    assert_eq!(files.len(), 2);
    for f in &files {
        assert_eq!(f.status, FileStatus::Completed);
        assert_eq!(f.progress, 100);
        assert_eq!(
            f.analysis.as_ref().and_then(|r| r.extracted_text()),
            Some("Both papers lack baselines.")
        );
    }
}

#[tokio::test]
async fn test_analyze_job_failure_marks_files_failed() {
    let backend = MockBackend::start(MockState {
        statuses: vec![json!({"status": "failed", "error": "model timeout"})].into(),
        ..Default::default()
    })
    .await;
    let tmp = TempDir::new().unwrap();
    let a = write_file(tmp.path(), "a.pdf", b"%PDF-1.5 a");

    let store = Arc::new(InMemoryStore::new());
    let outcome = pipeline(&backend, store.clone())
        .analyze(&[a], "p", None)
        .await
        .unwrap();

    assert_eq!(outcome.job.error.as_deref(), Some("model timeout"));
    let files = store.list_by_project("p").await.unwrap();
    assert_eq!(files[0].status, FileStatus::Failed);
    assert!(files[0].analysis.is_none());
}

#[tokio::test]
async fn test_analyze_with_nothing_valid_submits_no_job() {
    let backend = MockBackend::start(MockState::default()).await;
    let tmp = TempDir::new().unwrap();
    let notes = write_file(tmp.path(), "notes.txt", b"text");

    let store = Arc::new(InMemoryStore::new());
    let err = pipeline(&backend, store.clone())
        .analyze(&[notes], "p", None)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::NoFiles));
    assert_eq!(backend.total_hits(), 0);
    assert!(store.list_by_project("p").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancelled_pipeline_writes_nothing_more() {
    let backend = MockBackend::start(MockState {
        statuses: vec![json!({"status": "running"})].into(),
        ..Default::default()
    })
    .await;
    let tmp = TempDir::new().unwrap();
    let a = write_file(tmp.path(), "a.pdf", b"%PDF-1.5 a");

    let store = Arc::new(InMemoryStore::new());
    let p = pipeline(&backend, store.clone());
    let live = p.liveness();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        live.cancel();
    });

    let err = p.analyze(&[a], "p", None).await.unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled));

    let files = store.list_by_project("p").await.unwrap();
    assert_eq!(files[0].status, FileStatus::Processing);

    let polls = backend.hits("job-status");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(backend.hits("job-status"), polls);
}

#[tokio::test]
async fn test_viewer_over_http_with_lopdf() {
    let backend = MockBackend::start(MockState {
        pdf: pdf_bytes(&[(612, 792), (612, 792)]),
        anchors: Some(json!({"anchors": [
            {"id": 12, "page": 2, "bbox_norm": {"x0": 0.5, "y0": 0.5, "x1": 0.5, "y1": 0.5}},
            {"id": 13, "page": 1, "bbox_norm": {"x0": 0.1, "y0": 0.1, "x1": 0.9, "y1": 0.2}}
        ]})),
        ..Default::default()
    })
    .await;
    let client = ApiClient::new(&backend.config().backend).unwrap();
    let viewer = AnnotationViewer::new(
        LopdfRenderer::new(client.clone()),
        client,
        1.5,
        MinSize::default(),
    );

    let view = viewer.open("f1", "#page=2&anchor=12").await.unwrap();
    assert_eq!((view.surface.width, view.surface.height), (918, 1188));
    assert_eq!(view.overlay.highlights.len(), 1);
    let rect = view.overlay.highlights[0].rect;
    assert_eq!((rect.left, rect.top), (459.0, 594.0));
    assert_eq!((rect.width, rect.height), (10.0, 8.0));
    assert!(view.overlay.highlights[0].focused);
}

#[tokio::test]
async fn test_viewer_degrades_when_anchors_fail() {
    let backend = MockBackend::start(MockState {
        pdf: pdf_bytes(&[(612, 792)]),
        anchors: None,
        ..Default::default()
    })
    .await;
    let client = ApiClient::new(&backend.config().backend).unwrap();
    let viewer = AnnotationViewer::new(
        LopdfRenderer::new(client.clone()),
        client,
        1.5,
        MinSize::default(),
    );

    let view = viewer.open("f1", "#page=abc").await.unwrap();
    assert_eq!(view.surface.page, 1);
    assert!(view.overlay.highlights.is_empty());
    assert!(view.anchor_error.is_some());
}
