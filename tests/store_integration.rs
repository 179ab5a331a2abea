use serde_json::json;
use tempfile::TempDir;

use paperscope::config::Config;
use paperscope::sqlite_store::SqliteStore;
use paperscope_core::job::AnalysisResult;
use paperscope_core::models::{FileStatus, UploadedFile};
use paperscope_core::store::memory::InMemoryStore;
use paperscope_core::store::{FileStore, StoreError};

async fn sqlite_store(tmp: &TempDir) -> SqliteStore {
    let mut cfg = Config::minimal("http://127.0.0.1:9");
    cfg.db.path = tmp.path().join("data").join("psc.sqlite");
    SqliteStore::open(&cfg).await.unwrap()
}

fn upload(project: &str, name: &str) -> UploadedFile {
    UploadedFile::new_upload(project, name, 1024, "application/pdf")
}

async fn check_lifecycle(store: &dyn FileStore) {
    let mut f = upload("p1", "a.pdf");
    store.put(&f).await.unwrap();

    f.status = FileStatus::Processing;
    f.advance_progress(100);
    f.file_id = Some("a-1.pdf".into());
    f.url = Some("/uploaded_pdfs/a-1.pdf".into());
    store.put(&f).await.unwrap();

    f.status = FileStatus::Completed;
    f.analysis = AnalysisResult::from_value(json!({"text": "summary", "summaries": {"x": 1}}));
    store.put(&f).await.unwrap();

    let got = store.get(&f.id).await.unwrap().unwrap();
    assert_eq!(got.status, FileStatus::Completed);
    assert_eq!(got.progress, 100);
    assert_eq!(got.file_id.as_deref(), Some("a-1.pdf"));
    assert_eq!(got.uploaded_at, f.uploaded_at);
    assert_eq!(
        got.analysis.as_ref().and_then(|a| a.extracted_text()),
        Some("summary")
    );

    // Completed is terminal.
    let mut back = got.clone();
    back.status = FileStatus::Processing;
    assert!(matches!(
        store.put(&back).await,
        Err(StoreError::InvalidTransition { .. })
    ));
}

async fn check_progress_never_decreases(store: &dyn FileStore) {
    let mut f = upload("p1", "b.pdf");
    f.advance_progress(60);
    store.put(&f).await.unwrap();

    let mut lower = f.clone();
    lower.progress = 30;
    assert!(matches!(
        store.put(&lower).await,
        Err(StoreError::ProgressRegression { from: 60, to: 30, .. })
    ));
    assert_eq!(store.get(&f.id).await.unwrap().unwrap().progress, 60);
}

async fn check_project_cascade(store: &dyn FileStore) {
    let a = upload("keep", "a.pdf");
    let b = upload("drop", "b.pdf");
    let c = upload("drop", "c.pdf");
    for f in [&a, &b, &c] {
        store.put(f).await.unwrap();
    }

    let listed: Vec<_> = store
        .list_by_project("drop")
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.name)
        .collect();
    assert_eq!(listed.len(), 2);

    assert_eq!(store.delete_project("drop").await.unwrap(), 2);
    assert!(store.list_by_project("drop").await.unwrap().is_empty());
    assert_eq!(store.list_by_project("keep").await.unwrap().len(), 1);
    assert_eq!(store.delete_project("drop").await.unwrap(), 0);

    assert!(store.delete(&a.id).await.unwrap());
    assert!(!store.delete(&a.id).await.unwrap());
}

#[tokio::test]
async fn test_sqlite_lifecycle() {
    let tmp = TempDir::new().unwrap();
    check_lifecycle(&sqlite_store(&tmp).await).await;
}

#[tokio::test]
async fn test_sqlite_progress_never_decreases() {
    let tmp = TempDir::new().unwrap();
    check_progress_never_decreases(&sqlite_store(&tmp).await).await;
}

#[tokio::test]
async fn test_sqlite_project_cascade() {
    let tmp = TempDir::new().unwrap();
    check_project_cascade(&sqlite_store(&tmp).await).await;
}

#[tokio::test]
async fn test_sqlite_reopen_keeps_records() {
    let tmp = TempDir::new().unwrap();
    let f = upload("p1", "a.pdf");
    {
        let store = sqlite_store(&tmp).await;
        store.put(&f).await.unwrap();
    }
    let store = sqlite_store(&tmp).await;
    let got = store.get(&f.id).await.unwrap().unwrap();
    assert_eq!(got.name, "a.pdf");
    assert_eq!(got.status, FileStatus::Uploading);
}

#[tokio::test]
async fn test_memory_store_matches_sqlite() {
    check_lifecycle(&InMemoryStore::new()).await;
    check_progress_never_decreases(&InMemoryStore::new()).await;
    check_project_cascade(&InMemoryStore::new()).await;
}
