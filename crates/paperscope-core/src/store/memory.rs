//! In-memory [`FileStore`] implementation for tests and embedded use.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::models::UploadedFile;

use super::{check_update, FileStore, StoreError};

/// `HashMap` behind a `RwLock`.
#[derive(Default)]
pub struct InMemoryStore {
    files: RwLock<HashMap<String, UploadedFile>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

#[async_trait]
impl FileStore for InMemoryStore {
    async fn get(&self, id: &str) -> Result<Option<UploadedFile>, StoreError> {
        let files = self.files.read().map_err(poisoned)?;
        Ok(files.get(id).cloned())
    }

    async fn put(&self, file: &UploadedFile) -> Result<(), StoreError> {
        let mut files = self.files.write().map_err(poisoned)?;
        check_update(files.get(&file.id), file)?;
        files.insert(file.id.clone(), file.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut files = self.files.write().map_err(poisoned)?;
        Ok(files.remove(id).is_some())
    }

    async fn list_by_project(&self, project_id: &str) -> Result<Vec<UploadedFile>, StoreError> {
        let files = self.files.read().map_err(poisoned)?;
        let mut out: Vec<UploadedFile> = files
            .values()
            .filter(|f| f.project_id == project_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn delete_project(&self, project_id: &str) -> Result<usize, StoreError> {
        let mut files = self.files.write().map_err(poisoned)?;
        let before = files.len();
        files.retain(|_, f| f.project_id != project_id);
        Ok(before - files.len())
    }
}
