//! SQLite-backed [`FileStore`] implementation.
//!
//! One row per [`UploadedFile`] in `uploaded_files`; the analysis result
//! is kept as JSON text. `put` reads the stored row and applies
//! [`check_update`] inside the same transaction as the write.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use paperscope_core::job::AnalysisResult;
use paperscope_core::models::{FileStatus, UploadedFile};
use paperscope_core::store::{check_update, FileStore, StoreError};

use crate::config::Config;
use crate::{db, migrate};

const COLUMNS: &str = "id, project_id, name, size, mime_type, uploaded_at, status, progress, \
                       url, file_path, file_id, analysis_json";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database, creating the schema if needed.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let pool = db::connect(&config.db.path).await?;
        migrate::migrate(&pool).await?;
        Ok(Self::new(pool))
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn row_to_file(row: &SqliteRow) -> Result<UploadedFile, StoreError> {
    let id: String = row.get("id");
    let status_str: String = row.get("status");
    let status = FileStatus::parse(&status_str)
        .ok_or_else(|| StoreError::Backend(format!("{}: unknown status '{}'", id, status_str)))?;

    let uploaded_at: String = row.get("uploaded_at");
    let uploaded_at = DateTime::parse_from_rfc3339(&uploaded_at)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Backend(format!("{}: bad uploaded_at: {}", id, e)))?;

    let analysis: Option<String> = row.get("analysis_json");
    let analysis = match analysis {
        Some(json) => Some(
            serde_json::from_str::<AnalysisResult>(&json)
                .map_err(|e| StoreError::Backend(format!("{}: bad analysis_json: {}", id, e)))?,
        ),
        None => None,
    };

    let size: i64 = row.get("size");
    let progress: i64 = row.get("progress");

    Ok(UploadedFile {
        id,
        project_id: row.get("project_id"),
        name: row.get("name"),
        size: size.max(0) as u64,
        mime_type: row.get("mime_type"),
        uploaded_at,
        status,
        progress: progress.clamp(0, 100) as u8,
        url: row.get("url"),
        file_path: row.get("file_path"),
        file_id: row.get("file_id"),
        analysis,
    })
}

#[async_trait]
impl FileStore for SqliteStore {
    async fn get(&self, id: &str) -> Result<Option<UploadedFile>, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM uploaded_files WHERE id = ?", COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.as_ref().map(row_to_file).transpose()
    }

    async fn put(&self, file: &UploadedFile) -> Result<(), StoreError> {
        let analysis_json = file
            .analysis
            .as_ref()
            .map(|a| serde_json::to_string(&a.to_value()))
            .transpose()
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let mut tx = self.pool.begin().await.map_err(backend)?;

        let existing = sqlx::query(&format!("SELECT {} FROM uploaded_files WHERE id = ?", COLUMNS))
            .bind(&file.id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(backend)?;
        let existing = existing.as_ref().map(row_to_file).transpose()?;
        check_update(existing.as_ref(), file)?;

        sqlx::query(
            r#"
            INSERT INTO uploaded_files (id, project_id, name, size, mime_type, uploaded_at,
                                        status, progress, url, file_path, file_id, analysis_json)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                project_id = excluded.project_id,
                name = excluded.name,
                size = excluded.size,
                mime_type = excluded.mime_type,
                uploaded_at = excluded.uploaded_at,
                status = excluded.status,
                progress = excluded.progress,
                url = excluded.url,
                file_path = excluded.file_path,
                file_id = excluded.file_id,
                analysis_json = excluded.analysis_json
            "#,
        )
        .bind(&file.id)
        .bind(&file.project_id)
        .bind(&file.name)
        .bind(file.size as i64)
        .bind(&file.mime_type)
        .bind(file.uploaded_at.to_rfc3339_opts(SecondsFormat::Nanos, true))
        .bind(file.status.as_str())
        .bind(i64::from(file.progress))
        .bind(&file.url)
        .bind(&file.file_path)
        .bind(&file.file_id)
        .bind(&analysis_json)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM uploaded_files WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_by_project(&self, project_id: &str) -> Result<Vec<UploadedFile>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM uploaded_files WHERE project_id = ? ORDER BY uploaded_at, id",
            COLUMNS
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.iter().map(row_to_file).collect()
    }

    async fn delete_project(&self, project_id: &str) -> Result<usize, StoreError> {
        let result = sqlx::query("DELETE FROM uploaded_files WHERE project_id = ?")
            .bind(project_id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() as usize)
    }
}
