//! Project file listing and cascade delete.
//!
//! Used by `psc files` and `psc project delete`.

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::info;

use paperscope_core::store::FileStore;

/// Print every file of a project as a table.
pub async fn run_files(store: &dyn FileStore, project_id: &str) -> Result<()> {
    let files = store.list_by_project(project_id).await?;
    if files.is_empty() {
        println!("No files in project '{}'.", project_id);
        return Ok(());
    }

    println!(
        "  {:<36} {:<28} {:>9} {:<11} {:>4}   {}",
        "ID", "NAME", "SIZE", "STATUS", "%", "UPLOADED"
    );
    println!("  {}", "-".repeat(104));
    for f in &files {
        println!(
            "  {:<36} {:<28} {:>9} {:<11} {:>4}   {}",
            f.id,
            truncate_name(&f.name, 28),
            format_bytes(f.size),
            f.status.as_str(),
            f.progress,
            format_relative(f.uploaded_at, Utc::now())
        );
    }
    let analyzed = files.iter().filter(|f| f.analysis.is_some()).count();
    println!();
    println!("  {} file(s), {} analyzed", files.len(), analyzed);
    Ok(())
}

/// Delete a project's files. The project itself is only a grouping key.
pub async fn run_project_delete(store: &dyn FileStore, project_id: &str) -> Result<()> {
    let removed = store.delete_project(project_id).await?;
    info!(project_id, removed, "project deleted");
    println!("Deleted project '{}' ({} file(s))", project_id, removed);
    Ok(())
}

fn truncate_name(name: &str, max: usize) -> String {
    if name.chars().count() <= max {
        name.to_string()
    } else {
        let head: String = name.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn format_relative(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = (now - at).num_seconds();
    if delta < 0 {
        return at.format("%Y-%m-%d %H:%M").to_string();
    }
    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else {
        at.format("%Y-%m-%d %H:%M").to_string()
    }
}
