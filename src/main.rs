//! # Paperscope CLI (`psc`)
//!
//! Drives the analysis backend from the terminal: upload papers, run
//! analysis jobs, chat about the papers, and inspect highlighted pages.
//!
//! ## Usage
//!
//! ```bash
//! psc --config ./config/psc.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `psc init` | Create the SQLite record store |
//! | `psc upload <path> --project <id>` | Validate and upload one PDF |
//! | `psc analyze <paths..> --project <id>` | Upload, analyze, wait, record |
//! | `psc job start --project <id>` | Start a job over a project's files |
//! | `psc job status <job_id>` | Print one status snapshot |
//! | `psc job watch <job_id>` | Poll until the job finishes |
//! | `psc chat "<query>" --project <id>` | Ask about a project's papers |
//! | `psc view <file_id>` | Page surface and highlight overlay |
//! | `psc files --project <id>` | List a project's files |
//! | `psc project delete <id>` | Delete a project's files |
//!
//! Logs go to stderr and are filtered with `RUST_LOG` (default `info`).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use paperscope::config;
use paperscope::sqlite_store::SqliteStore;
use paperscope::viewer::ViewFormat;
use paperscope::{chat, files, jobs, migrate, pipeline, upload, viewer};

/// Paperscope CLI: upload papers to an analysis service, track analysis
/// jobs, chat about the results, and view cited passages.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/psc.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "psc",
    about = "Paperscope: paper analysis from the command line",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/psc.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the record store. Idempotent.
    Init,

    /// Upload one PDF into a project.
    ///
    /// The file is checked against the configured type and size limits
    /// before anything is sent.
    Upload {
        path: PathBuf,

        #[arg(long)]
        project: String,
    },

    /// Upload PDFs, analyze them as one job, and record the result.
    ///
    /// Files that fail validation or upload are skipped. Ctrl-C stops
    /// polling and leaves records as they are.
    Analyze {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[arg(long)]
        project: String,

        /// Question to answer over the papers instead of a general analysis.
        #[arg(long)]
        query: Option<String>,
    },

    /// Start or inspect analysis jobs.
    Job {
        #[command(subcommand)]
        action: JobAction,
    },

    /// Ask a question about a project's papers.
    Chat {
        query: String,

        #[arg(long)]
        project: String,

        /// Follow citation `[n]` in the answer.
        #[arg(long)]
        open: Option<u32>,
    },

    /// Show a page of an uploaded PDF with its highlights.
    View {
        /// Backend file id.
        file_id: String,

        /// Viewer fragment, e.g. `#page=3&anchor=12`.
        #[arg(long, default_value = "")]
        fragment: String,

        #[arg(long, value_enum, default_value = "text")]
        format: ViewFormat,
    },

    /// List a project's files.
    Files {
        #[arg(long)]
        project: String,
    },

    /// Project maintenance.
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },
}

#[derive(Subcommand)]
enum JobAction {
    /// Start one job over every uploaded file of a project.
    Start {
        #[arg(long)]
        project: String,

        #[arg(long)]
        query: Option<String>,
    },

    /// Fetch the current status once.
    Status { job_id: String },

    /// Poll until the job completes or fails.
    Watch { job_id: String },
}

#[derive(Subcommand)]
enum ProjectAction {
    /// Delete every file record owned by a project.
    Delete { project: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
        }
        Commands::Upload { path, project } => {
            let store = SqliteStore::open(&cfg).await?;
            upload::run_upload(&cfg, &store, &path, &project).await?;
        }
        Commands::Analyze {
            paths,
            project,
            query,
        } => {
            let store = Arc::new(SqliteStore::open(&cfg).await?);
            pipeline::run_analyze(&cfg, store, &paths, &project, query.as_deref()).await?;
        }
        Commands::Job { action } => match action {
            JobAction::Start { project, query } => {
                let store = SqliteStore::open(&cfg).await?;
                jobs::run_job_start(&cfg, &store, &project, query.as_deref()).await?;
            }
            JobAction::Status { job_id } => {
                jobs::run_job_status(&cfg, &job_id).await?;
            }
            JobAction::Watch { job_id } => {
                jobs::run_job_watch(&cfg, &job_id).await?;
            }
        },
        Commands::Chat {
            query,
            project,
            open,
        } => {
            let store = SqliteStore::open(&cfg).await?;
            chat::run_chat(&cfg, &store, &query, &project, open).await?;
        }
        Commands::View {
            file_id,
            fragment,
            format,
        } => {
            viewer::run_view(&cfg, &file_id, &fragment, format).await?;
        }
        Commands::Files { project } => {
            let store = SqliteStore::open(&cfg).await?;
            files::run_files(&store, &project).await?;
        }
        Commands::Project { action } => match action {
            ProjectAction::Delete { project } => {
                let store = SqliteStore::open(&cfg).await?;
                files::run_project_delete(&store, &project).await?;
            }
        },
    }

    Ok(())
}
