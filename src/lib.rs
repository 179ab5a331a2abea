//! # Paperscope
//!
//! Client library and CLI for an external paper-analysis service: upload
//! PDFs, run a background analysis job over them, chat about the papers,
//! and view cited passages as highlights on a rendered page.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐
//! │ Uploader │──▶│  Submit  │──▶│  Poller  │──▶│  Store   │
//! └──────────┘   └──────────┘   └──────────┘   │ (SQLite) │
//!                                              └──────────┘
//! ┌──────────┐   ┌──────────┐   ┌──────────┐
//! │   Chat   │──▶│ Resolver │──▶│  Viewer  │  ◀── anchors + PDF
//! └──────────┘   └──────────┘   └──────────┘
//! ```
//!
//! Runtime-free logic (data model, citation parsing, overlay geometry,
//! store and renderer traits) lives in `paperscope-core`.
//!
//! ## Quick Start
//!
//! ```bash
//! psc init
//! psc analyze paper.pdf --project thesis
//! psc chat "Which gaps do these papers share?" --project thesis
//! psc view 3f2c.pdf --fragment '#page=3&anchor=12'
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`api`] | HTTP client for the analysis backend |
//! | [`upload`] | PDF validation and upload |
//! | [`jobs`] | Analysis job submission |
//! | [`poller`] | Fixed-interval job status polling |
//! | [`pipeline`] | Upload → job → poll → record |
//! | [`chat`] | Chat with uploaded papers |
//! | [`pdf`] | `lopdf` page geometry |
//! | [`viewer`] | Page view with highlight overlay |
//! | [`sqlite_store`] | SQLite record store |
//! | [`files`] | File listing and project delete |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod api;
pub mod chat;
pub mod config;
pub mod db;
pub mod files;
pub mod jobs;
pub mod migrate;
pub mod pdf;
pub mod pipeline;
pub mod poller;
pub mod sqlite_store;
pub mod upload;
pub mod viewer;
