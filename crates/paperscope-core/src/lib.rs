//! # Paperscope Core
//!
//! Runtime-free logic shared by the `paperscope` client and any other
//! front end: data models, job-state transitions, citation segmentation
//! and reference resolution, viewer-route parsing, overlay geometry, the
//! record-store abstraction, and the PDF renderer capability.
//!
//! This crate contains no tokio, sqlx, network, or filesystem I/O.

pub mod citations;
pub mod job;
pub mod models;
pub mod overlay;
pub mod render;
pub mod resolver;
pub mod route;
pub mod store;
