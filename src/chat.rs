//! Chat with uploaded papers.
//!
//! [`ChatClient::ask`] posts one question to `/chat-with-papers/` and
//! returns the answer with its reference map. Answers cite sources with
//! `[n]` markers; [`render_answer`] emphasizes them for the terminal and
//! [`print_references`] lists where each one leads.

use std::collections::BTreeMap;

use anyhow::Result;
use tracing::{debug, info};

use paperscope_core::citations::{split_citations, Segment};
use paperscope_core::models::{ReferenceMap, UploadedFile};
use paperscope_core::resolver::{target_for, Navigator, ReferenceResolver};
use paperscope_core::store::FileStore;

use crate::api::{ApiClient, ApiError};
use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// One answered question.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub query: String,
    pub answer: String,
    pub references: ReferenceMap,
}

impl ChatTurn {
    pub fn resolver(&self) -> ReferenceResolver<'_> {
        ReferenceResolver::new(&self.references)
    }
}

pub struct ChatClient {
    client: ApiClient,
}

impl ChatClient {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Ask `query` about `paper_files` (`file_id → server path`).
    pub async fn ask(
        &self,
        query: &str,
        paper_files: &BTreeMap<String, String>,
    ) -> Result<ChatTurn, ChatError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ChatError::EmptyQuery);
        }
        debug!(papers = paper_files.len(), "chat request");
        let response = self.client.chat_with_papers(query, paper_files).await?;
        info!(references = response.references.len(), "chat answered");
        Ok(ChatTurn {
            query: query.to_string(),
            answer: response.answer,
            references: response.references,
        })
    }
}

/// `file_id → server path` for every uploaded file that has one.
pub fn paper_files(files: &[UploadedFile]) -> BTreeMap<String, String> {
    files
        .iter()
        .filter_map(|f| {
            f.file_path
                .as_ref()
                .map(|p| (f.backend_id().to_string(), p.clone()))
        })
        .collect()
}

/// Answer text with every `[n]` marker emphasized as `**[n]**`.
pub fn render_answer(text: &str) -> String {
    split_citations(text)
        .iter()
        .map(|seg| match seg {
            Segment::Text(s) => (*s).to_string(),
            Segment::Marker { raw, .. } => format!("**{}**", raw),
        })
        .collect()
}

/// One line per reference: its viewer URL and first snippet.
pub fn print_references(references: &ReferenceMap) {
    if references.is_empty() {
        return;
    }
    println!();
    println!("References:");
    for (index, descriptor) in references {
        let target = target_for(descriptor)
            .map(|t| t.url())
            .unwrap_or_else(|| "(no document)".to_string());
        let snippet = descriptor
            .pages
            .first()
            .and_then(|p| p.snippet.as_deref())
            .unwrap_or("");
        if snippet.is_empty() {
            println!("  [{}] {}", index, target);
        } else {
            println!("  [{}] {}  \"{}\"", index, target, snippet);
        }
    }
}

/// Prints each URL instead of opening it.
struct PrintNavigator;

impl Navigator for PrintNavigator {
    fn open_in_new_context(&mut self, url: &str) {
        println!("  -> {}", url);
    }
}

/// CLI entry point for `psc chat`, over every paper in a project.
pub async fn run_chat(
    config: &Config,
    store: &dyn FileStore,
    query: &str,
    project_id: &str,
    open: Option<u32>,
) -> Result<()> {
    let files = store.list_by_project(project_id).await?;
    let papers = paper_files(&files);
    if papers.is_empty() {
        anyhow::bail!("project '{}' has no uploaded papers", project_id);
    }

    let chat = ChatClient::new(ApiClient::new(&config.backend)?);
    let turn = chat.ask(query, &papers).await?;

    println!("{}", render_answer(&turn.answer));
    print_references(&turn.references);

    if let Some(index) = open {
        println!();
        let opened = turn.resolver().click(index, &mut PrintNavigator, |descriptor| {
            debug!(index, resolved = descriptor.is_some(), "citation clicked");
        });
        if opened.is_none() {
            println!("  [{}] has no viewer target", index);
        }
    }
    Ok(())
}
