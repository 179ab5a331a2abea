//! Annotation viewer: one rendered page plus its highlight overlay.
//!
//! Opening a view runs in a fixed order: load the document, render the
//! requested page, then fetch the document's anchors and lay them over
//! the page. An anchor fetch failure is not fatal. The page is still
//! returned, with no highlights and the failure recorded in
//! [`PageView::anchor_error`].

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use paperscope_core::models::parse_anchor_list;
use paperscope_core::overlay::{plan_overlay, MinSize, OverlayPlan};
use paperscope_core::render::{PdfRenderer, RenderError, Surface};
use paperscope_core::route::ViewerFragment;

use crate::api::{AnchorSource, ApiClient};
use crate::config::Config;
use crate::pdf::LopdfRenderer;

/// Everything needed to draw one page view.
#[derive(Debug, Clone, Serialize)]
pub struct PageView {
    pub file_id: String,
    pub surface: Surface,
    pub overlay: OverlayPlan,
    /// Anchor entries that could not be decoded at all.
    pub malformed_anchors: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_error: Option<String>,
}

pub struct AnnotationViewer<R: PdfRenderer, A: AnchorSource> {
    renderer: R,
    anchors: A,
    scale: f64,
    min_size: MinSize,
}

impl<R: PdfRenderer, A: AnchorSource> AnnotationViewer<R, A> {
    pub fn new(renderer: R, anchors: A, scale: f64, min_size: MinSize) -> Self {
        Self {
            renderer,
            anchors,
            scale,
            min_size,
        }
    }

    /// Open `file_id` at the page and anchor named by a `#page=..&anchor=..`
    /// fragment.
    pub async fn open(&self, file_id: &str, fragment: &str) -> Result<PageView, RenderError> {
        let target = ViewerFragment::parse(fragment);
        debug!(file_id, page = target.page, anchor = ?target.anchor, "opening view");

        let document = self.renderer.load_document(file_id).await?;
        let page = self.renderer.get_page(&document, target.page).await?;
        let surface = self
            .renderer
            .render_page_to_surface(&document, &page, self.scale)
            .await?;

        let (anchors, malformed, anchor_error) = match self.anchors.anchors(file_id).await {
            Ok(value) => {
                let (anchors, malformed) = parse_anchor_list(&value);
                // The backend reports unreadable anchor files as 200 with an `error` field.
                let error = value.get("error").and_then(Value::as_str).map(str::to_string);
                if let Some(error) = &error {
                    warn!(file_id, error = %error, "anchor fetch failed, showing page without highlights");
                }
                (anchors, malformed, error)
            }
            Err(e) => {
                warn!(file_id, error = %e, "anchor fetch failed, showing page without highlights");
                (Vec::new(), 0, Some(e.to_string()))
            }
        };
        if malformed > 0 {
            warn!(file_id, malformed, "ignored undecodable anchors");
        }

        let overlay = plan_overlay(&anchors, &surface, self.min_size, target.anchor.as_deref());
        if overlay.skipped > 0 {
            warn!(file_id, page = surface.page, skipped = overlay.skipped, "skipped anchors with invalid coordinates");
        }
        if target.anchor.is_some() && overlay.scroll_to.is_none() {
            debug!(file_id, anchor = ?target.anchor, "focused anchor not on this page");
        }

        Ok(PageView {
            file_id: file_id.to_string(),
            surface,
            overlay,
            malformed_anchors: malformed,
            anchor_error,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ViewFormat {
    Text,
    Json,
}

fn print_view(view: &PageView) {
    println!("file:     {}", view.file_id);
    println!(
        "page:     {} ({}x{} px)",
        view.surface.page, view.surface.width, view.surface.height
    );
    if let Some(err) = &view.anchor_error {
        println!("anchors:  unavailable ({})", err);
    }
    if let Some(y) = view.overlay.scroll_to {
        println!("scroll:   {:.1}", y);
    }
    println!("highlights: {}", view.overlay.highlights.len());
    for h in &view.overlay.highlights {
        let id = h.anchor_id.as_ref().map(|a| a.as_str()).unwrap_or("-");
        println!(
            "  {}{:<8} left={:.1} top={:.1} width={:.1} height={:.1}",
            if h.focused { "*" } else { " " },
            id,
            h.rect.left,
            h.rect.top,
            h.rect.width,
            h.rect.height
        );
    }
    if view.overlay.skipped > 0 {
        println!("skipped:  {}", view.overlay.skipped);
    }
}

/// CLI entry point for `psc view`.
pub async fn run_view(
    config: &Config,
    file_id: &str,
    fragment: &str,
    format: ViewFormat,
) -> anyhow::Result<()> {
    let client = ApiClient::new(&config.backend)?;
    let viewer = AnnotationViewer::new(
        LopdfRenderer::new(client.clone()),
        client,
        config.viewer.scale,
        config.viewer.min_size(),
    );
    let view = viewer.open(file_id, fragment).await?;

    match format {
        ViewFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
        ViewFormat::Text => print_view(&view),
    }
    Ok(())
}
