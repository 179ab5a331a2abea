//! PDF rendering capability.
//!
//! The viewer never talks to a PDF engine directly. It goes through the
//! [`PdfRenderer`] trait, so anchor filtering and coordinate mapping can
//! be exercised with a fake renderer and real engines can be swapped in.

use async_trait::async_trait;

/// Errors raised while loading or rendering a page.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to load document {file_id}: {message}")]
    Load { file_id: String, message: String },

    #[error("page {page} out of range (document has {page_count} pages)")]
    PageOutOfRange { page: u32, page_count: u32 },

    #[error("failed to render page {page}: {message}")]
    Render { page: u32, message: String },
}

/// A page of a loaded document, in PDF user-space units (points).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageHandle {
    /// 1-indexed page number.
    pub number: u32,
    pub width: f64,
    pub height: f64,
}

impl PageHandle {
    pub fn viewport(&self, scale: f64) -> Viewport {
        Viewport {
            width: self.width * scale,
            height: self.height * scale,
            scale,
        }
    }
}

/// Page dimensions after scaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub scale: f64,
}

impl Viewport {
    /// The integer pixel size of a canvas sized to this viewport.
    ///
    /// Canvas dimensions are integral; fractional viewport sizes truncate.
    pub fn surface(&self, page: u32) -> Surface {
        Surface {
            page,
            width: self.width.max(0.0).floor() as u32,
            height: self.height.max(0.0).floor() as u32,
        }
    }
}

/// The drawing target a page was rendered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Surface {
    pub page: u32,
    pub width: u32,
    pub height: u32,
}

/// A PDF engine, injected into the viewer.
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    /// Engine-specific loaded document.
    type Document: Send + Sync;

    /// Load the document the backend stores under `file_id`.
    async fn load_document(&self, file_id: &str) -> Result<Self::Document, RenderError>;

    /// Look up a 1-indexed page.
    async fn get_page(
        &self,
        document: &Self::Document,
        page_number: u32,
    ) -> Result<PageHandle, RenderError>;

    /// Render `page` at `scale` and return the surface it was drawn on.
    async fn render_page_to_surface(
        &self,
        document: &Self::Document,
        page: &PageHandle,
        scale: f64,
    ) -> Result<Surface, RenderError>;
}
