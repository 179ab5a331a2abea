//! Mapping normalized anchors onto a rendered page.
//!
//! For a surface of `W × H` pixels, an anchor `{x0, y0, x1, y1}` becomes
//! the rectangle `{x0·W, y0·H, (x1−x0)·W, (y1−y0)·H}`, widened to a
//! minimum visible size so zero-area boxes still show up. Anchors that
//! fail [`BBoxNorm::is_valid`] are skipped.

use serde::Serialize;

use crate::models::{Anchor, AnchorId, BBoxNorm};
use crate::render::Surface;

/// Default viewport scale factor.
pub const DEFAULT_SCALE: f64 = 1.5;

/// Distance kept above a focused highlight when scrolling to it.
pub const SCROLL_MARGIN: f64 = 100.0;

/// Minimum highlight size in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinSize {
    pub width: f64,
    pub height: f64,
}

impl Default for MinSize {
    fn default() -> Self {
        Self {
            width: 10.0,
            height: 8.0,
        }
    }
}

/// An absolutely positioned rectangle in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PixelRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Convert a normalized box to pixels on a `width × height` surface.
pub fn to_pixel_rect(bbox: &BBoxNorm, width: u32, height: u32, min: MinSize) -> PixelRect {
    let w = f64::from(width);
    let h = f64::from(height);
    PixelRect {
        left: bbox.x0 * w,
        top: bbox.y0 * h,
        width: ((bbox.x1 - bbox.x0) * w).max(min.width),
        height: ((bbox.y1 - bbox.y0) * h).max(min.height),
    }
}

/// One overlay element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Highlight {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_id: Option<AnchorId>,
    pub rect: PixelRect,
    /// The anchor named in the viewer fragment.
    pub focused: bool,
}

/// The overlay computed for one page view.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OverlayPlan {
    pub highlights: Vec<Highlight>,
    /// Anchors on this page dropped for out-of-range coordinates.
    pub skipped: usize,
    /// Vertical scroll offset that brings the focused highlight into view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scroll_to: Option<f64>,
}

/// Build the overlay for `surface.page` from a document's anchor list.
///
/// Only anchors whose page equals the surface's page are considered.
pub fn plan_overlay(
    anchors: &[Anchor],
    surface: &Surface,
    min: MinSize,
    focus: Option<&str>,
) -> OverlayPlan {
    let mut plan = OverlayPlan::default();

    for anchor in anchors.iter().filter(|a| a.page == surface.page) {
        if !anchor.bbox_norm.is_valid() {
            plan.skipped += 1;
            continue;
        }
        let rect = to_pixel_rect(&anchor.bbox_norm, surface.width, surface.height, min);
        let focused = match (focus, &anchor.id) {
            (Some(f), Some(id)) => id.as_str() == f,
            _ => false,
        };
        if focused && plan.scroll_to.is_none() {
            plan.scroll_to = Some((rect.top - SCROLL_MARGIN).max(0.0));
        }
        plan.highlights.push(Highlight {
            anchor_id: anchor.id.clone(),
            rect,
            focused,
        });
    }
    plan
}
