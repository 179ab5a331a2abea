//! Resolving chat citation markers to viewer targets.
//!
//! A [`ReferenceResolver`] wraps the reference map of one chat turn. It
//! segments answer text for display and turns a clicked marker into a
//! navigation request on a caller-supplied [`Navigator`].
//!
//! # Click rules
//!
//! | Descriptor | Navigation |
//! |------------|------------|
//! | `file_id` + non-empty `pages` | `/viewer/<file_id>#page=<p>[&anchor=<id>]` |
//! | `file_id` only | `/viewer/<file_id>` |
//! | missing / no `file_id` | none |
//!
//! `<p>` is the first occurrence's page, or 1 when that page is absent
//! or zero. The click callback is invoked in every case.

use crate::citations::{split_citations, Segment};
use crate::models::{ReferenceDescriptor, ReferenceMap};
use crate::route::ViewerTarget;

/// Opens viewer URLs in a context separate from the originating chat.
pub trait Navigator {
    fn open_in_new_context(&mut self, url: &str);
}

/// A navigator that records every URL it is asked to open.
#[derive(Debug, Default, Clone)]
pub struct RecordingNavigator {
    pub opened: Vec<String>,
}

impl Navigator for RecordingNavigator {
    fn open_in_new_context(&mut self, url: &str) {
        self.opened.push(url.to_string());
    }
}

/// Compute the viewer target for a descriptor, if it names a file.
pub fn target_for(descriptor: &ReferenceDescriptor) -> Option<ViewerTarget> {
    let file_id = descriptor.file_id.as_deref().filter(|f| !f.is_empty())?;
    match descriptor.pages.first() {
        Some(first) => {
            let page = first.page.filter(|p| *p > 0).unwrap_or(1);
            let anchor = descriptor.anchor_id.as_ref().map(|a| a.to_string());
            Some(ViewerTarget::page(file_id, page, anchor))
        }
        None => Some(ViewerTarget::document(file_id)),
    }
}

/// Segments answer text and resolves marker clicks for one chat turn.
pub struct ReferenceResolver<'r> {
    references: &'r ReferenceMap,
}

impl<'r> ReferenceResolver<'r> {
    pub fn new(references: &'r ReferenceMap) -> Self {
        Self { references }
    }

    pub fn segments<'t>(&self, text: &'t str) -> Vec<Segment<'t>> {
        split_citations(text)
    }

    pub fn descriptor(&self, index: u32) -> Option<&'r ReferenceDescriptor> {
        self.references.get(&index)
    }

    /// Handle a click on marker `[index]`.
    ///
    /// Navigates when the descriptor resolves to a target, then calls
    /// `on_click` with the (possibly missing) descriptor. Returns the
    /// target that was opened.
    pub fn click<N, F>(&self, index: u32, navigator: &mut N, on_click: F) -> Option<ViewerTarget>
    where
        N: Navigator + ?Sized,
        F: FnOnce(Option<&ReferenceDescriptor>),
    {
        let descriptor = self.descriptor(index);
        let target = descriptor.and_then(target_for);
        if let Some(t) = &target {
            navigator.open_in_new_context(&t.url());
        }
        on_click(descriptor);
        target
    }

    /// Every distinct marker in `text` paired with its resolved target.
    pub fn resolve_all(&self, text: &str) -> Vec<(u32, Option<ViewerTarget>)> {
        crate::citations::cited_indices(text)
            .into_iter()
            .map(|i| (i, self.descriptor(i).and_then(target_for)))
            .collect()
    }
}
