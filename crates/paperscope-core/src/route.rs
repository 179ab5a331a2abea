//! The client-side viewer route: `/viewer/<file_id>#page=<n>[&anchor=<id>]`.
//!
//! The fragment is never sent to a server; it only positions the viewer.

use std::fmt;

/// Where a reference click should take the viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerTarget {
    pub file_id: String,
    /// `None` opens the document without a page fragment.
    pub page: Option<u32>,
    pub anchor: Option<String>,
}

impl ViewerTarget {
    pub fn document(file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            page: None,
            anchor: None,
        }
    }

    pub fn page(file_id: impl Into<String>, page: u32, anchor: Option<String>) -> Self {
        Self {
            file_id: file_id.into(),
            page: Some(page),
            anchor,
        }
    }

    /// Route path plus fragment.
    pub fn url(&self) -> String {
        let mut url = format!("/viewer/{}", self.file_id);
        if let Some(page) = self.page {
            url.push_str(&format!("#page={}", page));
            if let Some(anchor) = &self.anchor {
                url.push_str(&format!("&anchor={}", anchor));
            }
        }
        url
    }

    /// The fragment portion, if any (without the leading `#`).
    pub fn fragment(&self) -> Option<String> {
        self.url().split_once('#').map(|(_, f)| f.to_string())
    }
}

impl fmt::Display for ViewerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// Parsed viewer fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerFragment {
    /// 1-indexed page number.
    pub page: u32,
    pub anchor: Option<String>,
}

impl Default for ViewerFragment {
    fn default() -> Self {
        Self {
            page: 1,
            anchor: None,
        }
    }
}

impl ViewerFragment {
    /// Parse `#page=3&anchor=a7` (leading `#` optional, keys in any order).
    ///
    /// A missing, non-numeric, or zero page yields page 1. Numeric
    /// prefixes are honored (`page=3x` → 3). Unknown keys are ignored.
    pub fn parse(fragment: &str) -> Self {
        let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
        let mut parsed = ViewerFragment::default();

        for pair in fragment.split('&') {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                "page" => parsed.page = parse_page(value),
                "anchor" if !value.is_empty() => parsed.anchor = Some(value.to_string()),
                _ => {}
            }
        }
        parsed
    }
}

fn parse_page(value: &str) -> u32 {
    let digits: String = value
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    match digits.parse::<u32>() {
        Ok(0) | Err(_) => 1,
        Ok(n) => n,
    }
}
