//! Access to the upstream extractor's per-page output.
//!
//! PDF byte-to-word extraction is an external collaborator: the pipeline
//! only sees positioned words and rule lines per page, behind the
//! [`PageSource`] seam. [`JsonDocument`] adapts a serialized extractor dump
//! (and doubles as the in-memory source for tests).

use std::fs;
use std::path::Path;

use ledgerline_core::{RuleLine, Word};
use serde::{Deserialize, Serialize};

use crate::error::{ParseError, Result};

/// One page of extractor output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedPage {
    /// Page width in points.
    #[serde(default = "default_width")]
    pub width: f64,
    /// Page height in points.
    #[serde(default = "default_height")]
    pub height: f64,
    /// Positioned words on the page.
    #[serde(default)]
    pub words: Vec<Word>,
    /// Horizontal rule segments.
    #[serde(default)]
    pub horizontal_rules: Vec<RuleLine>,
    /// Vertical rule segments.
    #[serde(default)]
    pub vertical_rules: Vec<RuleLine>,
}

fn default_width() -> f64 {
    612.0
}

fn default_height() -> f64 {
    792.0
}

impl ExtractedPage {
    /// An empty page with default letter dimensions.
    pub fn empty() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            words: Vec::new(),
            horizontal_rules: Vec::new(),
            vertical_rules: Vec::new(),
        }
    }
}

/// A page-by-page view of an extracted document.
///
/// Implementations return owned pages so callers never hold a document-wide
/// cache; memory stays bounded by one page at a time.
pub trait PageSource {
    /// Number of pages available.
    fn page_count(&self) -> usize;

    /// Fetch one page by 0-based index.
    fn page(&self, index: usize) -> Result<ExtractedPage>;
}

/// Extractor dump loaded from JSON (`{"pages": [...]}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonDocument {
    pages: Vec<ExtractedPage>,
}

impl JsonDocument {
    /// Wrap already-extracted pages.
    pub fn from_pages(pages: Vec<ExtractedPage>) -> Self {
        Self { pages }
    }

    /// Load an extractor dump from disk.
    ///
    /// An unreadable file maps to [`ParseError::PdfUnreadable`], malformed
    /// JSON to [`ParseError::PdfCorrupted`].
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|_| ParseError::PdfUnreadable)?;
        serde_json::from_slice(&bytes).map_err(|_| ParseError::PdfCorrupted)
    }
}

impl PageSource for JsonDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page(&self, index: usize) -> Result<ExtractedPage> {
        self.pages
            .get(index)
            .cloned()
            .ok_or_else(|| ParseError::stage("source", format!("page {index} out of range")))
    }
}
