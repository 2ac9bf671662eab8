//! Typed records flowing between pipeline stages.
//!
//! Every stage consumes and produces streams of these records; they are
//! what gets spilled to JSONL at stage boundaries. Records are immutable
//! once emitted.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use ledgerline_core::{Header, Word};
use serde::{Deserialize, Serialize};

use ledgerline_core::headers::{BALANCE, DATE};

/// Horizontal span `(x_left, x_right)` of one column on one page.
pub type Span = (f64, f64);

/// Left sentinel for the first column's opened range.
///
/// Finite stand-ins for minus/plus infinity keep the records
/// JSON-representable.
pub const OPEN_LEFT: f64 = -100_000.0;
/// Right sentinel for the last column's opened range.
pub const OPEN_RIGHT: f64 = 100_000.0;

/// The detected header row, emitted once per document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderSet {
    /// Header labels in left-to-right order.
    pub headers: Vec<Header>,
    /// Page the headers were detected on.
    pub source_page: usize,
    /// Words seen while scanning for the header row.
    pub total_words: usize,
}

impl HeaderSet {
    /// Whether this header set was copied forward from a previous page.
    pub fn is_copy(&self) -> bool {
        self.headers.iter().any(|h| h.is_copy)
    }
}

/// Cleaned words for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageWords {
    pub page_number: usize,
    pub words: Vec<Word>,
    pub word_count: usize,
}

/// Column spans for one page, keyed by header label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageColumnRanges {
    pub page_number: usize,
    pub ranges: BTreeMap<String, Span>,
    pub vertical_rule_count: usize,
}

/// Words grouped under their assigned header for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageColumnGroups {
    pub page_number: usize,
    pub groups: BTreeMap<String, Vec<Word>>,
    pub word_count: usize,
}

/// A candidate or merged table row: sparse label-to-text fields plus the
/// bounding box of the contributing words.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub fields: BTreeMap<String, String>,
    pub y_top: f64,
    pub y_bottom: f64,
    pub x_left: f64,
    pub x_right: f64,
}

impl Row {
    /// An empty row anchored at the given bounds.
    pub fn new(y_top: f64, y_bottom: f64, x_left: f64, x_right: f64) -> Self {
        Self {
            fields: BTreeMap::new(),
            y_top,
            y_bottom,
            x_left,
            x_right,
        }
    }

    /// The non-empty value of a field, if present.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }

    /// True when the field holds a non-empty value.
    pub fn has_value(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Labels of all non-empty fields.
    pub fn populated_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .map(|(k, _)| k.as_str())
    }

    /// A row is a valid anchor iff both date and balance hold values.
    pub fn is_valid(&self) -> bool {
        self.has_value(DATE) && self.has_value(BALANCE)
    }

    /// Grow this row's bounding box to encompass `other`'s.
    pub fn expand_bounds(&mut self, other: &Row) {
        self.y_top = self.y_top.min(other.y_top);
        self.y_bottom = self.y_bottom.max(other.y_bottom);
        self.x_left = self.x_left.min(other.x_left);
        self.x_right = self.x_right.max(other.x_right);
    }

    /// Average row height of a slice of rows, with a fallback when no row
    /// has usable bounds.
    pub fn average_height(rows: &[Row]) -> f64 {
        let heights: Vec<f64> = rows
            .iter()
            .map(|r| r.y_bottom - r.y_top)
            .filter(|h| *h > 0.0)
            .collect();
        if heights.is_empty() {
            10.0
        } else {
            heights.iter().sum::<f64>() / heights.len() as f64
        }
    }
}

/// Rows for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRows {
    pub page_number: usize,
    pub rows: Vec<Row>,
    pub row_count: usize,
}

/// A typed, validated transaction row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Transaction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub particulars: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    /// Columns outside the canonical vocabulary, passed through verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
    #[serde(default)]
    pub page_number: usize,
}

impl Transaction {
    /// Validity rule for emitted transactions.
    pub fn is_valid(&self) -> bool {
        self.date.is_some() && (self.balance.is_some() || self.amount.is_some())
    }
}
