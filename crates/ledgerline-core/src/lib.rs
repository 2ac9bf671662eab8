//! Backend-independent data types and algorithms for ledgerline.
//!
//! This crate provides the foundational types ([`BBox`], [`Word`],
//! [`RuleLine`], [`Header`]) and pure algorithms (row clustering, gap
//! statistics, amount and date parsing, header matching) used by the
//! ledgerline reconstruction pipeline. It performs no I/O.
//!
//! # Modules
//!
//! - [`geometry`] — Geometric primitives: [`BBox`], [`Orientation`]
//! - [`words`] — Extracted words: [`Word`], spatial sorting
//! - [`rules`] — Rule-line segments: [`RuleLine`], crossing tests
//! - [`rows`] — Clustering words into visual rows
//! - [`stats`] — Gap statistics and the data-derived y-merge tolerance
//! - [`amounts`] — Monetary amount parsing
//! - [`dates`] — Date parsing with day-first/month-first inference
//! - [`headers`] — Header vocabulary, keyword tables, fuzzy matching

#![deny(missing_docs)]

/// Monetary amount parsing.
pub mod amounts;
/// Date parsing with locale inference.
pub mod dates;
/// Geometric primitives: BBox, Orientation.
pub mod geometry;
/// Header vocabulary and fuzzy label matching.
pub mod headers;
/// Visual row clustering by top-proximity.
pub mod rows;
/// Rule-line segments from the PDF extractor.
pub mod rules;
/// Gap statistics for data-derived tolerances.
pub mod stats;
/// Word types from the PDF extractor.
pub mod words;

pub use amounts::{currency_to_float, is_nonzero_amount, loose_amount};
pub use dates::{Locale, infer_day_first, is_parseable_date, parse_with_locale, smart_parse};
pub use geometry::{BBox, Orientation};
pub use headers::{Header, map_label, normalize_label, token_sort_ratio};
pub use rows::{RowCluster, cluster_into_rows};
pub use rules::{RuleLine, crosses_horizontal, filter_below};
pub use stats::y_merge_tolerance;
pub use words::{Word, sort_words};
