//! ledgerline: geometric table reconstruction for bank-statement PDFs.
//!
//! The input is the positional word list an upstream PDF extractor emits
//! per page; the output is a normalized, typed transaction ledger plus a
//! score measuring the internal arithmetic consistency of the running
//! balance. Reconstruction is a chain of eight streaming stages:
//!
//! 1. [`stages::header_extract`] — discover the table header row
//! 2. [`stages::header_recognize`] — canonicalize header labels
//! 3. [`stages::clean_data`] — split dotted fillers, cut pre-table words
//! 4. [`stages::column_range`] — assign each header a horizontal span
//! 5. [`stages::column_groups`] — map words to their column
//! 6. [`stages::build_rows`] — cluster words into candidate rows
//! 7. [`stages::merge_rows`] — repair fragmented rows
//! 8. [`stages::format_clean`] — type, validate, and normalize rows
//!
//! [`score`] checks the running balance and [`output`] materializes the
//! downloads. [`pipeline::run_job`] wires it all together against the job
//! store and object store.
//!
//! This crate performs no PDF parsing; byte-to-word extraction sits behind
//! the [`source::PageSource`] seam.

pub mod config;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod output;
pub mod pipeline;
pub mod records;
pub mod score;
pub mod source;
pub mod spill;
pub mod stages;
pub mod store;

pub use config::Config;
pub use error::{ParseError, Result};
pub use jobs::{JobBackend, JobRequest, JobStatus, JobStore, Mode};
pub use pipeline::{PipelineReport, process_request, run_job};
pub use records::{HeaderSet, PageRows, Row, Transaction};
pub use score::{ScoreMode, ScoreResult, score_transactions};
pub use source::{ExtractedPage, JsonDocument, PageSource};
pub use store::{FsObjectStore, ObjectStore};
