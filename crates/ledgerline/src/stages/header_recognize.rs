//! Stage 2: canonicalize header labels against the closed vocabulary.
//!
//! Each label is fuzzy-matched against the variant tables; when two labels
//! compete for the same canonical name, only the highest-scoring claimant
//! adopts it and the others keep their original text.

use std::collections::HashMap;

use ledgerline_core::headers::{MAP_ADOPT_SCORE, map_label};

use crate::error::{ParseError, Result};
use crate::records::HeaderSet;
use crate::spill::JsonlWriter;
use crate::stages::StageContext;

/// Stream name of this stage.
pub const STAGE: &str = "header_recognize";

/// Canonicalize the detected header set.
pub fn run(input: &HeaderSet, ctx: &StageContext<'_>) -> Result<HeaderSet> {
    if input.headers.is_empty() {
        return Err(ParseError::HeadersNotFound);
    }
    tracing::info!(total_headers = input.headers.len(), "recognizing headers");

    // First pass: score every label and remember the best claimant per
    // canonical name.
    let mut label_mapping: HashMap<String, (String, i32)> = HashMap::new();
    let mut best_claimant: HashMap<String, (String, i32)> = HashMap::new();
    for header in &input.headers {
        let (mapped, score) = label_mapping
            .entry(header.text.clone())
            .or_insert_with(|| map_label(&header.text))
            .clone();
        let entry = best_claimant
            .entry(mapped)
            .or_insert_with(|| (header.text.clone(), score));
        if score > entry.1 {
            *entry = (header.text.clone(), score);
        }
    }

    // Second pass: only the winning claimant adopts the canonical name.
    let mut recognized = input.clone();
    for header in &mut recognized.headers {
        let original = header.text.clone();
        let (mapped, score) = label_mapping[&original].clone();
        let wins = best_claimant
            .get(&mapped)
            .is_some_and(|(claimant, _)| claimant == &original);
        if wins && score >= MAP_ADOPT_SCORE {
            tracing::debug!(
                original = original.as_str(),
                mapped = mapped.as_str(),
                score,
                "header label canonicalized"
            );
            header.text = mapped;
        }
        header.original_text = Some(original);
    }

    let mut writer = JsonlWriter::create(&ctx.stream_path(STAGE))?;
    writer.write(&recognized)?;
    writer.finish()?;
    ctx.upload_stream(STAGE)?;
    Ok(recognized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spill::SpillDir;
    use crate::store::FsObjectStore;
    use ledgerline_core::Header;

    fn run_on(labels: &[&str]) -> HeaderSet {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path().join("bucket")).unwrap();
        let spill = SpillDir::for_job("recognize-test").unwrap();
        let ctx = StageContext {
            job_id: "recognize-test",
            user_id: None,
            spill_prefix: "bank-statements",
            spill: &spill,
            store: &store,
        };
        let headers = labels
            .iter()
            .enumerate()
            .map(|(i, label)| Header::new(*label, i as f64 * 100.0, 100.0, i as f64 * 100.0 + 50.0, 110.0))
            .collect();
        let input = HeaderSet {
            headers,
            source_page: 0,
            total_words: 42,
        };
        run(&input, &ctx).unwrap()
    }

    #[test]
    fn canonicalizes_known_variants() {
        let out = run_on(&["Txn Date", "Narration", "Withdrawals", "Deposits", "Balance"]);
        let texts: Vec<&str> = out.headers.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, ["date", "particulars", "debit", "credit", "balance"]);
    }

    #[test]
    fn preserves_original_text() {
        let out = run_on(&["Txn Date"]);
        assert_eq!(out.headers[0].text, "date");
        assert_eq!(out.headers[0].original_text.as_deref(), Some("Txn Date"));
    }

    #[test]
    fn unknown_labels_pass_through() {
        let out = run_on(&["Date", "Branch Code"]);
        assert_eq!(out.headers[1].text, "Branch Code");
        assert_eq!(out.headers[1].original_text.as_deref(), Some("Branch Code"));
    }

    #[test]
    fn only_best_claimant_adopts_canonical() {
        // Both map toward "date"; the exact match must win and the weaker
        // claimant must keep its original text.
        let out = run_on(&["Date", "Value Dt"]);
        assert_eq!(out.headers[0].text, "date");
        assert_eq!(out.headers[1].text, "Value Dt");
    }

    #[test]
    fn pass_through_counts() {
        let out = run_on(&["Date", "Balance"]);
        assert_eq!(out.source_page, 0);
        assert_eq!(out.total_words, 42);
    }

    #[test]
    fn empty_headers_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path().join("bucket")).unwrap();
        let spill = SpillDir::for_job("recognize-empty").unwrap();
        let ctx = StageContext {
            job_id: "recognize-empty",
            user_id: None,
            spill_prefix: "bank-statements",
            spill: &spill,
            store: &store,
        };
        let input = HeaderSet {
            headers: vec![],
            source_page: 0,
            total_words: 0,
        };
        assert!(matches!(run(&input, &ctx), Err(ParseError::HeadersNotFound)));
    }
}
