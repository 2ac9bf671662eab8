//! Stage 3: per-page word cleaning.
//!
//! Dotted filler runs (`.....`) glue real tokens together in many statement
//! layouts; this stage splits them apart, re-estimating the sub-word boxes
//! by even character-width distribution, and drops filler-only fragments.
//! On the header's source page everything above the header row is cut.

use std::sync::LazyLock;

use ledgerline_core::words::Word;
use regex::Regex;

use crate::error::Result;
use crate::records::{HeaderSet, PageWords};
use crate::source::PageSource;
use crate::spill::JsonlWriter;
use crate::stages::StageContext;

/// Stream name of this stage.
pub const STAGE: &str = "clean_data";

static DOT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.{3,}").unwrap());

/// Clean every page's words and stream them out page by page.
pub fn run<S: PageSource>(
    source: &S,
    max_pages: usize,
    headers: &HeaderSet,
    ctx: &StageContext<'_>,
) -> Result<usize> {
    let page_count = source.page_count().min(max_pages);
    tracing::info!(page_count, "starting data cleaning");

    let mut writer = JsonlWriter::create(&ctx.stream_path(STAGE))?;
    for index in 0..page_count {
        let page = source.page(index)?;
        let mut words = clean_dot_padded_words(&page.words);

        if index == headers.source_page && !headers.headers.is_empty() {
            words.sort_by(|a, b| a.bbox.top.partial_cmp(&b.bbox.top).unwrap());
            let header_top = headers.headers[0].bbox.top;
            words.retain(|w| w.bbox.top > header_top);
        }

        writer.write(&PageWords {
            page_number: index,
            word_count: words.len(),
            words,
        })?;
    }
    let pages = writer.finish()?;
    ctx.upload_stream(STAGE)?;
    Ok(pages)
}

/// True for filler made of `i` characters, an artifact of dotted leaders in
/// some fonts.
fn is_i_filler(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c == 'i' || c == 'I')
}

/// True for filler made purely of hyphens.
fn is_hyphen_filler(text: &str) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty() && trimmed.chars().all(|c| c == '-')
}

/// Split on dot runs of three or more, keeping the runs as their own parts.
fn split_on_dot_runs(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut last = 0;
    for run in DOT_RUN.find_iter(text) {
        if run.start() > last {
            parts.push(text[last..run.start()].to_string());
        }
        parts.push(run.as_str().to_string());
        last = run.end();
    }
    if last < text.len() {
        parts.push(text[last..].to_string());
    }
    parts.retain(|p| !p.trim().is_empty());
    parts
}

/// Distribute a split word's box over its parts by character count.
fn estimate_boxes(word: &Word, parts: &[String]) -> Vec<Word> {
    let total_chars: usize = parts.iter().map(|p| p.chars().count()).sum();
    if total_chars == 0 {
        return Vec::new();
    }
    let char_width = word.bbox.width() / total_chars as f64;

    let mut boxes = Vec::new();
    let mut current_x = word.bbox.x0;
    for part in parts {
        let part_width = part.chars().count() as f64 * char_width;
        boxes.push(Word::new(
            part.clone(),
            current_x,
            word.bbox.top,
            current_x + part_width,
            word.bbox.bottom,
        ));
        current_x += part_width;
    }
    boxes
}

/// Split dot-padded words and drop filler fragments.
///
/// Words containing no 3+ dot run (and no filler) pass through unchanged.
pub fn clean_dot_padded_words(words: &[Word]) -> Vec<Word> {
    let mut cleaned = Vec::new();
    for word in words {
        if is_hyphen_filler(&word.text) {
            continue;
        }
        if DOT_RUN.is_match(&word.text) || is_i_filler(&word.text) {
            let all_dots = !word.text.is_empty() && word.text.chars().all(|c| c == '.');
            if all_dots || is_i_filler(&word.text) {
                continue;
            }
            let parts = split_on_dot_runs(&word.text);
            if parts.len() > 1 {
                cleaned.extend(
                    estimate_boxes(word, &parts)
                        .into_iter()
                        .filter(|w| !w.text.chars().all(|c| c == '.')),
                );
            } else {
                cleaned.push(word.clone());
            }
        } else {
            cleaned.push(word.clone());
        }
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, x0: f64, x1: f64) -> Word {
        Word::new(text, x0, 100.0, x1, 110.0)
    }

    #[test]
    fn split_preserves_delimiters() {
        assert_eq!(
            split_on_dot_runs("10.00.....928,010.00"),
            vec!["10.00", ".....", "928,010.00"]
        );
    }

    #[test]
    fn words_without_dot_runs_are_identity() {
        let words = vec![
            word("Balance", 0.0, 50.0),
            word("1,000.00", 60.0, 110.0),
            word("a.b", 120.0, 140.0),
        ];
        assert_eq!(clean_dot_padded_words(&words), words);
    }

    #[test]
    fn dot_padded_word_splits_with_estimated_boxes() {
        // 20 chars over 200pt: 10pt per char.
        let input = vec![word("10.00.....928,010.00", 0.0, 200.0)];
        let out = clean_dot_padded_words(&input);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].text, "10.00");
        assert_eq!(out[0].bbox.x0, 0.0);
        assert_eq!(out[0].bbox.x1, 50.0);
        // The dot run itself is discarded; the second number starts after it.
        assert_eq!(out[1].text, "928,010.00");
        assert_eq!(out[1].bbox.x0, 100.0);
        assert_eq!(out[1].bbox.x1, 200.0);
    }

    #[test]
    fn pure_fillers_are_dropped() {
        let input = vec![
            word(".......", 0.0, 70.0),
            word("iiii", 80.0, 110.0),
            word("----", 120.0, 150.0),
            word("keep", 160.0, 200.0),
        ];
        let out = clean_dot_padded_words(&input);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "keep");
    }

    #[test]
    fn filler_predicates() {
        assert!(is_i_filler("iIiI"));
        assert!(!is_i_filler("in"));
        assert!(is_hyphen_filler("--- "));
        assert!(!is_hyphen_filler("-5"));
    }
}
