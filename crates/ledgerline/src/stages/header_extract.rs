//! Stage 1: find the one row of words that functions as the table header.
//!
//! The input carries no table structure, so the header row has to be
//! discovered by clustering words into visual rows, scoring each row for
//! header-likeness, and then repairing the winner (multi-line labels,
//! split labels, stray fragments).

use ledgerline_core::headers::{self, DATA_CONTEXT_WORDS, Header};
use ledgerline_core::rows::cluster_into_rows;
use ledgerline_core::words::{Word, sort_words};

use crate::error::{ParseError, Result};
use crate::records::HeaderSet;
use crate::source::PageSource;
use crate::spill::JsonlWriter;
use crate::stages::StageContext;

/// Stream name of this stage.
pub const STAGE: &str = "header_extract";

/// Vertical tolerance when clustering words into candidate rows.
const ROW_TOLERANCE: f64 = 5.0;
/// Candidates above this score are trusted enough to look for multi-line
/// header continuations.
const STRONG_CANDIDATE_SCORE: f64 = 30.0;
/// Longest text admitted as a header label.
const MAX_HEADER_LEN: usize = 50;

/// Run header extraction over the document's pages.
///
/// Emits a single [`HeaderSet`] record from the first page that has words.
/// Fails with [`ParseError::PdfImageBased`] when no page has extractable
/// text and [`ParseError::HeadersNotFound`] when the first wordy page
/// yields no header candidates.
pub fn run<S: PageSource>(
    source: &S,
    max_pages: usize,
    ctx: &StageContext<'_>,
) -> Result<HeaderSet> {
    let page_count = source.page_count().min(max_pages);
    tracing::info!(page_count, "starting header extraction");

    let mut total_words = 0;
    for index in 0..page_count {
        let page = source.page(index)?;
        total_words += page.words.len();
        if page.words.is_empty() {
            tracing::debug!(page_number = index, "page has no words, skipping");
            continue;
        }

        let mut words = page.words.clone();
        sort_words(&mut words);
        let header_words = extract_headers(&words, page.width);
        if header_words.is_empty() {
            return Err(ParseError::HeadersNotFound);
        }

        let mut header_list: Vec<Header> = header_words
            .into_iter()
            .map(|w| Header::new(w.text, w.bbox.x0, w.bbox.top, w.bbox.x1, w.bbox.bottom))
            .collect();
        header_list.sort_by(|a, b| a.bbox.x0.partial_cmp(&b.bbox.x0).unwrap());

        tracing::info!(
            page_number = index,
            header_count = header_list.len(),
            "header row detected"
        );
        let set = HeaderSet {
            headers: header_list,
            source_page: index,
            total_words,
        };

        let mut writer = JsonlWriter::create(&ctx.stream_path(STAGE))?;
        writer.write(&set)?;
        writer.finish()?;
        ctx.upload_stream(STAGE)?;
        return Ok(set);
    }

    Err(ParseError::PdfImageBased)
}

/// Detect and repair the header row among a page's words.
fn extract_headers(words: &[Word], page_width: f64) -> Vec<Word> {
    let rows = cluster_into_rows(words, ROW_TOLERANCE);

    let mut candidates: Vec<(f64, Vec<Word>)> = Vec::new();
    for row in rows {
        let has_keyword = row
            .words
            .iter()
            .any(|w| headers::header_keywords().contains(&w.text.to_lowercase().as_str()));
        if !has_keyword && row.words.len() < 3 {
            continue;
        }
        let score = score_header_row(&row.words, page_width);
        if score > 0.0 {
            candidates.push((score, row.words));
        }
    }

    // Highest score wins; on ties the earlier (higher-on-page) row does.
    let mut best: Option<(f64, Vec<Word>)> = None;
    for (score, row) in candidates {
        if best.as_ref().is_none_or(|(s, _)| score > *s) {
            best = Some((score, row));
        }
    }
    let Some((best_score, best_row)) = best else {
        return Vec::new();
    };

    let final_headers = if best_score > STRONG_CANDIDATE_SCORE {
        let extended = extend_multiline_region(words, &best_row);
        let merged = merge_horizontally(&extended);
        if extended.len() > best_row.len() {
            merge_vertically_by_column(&merged)
        } else {
            merged
        }
    } else {
        merge_horizontally(&best_row)
    };

    filter_and_clean(final_headers)
}

/// Score a candidate row for header-likeness.
fn score_header_row(row_words: &[Word], page_width: f64) -> f64 {
    let keyword_set = headers::header_keywords();
    let mut score = 0.0;

    let mut keyword_matches = 0;
    for word in row_words {
        let lower = word.text.to_lowercase();
        if keyword_set.contains(&lower.as_str()) {
            keyword_matches += 2;
        } else if keyword_set.iter().any(|kw| lower.contains(kw)) {
            keyword_matches += 1;
        }
    }
    score += keyword_matches as f64 * 10.0;

    match row_words.len() {
        3..=8 => score += 15.0,
        n if n > 8 => score -= 5.0,
        _ => {}
    }

    if row_words.len() >= 2 {
        let min_x = row_words.iter().map(|w| w.bbox.x0).fold(f64::MAX, f64::min);
        let max_x = row_words.iter().map(|w| w.bbox.x0).fold(f64::MIN, f64::max);
        if (max_x - min_x) / page_width > 0.6 {
            score += 10.0;
        }
    }

    let row_text = row_words
        .iter()
        .map(|w| w.text.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    if row_text.contains("date")
        && (row_text.contains("amount") || row_text.contains("debit") || row_text.contains("credit"))
    {
        score += 20.0;
    }
    if row_text.contains("balance") {
        score += 10.0;
    }

    let numeric = row_words
        .iter()
        .filter(|w| headers::is_pure_number(&w.text))
        .count();
    if numeric as f64 > row_words.len() as f64 * 0.5 {
        score -= 15.0;
    }

    let date_shaped = row_words
        .iter()
        .filter(|w| headers::is_date_shaped(&w.text))
        .count();
    if date_shaped > 1 {
        score -= 20.0;
    }

    score
}

/// Pull likely header continuations from directly above and below the seed
/// row. Words below face much stricter filters than words above, since the
/// line below a header is almost always data.
fn extend_multiline_region(words: &[Word], seed_row: &[Word]) -> Vec<Word> {
    if seed_row.is_empty() {
        return seed_row.to_vec();
    }

    let seed_top = seed_row.iter().map(|w| w.bbox.top).fold(f64::MAX, f64::min);
    let seed_bottom = seed_row
        .iter()
        .map(|w| w.bbox.bottom)
        .fold(f64::MIN, f64::max);
    let avg_height =
        seed_row.iter().map(Word::height).sum::<f64>() / seed_row.len() as f64;

    let mut extended = seed_row.to_vec();
    for word in words {
        let text = word.text.trim();
        let top = word.bbox.top;

        if seed_top - avg_height * 0.8 <= top && top < seed_top - 2.0 {
            if is_likely_header_word(word) {
                extended.push(word.clone());
            }
        } else if seed_bottom + 2.0 < top && top <= seed_bottom + avg_height * 0.3 {
            if looks_like_data(text) {
                continue;
            }
            // Cells like "Opening Balance" carry header keywords but are
            // data context, never label continuations.
            let lower = text.to_lowercase();
            if ["opening", "closing", "available", "current"]
                .iter()
                .any(|prefix| lower.contains(prefix))
            {
                continue;
            }
            let center = word.bbox.x_center();
            let aligned = seed_row
                .iter()
                .any(|seed| (center - seed.bbox.x_center()).abs() < avg_height * 2.0);
            if aligned
                && is_likely_header_word(word)
                && headers::has_alphabetic(text)
                && text.len() < 20
            {
                extended.push(word.clone());
            }
        }
    }
    extended
}

fn looks_like_data(text: &str) -> bool {
    headers::is_pure_number(text)
        || headers::is_date_shaped(text)
        || headers::is_currency_shaped(text)
        || headers::is_dr_cr(text)
}

/// Whether a word plausibly belongs to a header label.
fn is_likely_header_word(word: &Word) -> bool {
    let original = word.text.trim();
    let text = original.to_lowercase();

    // Standalone DR/CR is data; "Dr/Cr" with a slash is a header.
    if headers::is_dr_cr(original) {
        return false;
    }
    if looks_like_data(original) {
        return false;
    }

    if DATA_CONTEXT_WORDS.contains(&text.as_str()) {
        return false;
    }
    for prefix in DATA_CONTEXT_WORDS {
        if text.starts_with(&format!("{prefix} "))
            && (text.contains("balance") || text.contains("amount"))
        {
            return false;
        }
    }

    let keyword_set = headers::header_keywords();
    if !text.contains(' ') && keyword_set.contains(&text.as_str()) {
        return true;
    }

    if text.contains(' ') {
        // Multi-word phrases need to be known header phrases; anything else
        // ("Opening Balance") is more likely data.
        const HEADER_PHRASES: [&str; 10] = [
            "transaction date",
            "value date",
            "posting date",
            "transaction details",
            "transaction description",
            "debit amount",
            "credit amount",
            "running balance",
            "reference number",
            "cheque number",
        ];
        return HEADER_PHRASES.contains(&text.as_str());
    }

    // Single token containing a keyword as a whole word ("txn" in "txn-id").
    let tokens: Vec<&str> = text
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    if tokens
        .iter()
        .any(|t| keyword_set.contains(t))
    {
        return true;
    }

    if matches!(text.as_str(), "no" | "no." | "#") {
        return true;
    }
    let bracketed = (text.starts_with('(') && text.ends_with(')'))
        || (text.starts_with('[') && text.ends_with(']'));
    if bracketed && headers::has_alphabetic(&text) {
        return true;
    }

    false
}

/// Merge horizontally adjacent fragments into single labels.
///
/// The gap tolerance adapts to the row's average character width so tight
/// and loose typography both merge correctly.
fn merge_horizontally(header_words: &[Word]) -> Vec<Word> {
    if header_words.is_empty() {
        return Vec::new();
    }

    let mut sorted = header_words.to_vec();
    sorted.sort_by(|a, b| a.bbox.x0.partial_cmp(&b.bbox.x0).unwrap());

    let tolerance = if sorted.len() > 1 {
        let avg_char_width = sorted
            .iter()
            .map(|h| h.bbox.width() / h.text.chars().count().max(1) as f64)
            .sum::<f64>()
            / sorted.len() as f64;
        avg_char_width * 2.0
    } else {
        6.0
    };

    let mut merged = Vec::new();
    let mut current = sorted[0].clone();
    for header in &sorted[1..] {
        let gap = header.bbox.x0 - current.bbox.x1;
        if gap <= tolerance && gap >= -2.0 {
            current.text.push(' ');
            current.text.push_str(&header.text);
            current.bbox.x1 = header.bbox.x1;
        } else {
            merged.push(current);
            current = header.clone();
        }
    }
    merged.push(current);
    merged
}

/// Column boundaries from the gap structure of the header x-extents.
fn column_boundaries(header_words: &[Word]) -> Vec<(f64, f64)> {
    if header_words.is_empty() {
        return Vec::new();
    }

    let mut positions: Vec<f64> = header_words
        .iter()
        .flat_map(|w| [w.bbox.x0, w.bbox.x1])
        .collect();
    positions.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let max_x = *positions.last().unwrap();

    let mut gaps = Vec::new();
    for pair in positions.windows(2) {
        let gap = pair[1] - pair[0];
        if gap > 10.0 {
            gaps.push((pair[0], pair[1], gap));
        }
    }

    if gaps.is_empty() {
        return vec![(positions[0], max_x)];
    }

    let mut gap_sizes: Vec<f64> = gaps.iter().map(|g| g.2).collect();
    gap_sizes.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let median_gap = gap_sizes[gap_sizes.len() / 2];

    let mut boundaries = Vec::new();
    let mut last_end = 0.0;
    for (start, end, size) in gaps {
        if size > median_gap * 1.5 {
            boundaries.push((last_end, start));
            last_end = end;
        }
    }
    boundaries.push((last_end, max_x));
    boundaries
}

/// Merge stacked label fragments within each detected column.
fn merge_vertically_by_column(header_words: &[Word]) -> Vec<Word> {
    if header_words.is_empty() {
        return Vec::new();
    }

    let boundaries = column_boundaries(header_words);
    let mut columns: Vec<Vec<Word>> = vec![Vec::new(); boundaries.len()];
    for header in header_words {
        let center = header.bbox.x_center();
        if let Some(slot) = boundaries
            .iter()
            .position(|(start, end)| *start <= center && center <= *end)
        {
            columns[slot].push(header.clone());
        }
    }

    let mut merged = Vec::new();
    for mut column in columns {
        if column.is_empty() {
            continue;
        }
        column.sort_by(|a, b| a.bbox.top.partial_cmp(&b.bbox.top).unwrap());

        let mut current = column[0].clone();
        for header in &column[1..] {
            let text = header.text.trim();
            let is_single_digit = text.len() == 1 && text.chars().all(|c| c.is_ascii_digit());
            if looks_like_data(text) || is_single_digit {
                merged.push(current);
                current = header.clone();
                continue;
            }

            let gap = header.bbox.top - current.bbox.bottom;
            let avg_height = (current.height() + header.height()) / 2.0;
            if (0.0..=avg_height * 0.5).contains(&gap)
                && text.len() > 1
                && !matches!(text, "/" | "-" | "|" | "(" | ")")
            {
                current.text.push(' ');
                current.text.push_str(&header.text);
                // The bottom is deliberately not extended: keeping the seed
                // row's boundary keeps data rows out of the header band.
            } else {
                merged.push(current);
                current = header.clone();
            }
        }
        merged.push(current);
    }
    merged
}

/// Drop fragments that cannot be labels and trim the survivors.
fn filter_and_clean(header_words: Vec<Word>) -> Vec<Word> {
    header_words
        .into_iter()
        .filter_map(|mut header| {
            let text = header.text.trim().to_string();
            if !headers::has_alphabetic(&text) {
                return None;
            }
            if headers::is_pure_number(&text) {
                return None;
            }
            if text.len() > MAX_HEADER_LEN {
                return None;
            }
            header.text = text;
            Some(header)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, x0: f64, top: f64, x1: f64) -> Word {
        Word::new(text, x0, top, x1, top + 10.0)
    }

    fn header_row() -> Vec<Word> {
        vec![
            word("Date", 10.0, 100.0, 40.0),
            word("Particulars", 100.0, 100.0, 170.0),
            word("Debit", 250.0, 100.0, 290.0),
            word("Credit", 350.0, 100.0, 395.0),
            word("Balance", 450.0, 100.0, 500.0),
        ]
    }

    #[test]
    fn scores_header_row_above_data_row() {
        let header_score = score_header_row(&header_row(), 600.0);
        let data = vec![
            word("01/02/2024", 10.0, 130.0, 60.0),
            word("100.00", 250.0, 130.0, 290.0),
            word("1,000.00", 450.0, 130.0, 500.0),
        ];
        let data_score = score_header_row(&data, 600.0);
        assert!(header_score > STRONG_CANDIDATE_SCORE);
        assert!(data_score < header_score);
    }

    #[test]
    fn extracts_header_row_from_mixed_page() {
        let mut words = header_row();
        words.extend([
            word("01/02/2024", 10.0, 130.0, 60.0),
            word("UPI", 100.0, 130.0, 130.0),
            word("100.00", 250.0, 130.0, 290.0),
            word("1,000.00", 450.0, 130.0, 500.0),
        ]);
        let extracted = extract_headers(&words, 600.0);
        let texts: Vec<&str> = extracted.iter().map(|w| w.text.as_str()).collect();
        assert!(texts.contains(&"Date"));
        assert!(texts.contains(&"Balance"));
        assert!(!texts.contains(&"01/02/2024"));
        assert!(!texts.contains(&"100.00"));
    }

    #[test]
    fn opening_balance_below_header_is_not_merged() {
        let mut words = header_row();
        // Just below the header, a data-context cell.
        words.push(word("Opening Balance", 440.0, 112.5, 520.0));
        let extracted = extract_headers(&words, 600.0);
        assert!(
            extracted
                .iter()
                .all(|w| !w.text.to_lowercase().contains("opening"))
        );
    }

    #[test]
    fn split_label_merges_horizontally() {
        let fragments = vec![
            word("Tran", 100.0, 100.0, 128.0),
            word("Date", 130.0, 100.0, 158.0),
        ];
        let merged = merge_horizontally(&fragments);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].text, "Tran Date");
        assert_eq!(merged[0].bbox.x1, 158.0);
    }

    #[test]
    fn distant_labels_stay_separate() {
        let labels = vec![
            word("Date", 10.0, 100.0, 40.0),
            word("Balance", 400.0, 100.0, 450.0),
        ];
        assert_eq!(merge_horizontally(&labels).len(), 2);
    }

    #[test]
    fn stacked_label_merges_vertically() {
        // Left column: three fragments with small intra-column gaps so the
        // inter-column gap registers as significant. Right column: a
        // stacked two-line label.
        let fragments = vec![
            word("Txn", 10.0, 100.0, 35.0),
            word("Ref", 50.0, 100.0, 80.0),
            word("No", 95.0, 100.0, 120.0),
            word("Withdrawal", 300.0, 100.0, 370.0),
            word("Amount", 305.0, 112.0, 365.0),
        ];
        let merged = merge_vertically_by_column(&fragments);
        let texts: Vec<&str> = merged.iter().map(|w| w.text.as_str()).collect();
        assert!(texts.contains(&"Withdrawal Amount"));
        assert!(texts.contains(&"Txn"));
    }

    #[test]
    fn numeric_tail_is_not_merged_vertically() {
        let fragments = vec![
            word("Balance", 450.0, 100.0, 500.0),
            word("1,000.00", 452.0, 112.0, 505.0),
        ];
        let merged = merge_vertically_by_column(&fragments);
        assert!(merged.iter().any(|w| w.text == "Balance"));
        assert!(merged.iter().all(|w| w.text != "Balance 1,000.00"));
    }

    #[test]
    fn filter_drops_non_labels() {
        let raw = vec![
            word("Date", 10.0, 100.0, 40.0),
            word("1,234.00", 100.0, 100.0, 150.0),
            word("===", 200.0, 100.0, 230.0),
        ];
        let kept = filter_and_clean(raw);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].text, "Date");
    }

    #[test]
    fn likely_header_word_rules() {
        assert!(is_likely_header_word(&word("Balance", 0.0, 0.0, 10.0)));
        assert!(is_likely_header_word(&word("Value Date", 0.0, 0.0, 10.0)));
        assert!(!is_likely_header_word(&word("CR", 0.0, 0.0, 10.0)));
        assert!(!is_likely_header_word(&word("Opening Balance", 0.0, 0.0, 10.0)));
        assert!(!is_likely_header_word(&word("1,000.00", 0.0, 0.0, 10.0)));
        assert!(is_likely_header_word(&word("no.", 0.0, 0.0, 10.0)));
    }
}
