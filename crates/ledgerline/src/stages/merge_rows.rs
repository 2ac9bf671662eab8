//! Stage 7: repair fragmented rows.
//!
//! Wrapped cells and split dates leave the row builder with fragments. Two
//! passes repair them: anchor rows (date + balance present) absorb nearby
//! incomplete rows when a confidence score clears the threshold, then the
//! remaining fragments are paired greedily when their union forms a valid
//! row.

use std::collections::BTreeSet;

use ledgerline_core::amounts::is_nonzero_amount;
use ledgerline_core::dates::is_parseable_date;
use ledgerline_core::headers::{BALANCE, CREDIT, DATE, DEBIT, PARTICULARS};

use crate::error::Result;
use crate::records::{PageRows, Row};
use crate::spill::{JsonlReader, JsonlWriter};
use crate::stages::StageContext;
use crate::stages::build_rows;

/// Stream name of this stage.
pub const STAGE: &str = "merge_rows";

/// Confidence needed to merge an incomplete row into an anchor.
pub const ANCHOR_MERGE_THRESHOLD: f64 = 0.3;
/// Confidence needed to merge two incomplete rows; pairs must clear a
/// higher bar since neither side is trusted.
pub const PAIR_MERGE_THRESHOLD: f64 = 0.4;

const AMOUNT_FIELDS: [&str; 3] = [DEBIT, CREDIT, BALANCE];

/// Merge fragmented rows page by page.
pub fn run(ctx: &StageContext<'_>) -> Result<()> {
    tracing::info!("starting row merging");
    let reader: JsonlReader<PageRows> = JsonlReader::open(&ctx.stream_path(build_rows::STAGE))?;
    let mut writer = JsonlWriter::create(&ctx.stream_path(STAGE))?;

    for item in reader {
        let item = item?;
        let original_count = item.rows.len();

        let (mut merged, leftovers) = merge_with_anchors(item.rows);
        let leftover_count = leftovers.len();
        merged.extend(merge_incomplete_pairs(leftovers));
        merged.sort_by(|a, b| a.y_top.partial_cmp(&b.y_top).unwrap());

        tracing::debug!(
            page_number = item.page_number,
            original_count,
            merged_count = merged.len(),
            leftover_count,
            "page rows merged"
        );

        writer.write(&PageRows {
            page_number: item.page_number,
            row_count: merged.len(),
            rows: merged,
        })?;
    }

    writer.finish()?;
    ctx.upload_stream(STAGE)?;
    Ok(())
}

/// Pass 1: absorb incomplete rows into their nearest anchors.
///
/// Returns the anchored rows and the leftovers no anchor claimed.
fn merge_with_anchors(mut rows: Vec<Row>) -> (Vec<Row>, Vec<Row>) {
    if rows.is_empty() {
        return (Vec::new(), Vec::new());
    }
    rows.sort_by(|a, b| a.y_top.partial_cmp(&b.y_top).unwrap());

    let anchor_indices: Vec<usize> = rows
        .iter()
        .enumerate()
        .filter(|(_, row)| row.is_valid())
        .map(|(i, _)| i)
        .collect();
    if anchor_indices.is_empty() {
        return (Vec::new(), rows);
    }

    let avg_height = Row::average_height(&rows);
    let mut processed: BTreeSet<usize> = BTreeSet::new();
    let mut merged = Vec::new();

    for (slot, &anchor_idx) in anchor_indices.iter().enumerate() {
        let mut anchor = rows[anchor_idx].clone();
        processed.insert(anchor_idx);

        let next_anchor_idx = anchor_indices
            .get(slot + 1)
            .copied()
            .unwrap_or(rows.len());

        // Fragments between this anchor and the next; the first anchor also
        // claims anything above it.
        let mut segment: Vec<usize> = (anchor_idx + 1..next_anchor_idx)
            .filter(|i| !processed.contains(i) && !rows[*i].is_valid())
            .collect();
        if slot == 0 {
            segment.extend((0..anchor_idx).filter(|i| !processed.contains(i) && !rows[*i].is_valid()));
        }

        for incomplete_idx in segment {
            let confidence = anchor_merge_confidence(
                &anchor,
                &rows[incomplete_idx],
                anchor_idx,
                incomplete_idx,
                avg_height,
            );
            if confidence > ANCHOR_MERGE_THRESHOLD {
                smart_merge(&mut anchor, &rows[incomplete_idx]);
                processed.insert(incomplete_idx);
            }
        }
        merged.push(anchor);
    }

    let leftovers = rows
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !processed.contains(i))
        .map(|(_, row)| row)
        .collect();
    (merged, leftovers)
}

/// Confidence that `incomplete` is a fragment of `anchor`'s transaction.
fn anchor_merge_confidence(
    anchor: &Row,
    incomplete: &Row,
    anchor_idx: usize,
    incomplete_idx: usize,
    avg_height: f64,
) -> f64 {
    let mut score = 0.0;

    if avg_height > 0.0 {
        let distance = (anchor.y_top - incomplete.y_top).abs() / avg_height;
        score += (1.0 - distance / 3.0).max(0.0) * 0.4;
    }

    // Field compatibility: reward fields that fill anchor gaps, punish
    // fields where both sides already hold real data.
    let mut compatibility = 0.0;
    let mut field_count = 0usize;
    for field in [DATE, PARTICULARS, DEBIT, CREDIT, BALANCE] {
        if incomplete.field(field).is_none() {
            continue;
        }
        field_count += 1;
        if anchor.field(field).is_none() {
            compatibility += 1.0;
        } else if field == PARTICULARS {
            compatibility += 0.5;
        } else {
            compatibility += 0.25;
        }
    }
    for field in [DATE, DEBIT, CREDIT, BALANCE] {
        let (Some(anchor_val), Some(incomplete_val)) =
            (anchor.field(field), incomplete.field(field))
        else {
            continue;
        };
        let both_real = if field == DATE {
            is_parseable_date(anchor_val) && is_parseable_date(incomplete_val)
        } else {
            is_nonzero_amount(anchor_val) && is_nonzero_amount(incomplete_val)
        };
        if both_real {
            compatibility -= 3.0;
        }
    }
    if field_count > 0 {
        score += (compatibility / field_count as f64) * 0.3;
    }

    if incomplete_idx == anchor_idx + 1 {
        score += 0.2;
    } else if anchor_idx > 0 && incomplete_idx == anchor_idx - 1 {
        score += 0.1;
    }

    let populated: Vec<&str> = incomplete.populated_fields().collect();
    if populated == [PARTICULARS] {
        score += 0.1;
    }

    let merged_date = match (anchor.field(DATE), incomplete.field(DATE)) {
        (Some(a), Some(b)) => format!("{a} {b}"),
        (Some(a), None) => a.to_string(),
        (None, Some(b)) => b.to_string(),
        (None, None) => String::new(),
    };
    if !merged_date.is_empty() && is_parseable_date(&merged_date) {
        score += 0.1;
    }

    score
}

/// Merge `source`'s fields into `target`, resolving conflicts per field
/// kind: particulars append, dates repair, amounts keep the target unless
/// it holds no real value. The bounding box only grows.
fn smart_merge(target: &mut Row, source: &Row) {
    target.expand_bounds(source);

    for (key, value) in &source.fields {
        if value.trim().is_empty() {
            continue;
        }
        match target.field(key) {
            None => {
                target.fields.insert(key.clone(), value.clone());
            }
            Some(existing) => {
                if key == PARTICULARS {
                    let appended = format!("{existing} {value}");
                    target.fields.insert(key.clone(), appended.trim().to_string());
                } else if key == DATE {
                    if let Some(repaired) = merge_dates(existing, value) {
                        target.fields.insert(key.clone(), repaired);
                    }
                } else if AMOUNT_FIELDS.contains(&key.as_str())
                    && !is_nonzero_amount(existing)
                {
                    target.fields.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

fn strip_date_punctuation(s: &str) -> String {
    s.chars().filter(|c| !matches!(c, ' ' | '-' | '/')).collect()
}

/// Repair a split date: substring containment keeps the fuller value,
/// concatenation recovers dates broken across rows, and length breaks ties.
fn merge_dates(a: &str, b: &str) -> Option<String> {
    if a.is_empty() {
        return Some(b.to_string());
    }
    if b.is_empty() {
        return Some(a.to_string());
    }

    let (clean_a, clean_b) = (strip_date_punctuation(a), strip_date_punctuation(b));
    if clean_b.contains(&clean_a) {
        return Some(b.to_string());
    }
    if clean_a.contains(&clean_b) {
        return Some(a.to_string());
    }

    let combined = format!("{a}{b}");
    if is_parseable_date(&combined) {
        return Some(combined);
    }

    if a.len() >= b.len() {
        Some(a.to_string())
    } else {
        Some(b.to_string())
    }
}

/// Whether two date fragments agree (equal or one contains the other).
fn dates_compatible(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let (clean_a, clean_b) = (strip_date_punctuation(a), strip_date_punctuation(b));
    clean_a.contains(&clean_b) || clean_b.contains(&clean_a)
}

fn amount_value(s: &str) -> f64 {
    s.replace(',', "")
        .replace('$', "")
        .trim()
        .parse()
        .unwrap_or(0.0)
}

/// Pass 2: pair leftover fragments whose union forms a valid row.
fn merge_incomplete_pairs(mut rows: Vec<Row>) -> Vec<Row> {
    if rows.is_empty() {
        return rows;
    }
    rows.sort_by(|a, b| a.y_top.partial_cmp(&b.y_top).unwrap());
    let avg_height = Row::average_height(&rows);

    let mut processed: BTreeSet<usize> = BTreeSet::new();
    let mut merged = Vec::new();

    for i in 0..rows.len() {
        if processed.contains(&i) {
            continue;
        }
        if rows[i].is_valid() {
            merged.push(rows[i].clone());
            processed.insert(i);
            continue;
        }

        let mut best: Option<(usize, f64)> = None;
        for j in i + 1..rows.len() {
            if processed.contains(&j) || rows[j].is_valid() {
                continue;
            }
            let mut candidate = rows[i].clone();
            smart_merge(&mut candidate, &rows[j]);
            if !candidate.is_valid() {
                continue;
            }
            let confidence = pair_merge_confidence(&rows[i], &rows[j], i, j, avg_height);
            if best.is_none_or(|(_, s)| confidence > s) {
                best = Some((j, confidence));
            }
        }

        match best {
            Some((j, confidence)) if confidence > PAIR_MERGE_THRESHOLD => {
                let mut candidate = rows[i].clone();
                smart_merge(&mut candidate, &rows[j]);
                tracing::debug!(first = i, second = j, confidence, "merged incomplete pair");
                merged.push(candidate);
                processed.insert(i);
                processed.insert(j);
            }
            _ => {
                merged.push(rows[i].clone());
                processed.insert(i);
            }
        }
    }
    merged
}

/// Confidence that two incomplete rows belong to the same transaction.
fn pair_merge_confidence(a: &Row, b: &Row, idx_a: usize, idx_b: usize, avg_height: f64) -> f64 {
    let mut score = 0.0;

    let fields_a: BTreeSet<&str> = a.populated_fields().collect();
    let fields_b: BTreeSet<&str> = b.populated_fields().collect();
    let union: BTreeSet<&str> = fields_a.union(&fields_b).copied().collect();
    let overlap = fields_a.intersection(&fields_b).count();

    if !union.is_empty() {
        let complementarity = 1.0 - overlap as f64 / union.len() as f64;
        score += complementarity * 0.3;
    }
    if union.contains(DATE) && union.contains(BALANCE) {
        score += 0.3;
    }

    if avg_height > 0.0 {
        let distance = (a.y_top - b.y_top).abs() / avg_height;
        score += (1.0 - distance / 3.0).max(0.0) * 0.2;
    }

    if idx_b == idx_a + 1 {
        score += 0.15;
    } else if idx_b == idx_a + 2 {
        score += 0.05;
    }

    for field in [DATE, DEBIT, CREDIT, BALANCE] {
        let (Some(val_a), Some(val_b)) = (a.field(field), b.field(field)) else {
            continue;
        };
        if field == DATE {
            if !dates_compatible(val_a, val_b) {
                score -= 0.5;
            }
        } else if is_nonzero_amount(val_a)
            && is_nonzero_amount(val_b)
            && amount_value(val_a) != amount_value(val_b)
        {
            score -= 0.5;
        }
    }

    score.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(y_top: f64, fields: &[(&str, &str)]) -> Row {
        let mut row = Row::new(y_top, y_top + 10.0, 0.0, 500.0);
        for (k, v) in fields {
            row.fields.insert(k.to_string(), v.to_string());
        }
        row
    }

    #[test]
    fn continuation_particulars_merges_into_anchor() {
        let rows = vec![
            row(
                100.0,
                &[
                    ("date", "01/02/2024"),
                    ("particulars", "UPI payment"),
                    ("balance", "1,000.00"),
                ],
            ),
            row(111.0, &[("particulars", "to grocery store")]),
        ];
        let (merged, leftovers) = merge_with_anchors(rows);
        assert!(leftovers.is_empty());
        assert_eq!(merged.len(), 1);
        assert_eq!(
            merged[0].field("particulars"),
            Some("UPI payment to grocery store")
        );
        // Bounds grew to cover the continuation (law L2).
        assert_eq!(merged[0].y_bottom, 121.0);
    }

    #[test]
    fn unrelated_valid_rows_stay_separate() {
        let rows = vec![
            row(
                100.0,
                &[("date", "01/02/2024"), ("balance", "1,000.00")],
            ),
            row(
                130.0,
                &[("date", "02/02/2024"), ("balance", "1,100.00")],
            ),
        ];
        let (merged, leftovers) = merge_with_anchors(rows);
        assert_eq!(merged.len(), 2);
        assert!(leftovers.is_empty());
    }

    #[test]
    fn conflicting_amounts_are_not_absorbed() {
        // Far-away fragment with its own real balance must not merge.
        let rows = vec![
            row(
                100.0,
                &[("date", "01/02/2024"), ("balance", "1,000.00")],
            ),
            row(400.0, &[("balance", "9,999.00"), ("debit", "42.00")]),
        ];
        let (merged, leftovers) = merge_with_anchors(rows);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].field("balance"), Some("1,000.00"));
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn no_anchors_returns_everything_unprocessed() {
        let rows = vec![row(100.0, &[("particulars", "only text")])];
        let (merged, leftovers) = merge_with_anchors(rows);
        assert!(merged.is_empty());
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn split_date_repairs_by_concatenation() {
        assert_eq!(merge_dates("01/02", "/2024"), Some("01/02/2024".to_string()));
        assert_eq!(merge_dates("01/02/2024", "01/02"), Some("01/02/2024".to_string()));
        assert_eq!(merge_dates("", "01/02/2024"), Some("01/02/2024".to_string()));
        // Ambiguous fragments keep the longer value.
        assert_eq!(merge_dates("03/04/2024", "05/06"), Some("03/04/2024".to_string()));
    }

    #[test]
    fn incomplete_pair_forms_valid_row() {
        // Row A has date + particulars, row B has balance, half a row apart.
        let rows = vec![
            row(100.0, &[("date", "01/02/2024"), ("particulars", "transfer")]),
            row(105.0, &[("balance", "1,500.00")]),
        ];
        let confidence = pair_merge_confidence(&rows[0], &rows[1], 0, 1, 10.0);
        assert!(confidence > PAIR_MERGE_THRESHOLD);

        let merged = merge_incomplete_pairs(rows);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].is_valid());
        assert_eq!(merged[0].field("balance"), Some("1,500.00"));
        assert_eq!(merged[0].field("particulars"), Some("transfer"));
    }

    #[test]
    fn incompatible_pair_stays_split() {
        let rows = vec![
            row(100.0, &[("date", "01/02/2024"), ("debit", "50.00")]),
            row(300.0, &[("date", "09/09/2024"), ("debit", "70.00")]),
        ];
        let merged = merge_incomplete_pairs(rows);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn pair_merge_never_shrinks_bounds() {
        let mut a = row(100.0, &[("date", "01/02/2024")]);
        a.x_left = 10.0;
        a.x_right = 60.0;
        let mut b = row(112.0, &[("balance", "1,000.00")]);
        b.x_left = 400.0;
        b.x_right = 450.0;
        let merged = merge_incomplete_pairs(vec![a, b]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].x_left, 10.0);
        assert_eq!(merged[0].x_right, 450.0);
        assert_eq!(merged[0].y_top, 100.0);
        assert_eq!(merged[0].y_bottom, 122.0);
    }
}
