//! Stage 6: reconstruct candidate rows from column groups.
//!
//! Three passes per page: merge vertically-adjacent words within each
//! column (multi-line cells), cluster the merged items across columns into
//! rows by y-intersection, then materialize each row's field map and
//! bounding box. The vertical tolerance is derived from the page's own gap
//! distribution rather than hard-coded.

use std::collections::BTreeMap;

use ledgerline_core::headers::PARTICULARS;
use ledgerline_core::rules::{RuleLine, crosses_horizontal};
use ledgerline_core::stats::y_merge_tolerance;
use ledgerline_core::words::Word;

use crate::error::Result;
use crate::records::{PageColumnGroups, PageRows, Row};
use crate::source::PageSource;
use crate::spill::{JsonlReader, JsonlWriter};
use crate::stages::StageContext;
use crate::stages::column_groups;

/// Stream name of this stage.
pub const STAGE: &str = "build_rows";

/// Tolerance used when a page has no particulars words to analyze.
const NO_SAMPLE_TOLERANCE: f64 = 2.0;

/// Build rows for every page of the column-groups stream.
pub fn run<S: PageSource>(source: &S, ctx: &StageContext<'_>) -> Result<()> {
    tracing::info!("building rows from column groups");
    let reader: JsonlReader<PageColumnGroups> =
        JsonlReader::open(&ctx.stream_path(column_groups::STAGE))?;
    let mut writer = JsonlWriter::create(&ctx.stream_path(STAGE))?;

    for item in reader {
        let item = item?;
        let page = source.page(item.page_number)?;

        let tolerance = dynamic_tolerance(&item.groups);
        tracing::debug!(
            page_number = item.page_number,
            tolerance,
            "derived y-merge tolerance"
        );

        let merged = merge_column_cells(&item.groups, tolerance, &page.horizontal_rules);
        let rows = cluster_rows(merged, tolerance);

        writer.write(&PageRows {
            page_number: item.page_number,
            row_count: rows.len(),
            rows,
        })?;
    }

    writer.finish()?;
    ctx.upload_stream(STAGE)?;
    Ok(())
}

/// Derive the page's y-merge tolerance from the particulars column, the
/// column most likely to wrap onto continuation lines.
fn dynamic_tolerance(groups: &BTreeMap<String, Vec<Word>>) -> f64 {
    match groups.get(PARTICULARS) {
        Some(words) if !words.is_empty() => y_merge_tolerance(words),
        _ => NO_SAMPLE_TOLERANCE,
    }
}

/// Pass A: within each column, merge consecutive words that sit within the
/// tolerance vertically and have no horizontal rule between them.
fn merge_column_cells(
    groups: &BTreeMap<String, Vec<Word>>,
    tolerance: f64,
    horizontal_rules: &[RuleLine],
) -> Vec<(String, Word)> {
    let mut items = Vec::new();

    for (label, words) in groups {
        let mut sorted = words.clone();
        sorted.sort_by(|a, b| a.bbox.top.partial_cmp(&b.bbox.top).unwrap());

        let mut current: Option<Word> = None;
        let mut cell_bottom = 0.0_f64;
        for word in sorted {
            if let Some(cell) = current.as_mut() {
                let close_vertically = (word.bbox.top - cell_bottom).abs() <= tolerance
                    || (word.bbox.bottom - cell_bottom).abs() <= tolerance;
                let rule_between =
                    crosses_horizontal(horizontal_rules, cell_bottom, word.bbox.top);
                if close_vertically && !rule_between {
                    cell.text.push(' ');
                    cell.text.push_str(&word.text);
                    cell.bbox.bottom = cell.bbox.bottom.max(word.bbox.bottom);
                    cell_bottom = cell.bbox.bottom;
                    continue;
                }
            }
            if let Some(done) = current.take() {
                items.push((label.clone(), done));
            }
            cell_bottom = word.bbox.bottom;
            current = Some(word);
        }
        if let Some(cell) = current {
            items.push((label.clone(), cell));
        }
    }
    items
}

/// Passes B and C: cluster tagged cells into rows by y-intersection and
/// materialize the row records.
fn cluster_rows(mut items: Vec<(String, Word)>, tolerance: f64) -> Vec<Row> {
    items.sort_by(|a, b| a.1.bbox.top.partial_cmp(&b.1.bbox.top).unwrap());

    struct OpenRow {
        top: f64,
        bottom: f64,
        members: Vec<(String, Word)>,
    }

    let mut open: Vec<OpenRow> = Vec::new();
    for (label, word) in items {
        let placed = open.iter_mut().find(|row| {
            !(word.bbox.bottom < row.top - tolerance || word.bbox.top > row.bottom + tolerance)
        });
        match placed {
            Some(row) => {
                row.top = row.top.min(word.bbox.top);
                row.bottom = row.bottom.max(word.bbox.bottom);
                row.members.push((label, word));
            }
            None => open.push(OpenRow {
                top: word.bbox.top,
                bottom: word.bbox.bottom,
                members: vec![(label, word)],
            }),
        }
    }

    open.into_iter()
        .map(|row| {
            let mut record = Row::new(f64::MAX, f64::MIN, f64::MAX, f64::MIN);
            for (label, word) in row.members {
                record.y_top = record.y_top.min(word.bbox.top);
                record.y_bottom = record.y_bottom.max(word.bbox.bottom);
                record.x_left = record.x_left.min(word.bbox.x0);
                record.x_right = record.x_right.max(word.bbox.x1);
                record
                    .fields
                    .entry(label)
                    .and_modify(|text| {
                        text.push(' ');
                        text.push_str(&word.text);
                    })
                    .or_insert(word.text);
            }
            record
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, x0: f64, top: f64, x1: f64, bottom: f64) -> Word {
        Word::new(text, x0, top, x1, bottom)
    }

    fn groups_from(entries: &[(&str, Vec<Word>)]) -> BTreeMap<String, Vec<Word>> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn single_line_rows_cluster_by_y() {
        let groups = groups_from(&[
            (
                "date",
                vec![
                    word("01/02/2024", 10.0, 130.0, 60.0, 140.0),
                    word("02/02/2024", 10.0, 160.0, 60.0, 170.0),
                ],
            ),
            (
                "balance",
                vec![
                    word("1,000.00", 400.0, 130.0, 450.0, 140.0),
                    word("1,100.00", 400.0, 160.0, 450.0, 170.0),
                ],
            ),
        ]);
        let items = merge_column_cells(&groups, 0.0, &[]);
        let rows = cluster_rows(items, 3.0);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].field("date"), Some("01/02/2024"));
        assert_eq!(rows[0].field("balance"), Some("1,000.00"));
        assert_eq!(rows[1].field("balance"), Some("1,100.00"));
    }

    #[test]
    fn multiline_particulars_merge_into_one_cell() {
        let groups = groups_from(&[(
            "particulars",
            vec![
                word("UPI payment to", 100.0, 130.0, 200.0, 140.0),
                word("grocery store", 100.0, 141.0, 190.0, 151.0),
            ],
        )]);
        let items = merge_column_cells(&groups, 2.0, &[]);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].1.text, "UPI payment to grocery store");
        assert_eq!(items[0].1.bbox.bottom, 151.0);
    }

    #[test]
    fn horizontal_rule_blocks_vertical_merge() {
        let groups = groups_from(&[(
            "particulars",
            vec![
                word("first row text", 100.0, 130.0, 200.0, 140.0),
                word("second row text", 100.0, 141.0, 200.0, 151.0),
            ],
        )]);
        let rule = RuleLine::horizontal(0.0, 600.0, 140.5);
        let items = merge_column_cells(&groups, 2.0, &[rule]);
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn row_bounds_cover_member_words() {
        let groups = groups_from(&[
            ("date", vec![word("01/02/2024", 10.0, 130.0, 60.0, 140.0)]),
            ("balance", vec![word("1,000.00", 400.0, 128.0, 450.0, 142.0)]),
        ]);
        let items = merge_column_cells(&groups, 0.0, &[]);
        let rows = cluster_rows(items, 3.0);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.y_top, 128.0);
        assert_eq!(row.y_bottom, 142.0);
        assert_eq!(row.x_left, 10.0);
        assert_eq!(row.x_right, 450.0);
        // Every member word lies inside the row band (invariant I2).
        assert!(row.y_top <= 128.0 && 142.0 <= row.y_bottom);
    }

    #[test]
    fn collision_within_row_concatenates() {
        let groups = groups_from(&[(
            "particulars",
            vec![
                word("left part", 100.0, 130.0, 150.0, 140.0),
                word("right part", 160.0, 130.0, 210.0, 140.0),
            ],
        )]);
        // Tolerance 0 prevents the vertical merge; both cells share a row.
        let items = merge_column_cells(&groups, 0.0, &[]);
        let rows = cluster_rows(items, 0.0);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].field("particulars"), Some("left part right part"));
    }

    #[test]
    fn no_particulars_uses_fallback_tolerance() {
        let groups = groups_from(&[("date", vec![])]);
        assert_eq!(dynamic_tolerance(&groups), NO_SAMPLE_TOLERANCE);
    }

    #[test]
    fn empty_groups_give_empty_rows() {
        let items = merge_column_cells(&BTreeMap::new(), 3.0, &[]);
        assert!(cluster_rows(items, 3.0).is_empty());
    }
}
