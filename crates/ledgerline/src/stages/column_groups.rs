//! Stage 5: assign every word to the column it overlaps most.
//!
//! This is the only stage that joins two streams (cleaned words and column
//! ranges). Pages are matched by number through a small reorder buffer so
//! mildly out-of-order streams still pair up.

use std::collections::BTreeMap;

use ledgerline_core::words::Word;

use crate::error::Result;
use crate::records::{HeaderSet, PageColumnGroups, PageColumnRanges, PageWords, Span};
use crate::spill::{JsonlReader, JsonlWriter};
use crate::stages::StageContext;
use crate::stages::{clean_data, column_range};

/// Stream name of this stage.
pub const STAGE: &str = "column_groups";

/// Pages buffered while waiting for the matching column-range record.
const REORDER_BUFFER_CAPACITY: usize = 10;
/// Slack added to the left edge when measuring overlap.
const LEFT_TOLERANCE: f64 = 2.0;

/// Group each page's words under their best-overlapping header.
pub fn run(headers: &HeaderSet, ctx: &StageContext<'_>) -> Result<()> {
    tracing::info!("building column groups");
    let clean_reader: JsonlReader<PageWords> =
        JsonlReader::open(&ctx.stream_path(clean_data::STAGE))?;
    let mut range_reader: JsonlReader<PageColumnRanges> =
        JsonlReader::open(&ctx.stream_path(column_range::STAGE))?;
    let mut writer = JsonlWriter::create(&ctx.stream_path(STAGE))?;

    let mut buffer: BTreeMap<usize, BTreeMap<String, Span>> = BTreeMap::new();

    for item in clean_reader {
        let item = item?;
        let page_number = item.page_number;

        let ranges = match take_ranges_for_page(page_number, &mut buffer, &mut range_reader)? {
            Some(ranges) => ranges,
            None => {
                tracing::warn!(
                    page_number,
                    "no column range found for page, assuming empty"
                );
                BTreeMap::new()
            }
        };

        let (groups, dropped) = assign_words(headers, &item.words, &ranges);
        if dropped > 0 {
            tracing::debug!(page_number, dropped, "words without any column overlap");
        }

        writer.write(&PageColumnGroups {
            page_number,
            groups,
            word_count: item.word_count,
        })?;
    }

    writer.finish()?;
    ctx.upload_stream(STAGE)?;
    Ok(())
}

/// Pull the column ranges for `page_number`, buffering mismatched pages.
fn take_ranges_for_page(
    page_number: usize,
    buffer: &mut BTreeMap<usize, BTreeMap<String, Span>>,
    range_reader: &mut JsonlReader<PageColumnRanges>,
) -> Result<Option<BTreeMap<String, Span>>> {
    if let Some(ranges) = buffer.remove(&page_number) {
        return Ok(Some(ranges));
    }
    for record in range_reader.by_ref() {
        let record = record?;
        if record.page_number == page_number {
            return Ok(Some(record.ranges));
        }
        buffer.insert(record.page_number, record.ranges);
        if buffer.len() > REORDER_BUFFER_CAPACITY {
            // Evict the lowest page; the stream has clearly moved past it.
            let oldest = *buffer.keys().next().unwrap();
            buffer.remove(&oldest);
        }
    }
    Ok(None)
}

/// Percent overlap of a word with a column span.
///
/// The overlap width is divided by the smaller of the two widths (so a word
/// fully inside a column scores 1.0) after widening both left edges by the
/// tolerance.
fn overlap_percentage(word: &Word, span: Span) -> (bool, f64) {
    let (word_x0, word_x1) = (word.bbox.x0 - LEFT_TOLERANCE, word.bbox.x1);
    let (span_x0, span_x1) = (span.0 - LEFT_TOLERANCE, span.1);

    let overlap = (word_x1.min(span_x1) - word_x0.max(span_x0)).max(0.0);
    let smaller = (word_x1 - word_x0).min(span_x1 - span_x0);
    let percentage = if smaller > 0.0 {
        (overlap / smaller).min(1.0)
    } else {
        0.0
    };
    (overlap > 0.0, percentage)
}

/// Assign each word to its maximum-overlap header; returns the groups and
/// the count of dropped (zero-overlap) words.
fn assign_words(
    headers: &HeaderSet,
    words: &[Word],
    ranges: &BTreeMap<String, Span>,
) -> (BTreeMap<String, Vec<Word>>, usize) {
    let mut groups: BTreeMap<String, Vec<Word>> = headers
        .headers
        .iter()
        .map(|h| (h.text.clone(), Vec::new()))
        .collect();
    let mut dropped = 0usize;

    for word in words {
        let mut best: Option<&str> = None;
        let mut best_percentage = 0.0;
        for header in &headers.headers {
            let Some(&span) = ranges.get(&header.text) else {
                continue;
            };
            let (overlapping, percentage) = overlap_percentage(word, span);
            if overlapping && percentage > best_percentage {
                best = Some(&header.text);
                best_percentage = percentage;
            }
        }
        match best {
            Some(label) => groups.get_mut(label).unwrap().push(word.clone()),
            None => dropped += 1,
        }
    }
    (groups, dropped)
}
