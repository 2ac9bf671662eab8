//! Stage 4: assign each header a horizontal span on every page.
//!
//! When the page carries enough vertical rules, the spans come straight
//! from the rule grid. Otherwise each header's span grows over the words
//! that overlap it, with a line counter guarding against running past the
//! end of the table, and missing spans are synthesized from the dominant
//! header alignment.

use std::collections::BTreeMap;

use ledgerline_core::headers::Header;
use ledgerline_core::rules::{RuleLine, filter_below};
use ledgerline_core::words::Word;

use crate::error::Result;
use crate::records::{HeaderSet, OPEN_LEFT, OPEN_RIGHT, PageColumnRanges, PageWords, Span};
use crate::source::PageSource;
use crate::spill::{JsonlReader, JsonlWriter};
use crate::stages::StageContext;
use crate::stages::clean_data;

/// Stream name of this stage.
pub const STAGE: &str = "column_range";

/// Word-voting stops honoring conflicting expansions after this many text
/// lines, taking the conflict as a sign the table has ended. Heuristic.
const TABLE_END_LINE_THRESHOLD: usize = 10;
/// Words in the bottom fraction of the page are footer noise.
const FOOTER_FRACTION: f64 = 0.06;
/// How close a header edge must sit to a span edge to vote for an alignment.
const ALIGNMENT_TOLERANCE: f64 = 3.0;

/// Dominant horizontal alignment of headers within their spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Alignment {
    Left,
    Right,
    Center,
}

/// Compute column ranges for every page of the clean-data stream.
pub fn run<S: PageSource>(
    source: &S,
    headers: &HeaderSet,
    ctx: &StageContext<'_>,
) -> Result<()> {
    tracing::info!("starting column range extraction");
    let reader: JsonlReader<PageWords> = JsonlReader::open(&ctx.stream_path(clean_data::STAGE))?;
    let mut writer = JsonlWriter::create(&ctx.stream_path(STAGE))?;

    let mut previous: Option<BTreeMap<String, Span>> = None;
    for item in reader {
        let item = item?;
        let page = source.page(item.page_number)?;
        let vertical_rule_count = page.vertical_rules.len();

        let ranges = if headers.is_copy() && item.page_number > 0 && previous.is_some() {
            previous.clone().unwrap()
        } else {
            // On the first page, rules above the header row belong to the
            // account-summary box, not the table.
            let upper_cut = if item.page_number == 0 {
                headers
                    .headers
                    .first()
                    .map(|h| h.bbox.top)
                    .unwrap_or(0.0)
            } else {
                0.0
            };
            let usable_rules = filter_below(&page.vertical_rules, upper_cut);

            let mut ranges = match ranges_from_rules(&headers.headers, &usable_rules) {
                Some(ranges) if !ranges.is_empty() => ranges,
                _ => {
                    tracing::debug!(
                        page_number = item.page_number,
                        vertical_rule_count,
                        "falling back to word-voting for column ranges"
                    );
                    let voted = ranges_from_words(&item.words, &headers.headers, page.height);
                    repair_missing_ranges(&headers.headers, voted)
                }
            };
            open_outer_edges(&headers.headers, &mut ranges);
            clip_overlaps(&headers.headers, &mut ranges);
            ranges
        };

        previous = Some(ranges.clone());
        writer.write(&PageColumnRanges {
            page_number: item.page_number,
            ranges,
            vertical_rule_count,
        })?;
    }

    writer.finish()?;
    ctx.upload_stream(STAGE)?;
    Ok(())
}

fn spans_intersect(a: Span, b: Span) -> bool {
    !(a.1 <= b.0 || b.1 <= a.0)
}

/// Primary strategy: locate each header's center between consecutive
/// vertical rules.
///
/// Needs at least as many rules as headers; with fewer, the grid cannot
/// enclose the columns and the caller falls back to word-voting.
fn ranges_from_rules(
    headers: &[Header],
    vertical_rules: &[RuleLine],
) -> Option<BTreeMap<String, Span>> {
    if vertical_rules.len() < headers.len() {
        return None;
    }

    let mut xs: Vec<f64> = vertical_rules.iter().map(RuleLine::x).collect();
    xs.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let mut ranges = BTreeMap::new();
    for header in headers {
        let center = header.bbox.x_center();
        let enclosing = xs
            .windows(2)
            .find(|pair| pair[0] <= center && center <= pair[1]);
        let span = match enclosing {
            Some(pair) => (pair[0], pair[1]),
            None => (header.bbox.x0, header.bbox.x1),
        };
        ranges.insert(header.text.clone(), span);
    }
    Some(ranges)
}

/// Fallback strategy: grow each header's span over the words that overlap
/// it horizontally, walking the page top-to-bottom.
fn ranges_from_words(
    words: &[Word],
    headers: &[Header],
    page_height: f64,
) -> BTreeMap<String, Span> {
    let mut ranges: BTreeMap<String, Span> = BTreeMap::new();
    let footer_y = page_height * (1.0 - FOOTER_FRACTION);
    let mut current_bottom = headers
        .iter()
        .map(|h| h.bbox.bottom)
        .fold(0.0_f64, f64::max);
    let mut lines_iterated = 0usize;

    for word in words {
        let word_bottom = word.bbox.bottom.max(current_bottom);
        if word_bottom > current_bottom {
            lines_iterated += 1;
            current_bottom = word_bottom;
        }
        if word.bbox.top >= footer_y {
            continue;
        }
        for header in headers {
            if !word.bbox.intersects_x(&header.bbox) {
                continue;
            }
            let existing = ranges
                .get(&header.text)
                .copied()
                .unwrap_or((f64::MAX, f64::MIN));
            let proposed = (
                word.bbox.x0.min(header.bbox.x0).min(existing.0),
                word.bbox.x1.max(header.bbox.x1).max(existing.1),
            );
            let conflicts = ranges
                .iter()
                .any(|(key, span)| key != &header.text && spans_intersect(proposed, *span));
            if conflicts && lines_iterated > TABLE_END_LINE_THRESHOLD {
                // The table has likely ended; stop honoring this word.
                break;
            }
            ranges.insert(header.text.clone(), proposed);
        }
    }
    ranges
}

/// Infer the dominant alignment from headers that do have spans.
fn dominant_alignment(headers: &[Header], ranges: &BTreeMap<String, Span>) -> Alignment {
    let mut left_votes = 0usize;
    let mut right_votes = 0usize;
    let mut center_votes = 0usize;

    for header in headers {
        let Some(&(rx0, rx1)) = ranges.get(&header.text) else {
            continue;
        };
        let left_d = (header.bbox.x0 - rx0).abs();
        let right_d = (header.bbox.x1 - rx1).abs();
        let center_d = (header.bbox.x_center() - (rx0 + rx1) / 2.0).abs();

        if left_d <= ALIGNMENT_TOLERANCE && left_d <= right_d && left_d <= center_d {
            left_votes += 1;
        } else if right_d <= ALIGNMENT_TOLERANCE && right_d <= left_d && right_d <= center_d {
            right_votes += 1;
        } else if center_d <= ALIGNMENT_TOLERANCE && center_d <= left_d && center_d <= right_d {
            center_votes += 1;
        } else if left_d <= right_d && left_d <= center_d {
            left_votes += 1;
        } else if right_d <= left_d && right_d <= center_d {
            right_votes += 1;
        } else {
            center_votes += 1;
        }
    }

    if left_votes > right_votes && left_votes > center_votes {
        Alignment::Left
    } else if right_votes > left_votes && right_votes > center_votes {
        Alignment::Right
    } else {
        Alignment::Center
    }
}

/// Synthesize spans for headers the word vote missed, extending toward the
/// neighbor according to the dominant alignment.
fn repair_missing_ranges(
    headers: &[Header],
    ranges: BTreeMap<String, Span>,
) -> BTreeMap<String, Span> {
    let alignment = dominant_alignment(headers, &ranges);
    let mut adjusted = BTreeMap::new();

    for (i, header) in headers.iter().enumerate() {
        let (x0, x1) = (header.bbox.x0, header.bbox.x1);
        if let Some(span) = ranges.get(&header.text) {
            adjusted.insert(header.text.clone(), *span);
            continue;
        }

        let span = match alignment {
            Alignment::Left if i + 1 < headers.len() => {
                let next = &headers[i + 1];
                let next_x0 = ranges
                    .get(&next.text)
                    .map(|span| span.0)
                    .unwrap_or(next.bbox.x0);
                (x0, next_x0.max(x1))
            }
            Alignment::Right if i > 0 => {
                let prev = &headers[i - 1];
                let prev_x1 = ranges
                    .get(&prev.text)
                    .map(|span| span.1)
                    .unwrap_or(prev.bbox.x1);
                (prev_x1.min(x0), x1)
            }
            _ => (x0, x1),
        };
        adjusted.insert(header.text.clone(), span);
    }
    adjusted
}

/// Widen the first and last columns so marginal words still land somewhere.
fn open_outer_edges(headers: &[Header], ranges: &mut BTreeMap<String, Span>) {
    let mut sorted: Vec<&Header> = headers.iter().collect();
    sorted.sort_by(|a, b| a.bbox.x0.partial_cmp(&b.bbox.x0).unwrap());
    let (Some(first), Some(last)) = (sorted.first(), sorted.last()) else {
        return;
    };

    if let Some(span) = ranges.get_mut(&first.text) {
        span.0 = OPEN_LEFT;
    }
    if let Some(span) = ranges.get_mut(&last.text) {
        span.1 = OPEN_RIGHT;
    }
}

/// Clip every span so it never reaches into the next header's label.
fn clip_overlaps(headers: &[Header], ranges: &mut BTreeMap<String, Span>) {
    for pair in headers.windows(2) {
        let next_x0 = pair[1].bbox.x0;
        if let Some(span) = ranges.get_mut(&pair[0].text) {
            if span.1 > next_x0 {
                span.1 = next_x0.floor();
            }
        }
    }
}
