//! Stage 8: type, validate, and normalize merged rows into transactions.
//!
//! Column names are fuzzy-mapped to the canonical vocabulary, the
//! document's date locale is detected from a sample of date cells, and each
//! row is typed: ISO dates, floats for the amount columns, strings for the
//! rest. Rows without a date, or without both balance and amount, are
//! dropped.

use ledgerline_core::amounts::currency_to_float;
use ledgerline_core::dates::{Locale, infer_day_first, parse_with_locale};
use ledgerline_core::headers::{
    AMOUNT, BALANCE, CREDIT, DATE, DEBIT, MAP_ADOPT_SCORE, PARTICULARS, map_label,
};

use crate::error::Result;
use crate::records::{PageRows, Row, Transaction};
use crate::spill::{JsonlReader, JsonlWriter};
use crate::stages::StageContext;
use crate::stages::merge_rows;

/// Stream name of this stage.
pub const STAGE: &str = "format_clean";

/// Pages sampled for locale detection.
const LOCALE_SAMPLE_PAGES: usize = 3;
/// Rows sampled per page for locale detection.
const LOCALE_SAMPLE_ROWS: usize = 10;
/// Total date samples considered.
const LOCALE_SAMPLE_LIMIT: usize = 30;

/// Type and validate the merged rows, streaming out transactions.
///
/// Returns the number of transactions emitted.
pub fn run(country: Option<&str>, ctx: &StageContext<'_>) -> Result<usize> {
    // First pass: sample date cells from the leading pages.
    let mut samples: Vec<String> = Vec::new();
    let reader: JsonlReader<PageRows> = JsonlReader::open(&ctx.stream_path(merge_rows::STAGE))?;
    let mut pages_sampled = 0usize;
    for item in reader {
        let item = item?;
        for row in item.rows.iter().take(LOCALE_SAMPLE_ROWS) {
            if let Some(value) = mapped_field(row, DATE) {
                samples.push(value.to_string());
            }
        }
        pages_sampled += 1;
        if pages_sampled >= LOCALE_SAMPLE_PAGES && !samples.is_empty() {
            break;
        }
    }
    samples.truncate(LOCALE_SAMPLE_LIMIT);

    let locale = detect_locale(&samples, country);
    tracing::info!(?locale, sample_count = samples.len(), "date locale detected");

    // Second pass: type every row.
    let reader: JsonlReader<PageRows> = JsonlReader::open(&ctx.stream_path(merge_rows::STAGE))?;
    let mut writer = JsonlWriter::create(&ctx.stream_path(STAGE))?;
    let mut rows_seen = 0usize;
    let mut emitted = 0usize;
    for item in reader {
        let item = item?;
        rows_seen += item.rows.len();
        for row in &item.rows {
            if let Some(transaction) = format_row(row, locale, item.page_number) {
                writer.write(&transaction)?;
                emitted += 1;
            }
        }
    }
    writer.finish()?;
    ctx.upload_stream(STAGE)?;

    tracing::info!(rows_seen, emitted, "format cleaning completed");
    Ok(emitted)
}

/// Canonicalize a raw column name, falling back to the original.
fn map_column_name(name: &str) -> String {
    let (mapped, score) = map_label(name);
    if score >= MAP_ADOPT_SCORE {
        mapped
    } else {
        name.to_string()
    }
}

/// Look up a row field by its canonical column name.
fn mapped_field<'a>(row: &'a Row, canonical: &str) -> Option<&'a str> {
    row.fields
        .iter()
        .find(|(key, _)| map_column_name(key) == canonical)
        .map(|(_, value)| value.as_str())
        .filter(|value| !value.trim().is_empty())
}

/// Pick the document locale: country override first, then any unambiguous
/// day-first sample, defaulting to month-first.
fn detect_locale(samples: &[String], country: Option<&str>) -> Locale {
    if let Some(locale) = country.and_then(Locale::from_country) {
        return locale;
    }
    if samples
        .iter()
        .any(|s| infer_day_first(s) == Some(true))
    {
        return Locale::Eu;
    }
    Locale::Us
}

/// Type one row. Returns `None` when the row fails the validity rule.
fn format_row(row: &Row, locale: Locale, page_number: usize) -> Option<Transaction> {
    let mut transaction = Transaction {
        page_number,
        ..Transaction::default()
    };

    for (key, value) in &row.fields {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            continue;
        }
        match map_column_name(key).as_str() {
            DATE => transaction.date = parse_with_locale(trimmed, locale),
            PARTICULARS => transaction.particulars = Some(trimmed.to_string()),
            DEBIT => transaction.debit = currency_to_float(trimmed),
            CREDIT => transaction.credit = currency_to_float(trimmed),
            BALANCE => transaction.balance = currency_to_float(trimmed),
            AMOUNT => transaction.amount = currency_to_float(trimmed),
            other => {
                transaction
                    .extra
                    .insert(other.to_string(), trimmed.to_string());
            }
        }
    }

    transaction.is_valid().then_some(transaction)
}
