//! Monetary amount parsing.
//!
//! Statement cells are messy: amounts arrive with thousands separators,
//! currency symbols, stray filler text, or accounting-style parentheses for
//! negatives. Two parsers cover the two situations the pipeline meets:
//! [`currency_to_float`] extracts the trailing number out of a noisy cell,
//! [`loose_amount`] parses an already-isolated value.

use std::sync::LazyLock;

use regex::Regex;

static FLOAT_SHAPED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-+]?\d[\d,]*\.?\d*").unwrap());

/// Extract the last float-shaped substring of `s` as a number.
///
/// Thousands separators are removed and an accounting-style `(x)` wrapper
/// negates the value. Returns `None` when no number is present.
pub fn currency_to_float(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    let last = FLOAT_SHAPED.find_iter(trimmed).last()?;
    let cleaned = last.as_str().replace(',', "");
    let value: f64 = cleaned.parse().ok()?;
    if trimmed.starts_with('(') && trimmed.ends_with(')') {
        Some(-value)
    } else {
        Some(value)
    }
}

/// Parse a value that should already be a bare amount.
///
/// Strips separators, whitespace, and common currency symbols; interprets a
/// parenthesized value as negative.
pub fn loose_amount(s: &str) -> Option<f64> {
    let mut cleaned: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, ',' | '₹' | '$' | '€' | '£'))
        .collect();
    if cleaned.starts_with('(') && cleaned.ends_with(')') && cleaned.len() >= 2 {
        cleaned = format!("-{}", &cleaned[1..cleaned.len() - 1]);
    }
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// True when `s` parses to a non-zero amount after separator removal.
///
/// This is the validity test used when deciding whether a row already holds
/// a usable figure in a column.
pub fn is_nonzero_amount(s: &str) -> bool {
    let cleaned = s.replace(',', "").replace('$', "");
    matches!(cleaned.trim().parse::<f64>(), Ok(v) if v != 0.0)
}
