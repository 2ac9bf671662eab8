//! Header labels: canonical vocabulary, keyword tables, and fuzzy matching.
//!
//! A statement table is keyed by its header row. Detection (which row is
//! the header) works off a keyword set; canonicalization (what a header
//! *means*) works off per-label variant tables scored with a token-sort
//! similarity.

use std::sync::LazyLock;

use regex::Regex;

use crate::geometry::BBox;

/// Canonical date column label.
pub const DATE: &str = "date";
/// Canonical particulars/description column label.
pub const PARTICULARS: &str = "particulars";
/// Canonical credit column label.
pub const CREDIT: &str = "credit";
/// Canonical debit column label.
pub const DEBIT: &str = "debit";
/// Canonical running-balance column label.
pub const BALANCE: &str = "balance";
/// Canonical single-amount column label.
pub const AMOUNT: &str = "amount";

/// The closed canonical vocabulary. Labels outside it pass through as-is.
pub const CANONICAL_LABELS: [&str; 6] = [DATE, PARTICULARS, CREDIT, DEBIT, BALANCE, AMOUNT];

/// Minimum similarity for a label to be considered a plausible mapping.
pub const MAP_CANDIDATE_SCORE: i32 = 50;
/// Minimum similarity for a label to actually adopt a canonical name.
pub const MAP_ADOPT_SCORE: i32 = 70;

/// A logical column label with its position on the header row.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Header {
    /// Current label text (canonicalized after recognition).
    pub text: String,
    /// The label as it appeared on the page, kept for diagnostics.
    #[cfg_attr(feature = "serde", serde(default))]
    pub original_text: Option<String>,
    /// Bounding box of the label on its source page.
    pub bbox: BBox,
    /// Set when this header set was copied from a previous page rather than
    /// detected on this one.
    #[cfg_attr(feature = "serde", serde(default))]
    pub is_copy: bool,
}

impl Header {
    /// Create a header from label text and box edges.
    pub fn new(text: impl Into<String>, x0: f64, top: f64, x1: f64, bottom: f64) -> Self {
        Self {
            text: text.into(),
            original_text: None,
            bbox: BBox::new(x0, top, x1, bottom),
            is_copy: false,
        }
    }
}

/// Keywords that mark a word as header-like during detection.
pub fn header_keywords() -> &'static [&'static str] {
    &[
        "date",
        "description",
        "amount",
        "balance",
        "debit",
        "credit",
        "reference",
        "transaction",
        "details",
        "particulars",
        "deposit",
        "withdrawal",
        "memo",
        "check",
        "cheque",
        "cr",
        "dr",
        "narration",
        "remarks",
        "type",
        "mode",
        "value",
        "running",
        "opening",
        "closing",
        "txn",
        "ref",
        "no",
        "number",
        "serial",
        "posted",
        "effective",
        "available",
    ]
}

/// Variant spellings for each canonical label, used by recognition.
fn recognition_variants() -> &'static [(&'static str, &'static [&'static str])] {
    &[
        (
            DATE,
            &["date", "txndate", "trandate", "transactiondate", "value date"],
        ),
        (
            PARTICULARS,
            &[
                "particulars",
                "transactiondetails",
                "description",
                "remarks",
                "narration",
                "details",
                "reference",
            ],
        ),
        (
            CREDIT,
            &[
                "deposits",
                "credit",
                "credits",
                "deposit",
                "money in",
                "credit amount",
                "in",
            ],
        ),
        (
            DEBIT,
            &[
                "withdrawals",
                "debit",
                "debits",
                "withdrawal",
                "money out",
                "debit amount",
                "out",
            ],
        ),
        (
            BALANCE,
            &["balance", "running balance", "closing balance"],
        ),
        (AMOUNT, &["amount"]),
    ]
}

/// Lowercase a label and strip everything non-alphabetic.
pub fn normalize_label(s: &str) -> String {
    s.chars()
        .filter_map(|c| {
            let lower = c.to_ascii_lowercase();
            lower.is_ascii_lowercase().then_some(lower)
        })
        .collect()
}

/// Token-sort similarity in 0..=100: tokens are sorted alphabetically
/// before a normalized Levenshtein comparison.
pub fn token_sort_ratio(a: &str, b: &str) -> i32 {
    let sort_join = |s: &str| {
        let mut tokens: Vec<&str> = s.split_whitespace().collect();
        tokens.sort_unstable();
        tokens.join(" ")
    };
    let (sa, sb) = (sort_join(a), sort_join(b));
    if sa.is_empty() && sb.is_empty() {
        return 100;
    }
    (strsim::normalized_levenshtein(&sa, &sb) * 100.0).round() as i32
}

/// Fuzzy-map a raw label to the canonical vocabulary.
///
/// Returns the best canonical label with its score when the score reaches
/// [`MAP_CANDIDATE_SCORE`]; otherwise returns the original label with -1.
/// Actual adoption is gated on [`MAP_ADOPT_SCORE`] by the caller, which
/// also resolves competing claims on the same canonical label.
pub fn map_label(label: &str) -> (String, i32) {
    let normalized = normalize_label(label);
    let mut best_score = 0;
    let mut best_key = label.to_string();

    for (key, variants) in recognition_variants() {
        for variant in *variants {
            let score = token_sort_ratio(&normalized, &normalize_label(variant));
            if score > best_score {
                best_score = score;
                best_key = (*key).to_string();
            }
        }
    }

    if best_score >= MAP_CANDIDATE_SCORE {
        (best_key, best_score)
    } else {
        (label.to_string(), -1)
    }
}

static PURE_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-?[\d,]+\.?\d*$").unwrap());
static DATE_SHAPED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,4}[-/]\d{1,2}[-/]\d{1,4}$").unwrap());
static CURRENCY_SHAPED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[₹$£€]\s*[\d,]+\.?\d*$").unwrap());
static ALPHABETIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z]").unwrap());

/// True for plain numeric tokens like `1,234.56` or `-10`.
pub fn is_pure_number(text: &str) -> bool {
    PURE_NUMBER.is_match(text)
}

/// True for date-shaped tokens like `01/02/2024` or `2024-1-2`.
pub fn is_date_shaped(text: &str) -> bool {
    DATE_SHAPED.is_match(text)
}

/// True for currency-prefixed amounts like `₹1,000.00`.
pub fn is_currency_shaped(text: &str) -> bool {
    CURRENCY_SHAPED.is_match(text)
}

/// True for standalone DR/CR transaction markers.
pub fn is_dr_cr(text: &str) -> bool {
    text.eq_ignore_ascii_case("dr") || text.eq_ignore_ascii_case("cr")
}

/// True when the text contains at least one ASCII letter.
pub fn has_alphabetic(text: &str) -> bool {
    ALPHABETIC.is_match(text)
}

/// Words that flag a cell as data context rather than a header
/// continuation ("Opening Balance", "Available Balance", ...).
pub const DATA_CONTEXT_WORDS: [&str; 6] =
    ["opening", "closing", "available", "current", "total", "sub"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("Txn Date"), "txndate");
        assert_eq!(normalize_label("Debit (Rs.)"), "debitrs");
        assert_eq!(normalize_label("123"), "");
    }

    #[test]
    fn test_token_sort_ratio_identical() {
        assert_eq!(token_sort_ratio("balance", "balance"), 100);
        assert_eq!(token_sort_ratio("", ""), 100);
    }

    #[test]
    fn test_map_label_exact() {
        assert_eq!(map_label("Date"), (DATE.to_string(), 100));
        assert_eq!(map_label("Balance"), (BALANCE.to_string(), 100));
    }

    #[test]
    fn test_map_label_variants() {
        let (key, score) = map_label("Transaction Details");
        assert_eq!(key, PARTICULARS);
        assert!(score >= MAP_ADOPT_SCORE);

        let (key, score) = map_label("Withdrawals");
        assert_eq!(key, DEBIT);
        assert!(score >= MAP_ADOPT_SCORE);

        let (key, score) = map_label("Deposits");
        assert_eq!(key, CREDIT);
        assert!(score >= MAP_ADOPT_SCORE);
    }

    #[test]
    fn test_map_label_unknown_passthrough() {
        let (key, score) = map_label("Branch Code");
        assert_eq!(score, -1);
        assert_eq!(key, "Branch Code");
    }

    #[test]
    fn test_map_label_punctuation_only() {
        let (key, score) = map_label("###");
        assert_eq!(key, "###");
        assert_eq!(score, -1);
    }

    #[test]
    fn test_data_shape_predicates() {
        assert!(is_pure_number("1,234.56"));
        assert!(is_pure_number("-10"));
        assert!(!is_pure_number("1a"));

        assert!(is_date_shaped("01/02/2024"));
        assert!(is_date_shaped("2024-1-2"));
        assert!(!is_date_shaped("Date"));

        assert!(is_currency_shaped("₹1,000.00"));
        assert!(is_currency_shaped("$ 99"));
        assert!(!is_currency_shaped("99$"));

        assert!(is_dr_cr("CR"));
        assert!(is_dr_cr("dr"));
        assert!(!is_dr_cr("Dr/Cr"));

        assert!(has_alphabetic("a1"));
        assert!(!has_alphabetic("123"));
    }
}
