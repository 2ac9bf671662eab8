//! Date parsing with day-first/month-first locale inference.
//!
//! Statements never announce their date convention. The numeric head of a
//! date like `31/03/2021` sometimes disambiguates it (a first token above
//! 12 must be a day); when both tokens are small the caller's locale
//! default decides.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

/// Leading `D[/-]M[/-]Y` (or month-first) numeric head of a date string.
static DATE_HEAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d{1,2})[/-](\d{1,2})[/-](\d{2,4})\b").unwrap());

static MULTI_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static SPACED_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*([/\-.])\s*").unwrap());

/// Date ordering convention of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Locale {
    /// Month-first (`MM/DD/YYYY`).
    Us,
    /// Day-first (`DD/MM/YYYY`), covering EU, UK, and IN conventions.
    Eu,
}

impl Locale {
    /// Map a country/locale string to a convention, if recognized.
    pub fn from_country(country: &str) -> Option<Locale> {
        match country.trim().to_ascii_uppercase().as_str() {
            "US" | "USA" => Some(Locale::Us),
            "EU" | "EUR" | "EUROPE" | "UK" | "IN" | "INDIA" => Some(Locale::Eu),
            _ => None,
        }
    }

    /// Whether this convention parses the day before the month.
    pub fn day_first(self) -> bool {
        matches!(self, Locale::Eu)
    }
}

/// Inspect the numeric head of a date string and infer day-first ordering.
///
/// Returns `Some(true)` when the first token must be a day, `Some(false)`
/// when the second token must be a day, `None` when ambiguous or when the
/// string has no numeric head.
pub fn infer_day_first(s: &str) -> Option<bool> {
    let caps = DATE_HEAD.captures(s)?;
    let a: u32 = caps[1].parse().ok()?;
    let b: u32 = caps[2].parse().ok()?;
    if a > 12 && b <= 12 {
        Some(true)
    } else if b > 12 && a <= 12 {
        Some(false)
    } else {
        None
    }
}

fn normalize(s: &str) -> String {
    let collapsed = MULTI_SPACE.replace_all(s.trim(), " ");
    SPACED_SEPARATOR.replace_all(&collapsed, "$1").into_owned()
}

fn numeric_formats(day_first: bool) -> [String; 12] {
    let (first, second) = if day_first { ("%d", "%m") } else { ("%m", "%d") };
    let mut out: Vec<String> = Vec::with_capacity(12);
    for sep in ['/', '-', '.'] {
        out.push(format!("{first}{sep}{second}{sep}%Y"));
        out.push(format!("{first}{sep}{second}{sep}%y"));
    }
    // Fall back to the opposite ordering when the preferred one is invalid
    // (e.g. day-first requested but the first token is 13..31-incompatible).
    for sep in ['/', '-', '.'] {
        out.push(format!("{second}{sep}{first}{sep}%Y"));
        out.push(format!("{second}{sep}{first}{sep}%y"));
    }
    out.try_into().unwrap()
}

const TEXTUAL_FORMATS: [&str; 8] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d %b %Y",
    "%d %B %Y",
    "%d-%b-%Y",
    "%d-%b-%y",
    "%b %d, %Y",
    "%B %d, %Y",
];

/// Parse a date string under an explicit day-first/month-first preference.
///
/// Handles numeric forms with `/`, `-`, or `.` separators, two- and
/// four-digit years, textual-month forms, and trailing time components
/// (which are ignored).
pub fn parse_date(s: &str, day_first: bool) -> Option<NaiveDate> {
    let normalized = normalize(s);
    if normalized.is_empty() {
        return None;
    }

    // A trailing time component ("31/03/2021 08:04:44 PM") is not part of
    // the date; retry on shrinking prefixes of whitespace tokens.
    let tokens: Vec<&str> = normalized.split(' ').collect();
    let mut candidates: Vec<String> = Vec::new();
    for take in (1..=tokens.len().min(3)).rev() {
        candidates.push(tokens[..take].join(" "));
    }

    for candidate in &candidates {
        for fmt in numeric_formats(day_first) {
            if let Ok(date) = NaiveDate::parse_from_str(candidate, &fmt) {
                return Some(date);
            }
        }
        for fmt in TEXTUAL_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(candidate, fmt) {
                return Some(date);
            }
        }
    }
    None
}

/// Parse with a [`Locale`] deciding the ambiguous-ordering case.
pub fn parse_with_locale(s: &str, locale: Locale) -> Option<NaiveDate> {
    parse_date(s, locale.day_first())
}

/// Infer the ordering from the string itself, falling back to
/// `default_locale` when ambiguous. Returns the parsed date together with
/// the locale actually used.
pub fn smart_parse(s: &str, default_locale: Locale) -> Option<(NaiveDate, Locale)> {
    let (day_first, used) = match infer_day_first(s) {
        Some(true) => (true, Locale::Eu),
        Some(false) => (false, Locale::Us),
        None => (default_locale.day_first(), default_locale),
    };
    parse_date(s, day_first).map(|d| (d, used))
}

/// True when the string parses as a date under either convention.
pub fn is_parseable_date(s: &str) -> bool {
    smart_parse(s, Locale::Us).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_day_first() {
        assert_eq!(infer_day_first("31/03/2021"), Some(true));
        assert_eq!(infer_day_first("03/31/2021"), Some(false));
        assert_eq!(infer_day_first("01/02/2024"), None);
        assert_eq!(infer_day_first("March 3, 2024"), None);
    }

    #[test]
    fn test_parse_unambiguous() {
        let d = parse_date("31/03/2021", true).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2021, 3, 31).unwrap());
        // Month-first preference still recovers an impossible month.
        let d = parse_date("31/03/2021", false).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2021, 3, 31).unwrap());
    }

    #[test]
    fn test_parse_ambiguous_respects_preference() {
        let eu = parse_date("01/02/2024", true).unwrap();
        assert_eq!(eu, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        let us = parse_date("01/02/2024", false).unwrap();
        assert_eq!(us, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[test]
    fn test_parse_with_time_suffix() {
        let (d, locale) = smart_parse("31/03/2021 08:04:44 PM", Locale::Us).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2021, 3, 31).unwrap());
        assert_eq!(locale, Locale::Eu);
    }

    #[test]
    fn test_parse_textual_month() {
        assert_eq!(
            parse_date("05 Mar 2024", true),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
        assert_eq!(
            parse_date("Mar 5, 2024", false),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
        assert_eq!(
            parse_date("05-Mar-2024", true),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
    }

    #[test]
    fn test_parse_normalizes_spacing() {
        assert_eq!(
            parse_date("01/04/ 2024", false),
            NaiveDate::from_ymd_opt(2024, 1, 4)
        );
    }

    #[test]
    fn test_two_digit_year() {
        assert_eq!(
            parse_date("31/03/21", true),
            NaiveDate::from_ymd_opt(2021, 3, 31)
        );
    }

    #[test]
    fn test_unparseable() {
        assert_eq!(parse_date("UPI/1234/payment", true), None);
        assert!(!is_parseable_date("balance"));
        assert!(is_parseable_date("2024-02-01"));
    }

    #[test]
    fn test_locale_from_country() {
        assert_eq!(Locale::from_country("IN"), Some(Locale::Eu));
        assert_eq!(Locale::from_country("uk"), Some(Locale::Eu));
        assert_eq!(Locale::from_country("US"), Some(Locale::Us));
        assert_eq!(Locale::from_country("JP"), None);
    }

    #[test]
    fn test_locale_round_trip() {
        // A formatted date re-parsed under the same locale preserves the
        // date component.
        for s in ["31/03/2021", "01/02/2024", "15/06/2023"] {
            let (d, locale) = smart_parse(s, Locale::Eu).unwrap();
            let formatted = d.format("%Y-%m-%d").to_string();
            let (back, _) = smart_parse(&formatted, locale).unwrap();
            assert_eq!(d, back);
        }
    }
}
