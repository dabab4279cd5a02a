// Utility helpers for parsing, normalization, and number formatting.
//
// Imported project data is messy: amounts arrive with thousands separators,
// dates arrive in several encodings, and codes differ only in case. This
// module centralizes that handling so the rest of the code can assume clean,
// typed values.
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues that are common in spreadsheet exports.
///
/// - Accepts `Option<&str>` so callers can pass through optional fields.
/// - Trims whitespace.
/// - Rejects values that contain alphabetic characters.
/// - Strips thousands separators like `","` before parsing.
/// - Returns `None` for anything that cannot be parsed into a finite number,
///   so a `NaN` can never reach a running sum.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let s = s.replace(',', "");
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Like [`parse_f64_safe`] but resolves anything unparseable to `0.0`.
pub fn number_or_zero(s: Option<&str>) -> f64 {
    parse_f64_safe(s).unwrap_or(0.0)
}

/// Returns the value only when it is strictly positive.
pub fn positive(v: Option<f64>) -> Option<f64> {
    v.filter(|n| *n > 0.0)
}

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    // Timestamps keep their calendar date as written; the offset is ignored.
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    None
}

/// Lowercase and trim, for case-insensitive name comparisons.
pub fn normalize_text(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Uppercase and trim, for project code comparisons.
pub fn normalize_code(s: &str) -> String {
    s.trim().to_uppercase()
}

/// Returns the trimmed text, or `None` when it is empty.
pub fn non_empty(s: Option<&str>) -> Option<String> {
    let s = s?.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

pub fn parse_bool_safe(s: Option<&str>) -> bool {
    matches!(
        s.map(normalize_text).as_deref(),
        Some("true" | "1" | "yes" | "y" | "t")
    )
}

/// Money-style rendering: fixed decimals and `,` thousands separators,
/// e.g. `1,234,567.89`.
///
/// Integer parts beyond `u128` (only reachable with absurd `f64` inputs) are
/// printed without grouping rather than collapsing to zero.
pub fn format_number(n: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, n.abs());
    let (digits, frac) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };
    let mut out = match digits.parse::<u128>() {
        Ok(v) => v.to_formatted_string(&Locale::en),
        Err(_) => digits.to_string(),
    };
    if let Some(frac) = frac {
        out.push('.');
        out.push_str(frac);
    }
    // "-0.00" reads as a loss; rounding to zero drops the sign.
    let is_zero = out.chars().all(|c| matches!(c, '0' | ',' | '.'));
    if n.is_sign_negative() && !is_zero {
        out.insert(0, '-');
    }
    out
}

/// Grouped integer counts for console messages, e.g. `9,855 rows`.
pub fn format_int<T: ToFormattedString>(n: T) -> String {
    n.to_formatted_string(&Locale::en)
}
