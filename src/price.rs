//! Monetary amounts from noisy text.

use regex::Regex;
use std::sync::LazyLock;

use crate::candidates::first_match;

/// Threshold used when neither the caller nor the goal text names one.
pub const DEFAULT_THRESHOLD: f64 = 100.0;

static THRESHOLD_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\$\s*(\d[\d,]*(?:\.\d{1,2})?)",
        r"(?i)(\d[\d,]*(?:\.\d{1,2})?)\s*dollars?\b",
        r"(?i)(\d[\d,]*(?:\.\d{1,2})?)\s*USD\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("built-in threshold pattern is valid"))
    .collect()
});

/// Parse a price such as `$1,234.56`, `1.234,56 €` or `12`.
///
/// Everything except digits, `.` and `,` is dropped. With both separators
/// present the later one is the decimal point; a lone `,` is decimal only
/// when exactly two digits follow it. Unparseable text yields `0.0`.
pub fn parse_amount(text: &str) -> f64 {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(comma), Some(dot)) if comma < dot => cleaned.replace(',', ""),
        (Some(_), Some(_)) => cleaned.replace('.', "").replace(',', "."),
        (Some(_), None) => match cleaned.split(',').nth(1) {
            Some(frac) if frac.len() == 2 && cleaned.matches(',').count() == 1 => {
                cleaned.replace(',', ".")
            }
            _ => cleaned.replace(',', ""),
        },
        _ => cleaned,
    };

    normalized
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(0.0)
}

/// `Some(amount)` when `text` parses to a strictly positive amount.
pub fn positive_amount(text: &str) -> Option<f64> {
    Some(parse_amount(text)).filter(|v| *v > 0.0)
}

/// Spending limit named in free text: `$N`, then `N dollars`, then `N USD`.
pub fn find_threshold(text: &str) -> Option<f64> {
    first_match(THRESHOLD_PATTERNS.iter(), |re| {
        re.captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| positive_amount(m.as_str()))
    })
}

/// Like [`find_threshold`], falling back to `default`.
pub fn extract_threshold(text: &str, default: f64) -> f64 {
    find_threshold(text).unwrap_or(default)
}

/// Two-decimal dollar rendering used in verdict messages.
pub fn format_usd(amount: f64) -> String {
    format!("${amount:.2}")
}
