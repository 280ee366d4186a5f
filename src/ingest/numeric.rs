use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// `1.234` / `12.345.678`: periods used purely as thousands grouping.
static THOUSANDS_BY_PERIOD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,3}(\.\d{3})+$").expect("valid thousands regex"));

const CURRENCY_MARKERS: [&str; 2] = ["US$", "R$"];

/// Count parsed from a cell. `degraded` means the text did not yield a
/// clean integer and `value` is a fallback (usually 0).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedCount {
    pub value: u64,
    pub degraded: bool,
}

impl ParsedCount {
    fn clean(value: u64) -> Self {
        Self {
            value,
            degraded: false,
        }
    }

    fn fallback(value: u64) -> Self {
        Self {
            value,
            degraded: true,
        }
    }
}

/// Drop currency markers, percent signs and every kind of space.
fn strip_markers(text: &str) -> String {
    let mut s = text.trim().replace('\u{00A0}', " ");
    for marker in CURRENCY_MARKERS {
        s = s.replace(marker, "");
    }
    s.replace('%', "").replace(' ', "")
}

/// Percentages and currency: `"1.234,56"`, `"1,234.56"`, `"12,5%"`, `"US$ 0,45"`.
///
/// When both separators are present the one occurring last is the decimal
/// point. A lone comma is always a decimal comma. `None` means unknown, never 0.
pub fn parse_decimal(text: &str) -> Option<f64> {
    let s = strip_markers(text);
    let canonical = match (s.rfind(','), s.rfind('.')) {
        (Some(comma), Some(period)) if comma > period => s.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => s.replace(',', ""),
        (Some(_), None) => s.replace(',', "."),
        _ => s,
    };
    canonical.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Request, click and impression counts. Anything after the fractional
/// marker is discarded; `"1.234.567"` is read as grouped thousands.
pub fn parse_count(text: &str) -> ParsedCount {
    let s: String = strip_markers(text)
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();

    let integral: String = match (s.rfind(','), s.rfind('.')) {
        (Some(comma), Some(period)) if comma > period => before_first(&s.replace('.', ""), ','),
        (Some(_), Some(_)) => before_first(&s.replace(',', ""), '.'),
        (Some(_), None) => before_first(&s, ','),
        (None, Some(_)) if THOUSANDS_BY_PERIOD.is_match(&s) => s.replace('.', ""),
        (None, Some(_)) => before_first(&s, '.'),
        (None, None) => s,
    };

    if integral.is_empty() {
        return ParsedCount::fallback(0);
    }
    if let Ok(v) = integral.parse::<u64>() {
        return ParsedCount::clean(v);
    }
    match integral.parse::<f64>() {
        // Saturates on overflow.
        Ok(v) if v.is_finite() => ParsedCount::fallback(v.trunc() as u64),
        _ => ParsedCount::fallback(0),
    }
}

fn before_first(s: &str, sep: char) -> String {
    s.split(sep).next().unwrap_or_default().to_string()
}
