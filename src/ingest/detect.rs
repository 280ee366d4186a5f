use serde::{Deserialize, Serialize};
use tracing::debug;

use super::normalize::normalize;

/// Reports rarely carry more than a handful of preamble lines.
pub const MAX_SCAN_LINES: usize = 60;
/// Vocabulary hits needed before a line is accepted as the header.
pub const MIN_HEADER_MATCHES: usize = 2;
/// Candidate delimiters, in tie-break order.
pub const DELIMITERS: [char; 3] = [';', ',', '\t'];

/// Where the table starts and how its fields are separated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    /// Index among the non-blank lines of the report.
    pub header_index: usize,
    pub delimiter: char,
}

/// Non-blank lines, in order. Header indices refer to this sequence.
pub fn content_lines(raw: &str) -> Vec<&str> {
    raw.lines().filter(|l| !l.trim().is_empty()).collect()
}

/// Find the header row and the delimiter. Never fails: with no convincing
/// header the first line is used.
pub fn detect(raw: &str, vocabulary: &[String]) -> Detection {
    let lines = content_lines(raw);
    let phrases = normalized_vocabulary(vocabulary);

    let header_index = lines
        .iter()
        .take(MAX_SCAN_LINES)
        .position(|line| {
            let key = normalize(line);
            phrases.iter().filter(|p| key.contains(p.as_str())).count() >= MIN_HEADER_MATCHES
        })
        .unwrap_or(0);

    let delimiter = lines
        .get(header_index)
        .map(|line| widest_delimiter(line))
        .unwrap_or(DELIMITERS[0]);

    debug!(header_index, delimiter = ?delimiter, lines = lines.len(), "detected report layout");
    Detection {
        header_index,
        delimiter,
    }
}

/// Delimiter producing the most fields; earlier candidates win ties.
pub fn widest_delimiter(line: &str) -> char {
    let mut best = DELIMITERS[0];
    let mut max_fields = 0;
    for d in DELIMITERS {
        let fields = line.split(d).count();
        if fields > max_fields {
            best = d;
            max_fields = fields;
        }
    }
    best
}

/// Accented and plain spellings collapse to one key; each counts once.
fn normalized_vocabulary(vocabulary: &[String]) -> Vec<String> {
    let mut phrases: Vec<String> = Vec::with_capacity(vocabulary.len());
    for phrase in vocabulary.iter().map(|v| normalize(v)) {
        if !phrase.is_empty() && !phrases.contains(&phrase) {
            phrases.push(phrase);
        }
    }
    phrases
}
