use csv::ReaderBuilder;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use super::detect::{content_lines, Detection};
use super::numeric::{parse_count, parse_decimal, ParsedCount};

/// Rows of a report after the detected header line. Every row has exactly
/// `headers.len()` cells.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub detection: Detection,
}

/// Borrowed view of one table row.
#[derive(Clone, Copy, Debug)]
pub struct Row<'a> {
    pub index: usize,
    headers: &'a [String],
    cells: &'a [String],
}

impl<'a> Row<'a> {
    pub fn get(&self, column: &str) -> Option<&'a str> {
        self.headers
            .iter()
            .position(|h| h == column)
            .map(|i| self.cells[i].as_str())
    }

    pub fn first_cell(&self) -> &'a str {
        self.cells.first().map(String::as_str).unwrap_or_default()
    }

    /// A missing column reads as an empty cell.
    pub fn count(&self, column: &str) -> ParsedCount {
        parse_count(self.get(column).unwrap_or_default())
    }

    pub fn decimal(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(parse_decimal)
    }

    pub fn is_total(&self) -> bool {
        self.first_cell().trim().eq_ignore_ascii_case("total")
    }

    pub fn to_map(&self) -> BTreeMap<&'a str, &'a str> {
        self.headers
            .iter()
            .map(String::as_str)
            .zip(self.cells.iter().map(String::as_str))
            .collect()
    }
}

/// Row picked by a block token, with the synonym that found it.
#[derive(Clone, Copy, Debug)]
pub struct BlockMatch<'a> {
    pub token: &'a str,
    pub row: Row<'a>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TableSummary {
    pub header_index: usize,
    pub delimiter: char,
    pub columns: usize,
    pub rows: usize,
    pub has_total_row: bool,
}

impl ParsedTable {
    /// Tabulate `raw` from the detected header line onwards.
    pub fn from_text(raw: &str, detection: Detection) -> csv::Result<Self> {
        let lines = content_lines(raw);
        let body = lines
            .get(detection.header_index..)
            .unwrap_or_default()
            .join("\n");

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(detection.delimiter as u8)
            .from_reader(body.as_bytes());

        let mut records = reader.records();
        let headers = match records.next() {
            Some(first) => unique_headers(first?.iter()),
            None => Vec::new(),
        };

        let width = headers.len();
        let mut rows = Vec::new();
        let mut ragged = 0usize;
        for record in records {
            let record = record?;
            if record.len() != width {
                ragged += 1;
            }
            let mut cells: Vec<String> = record.iter().take(width).map(str::to_string).collect();
            cells.resize(width, String::new());
            rows.push(cells);
        }
        if ragged > 0 {
            debug!(ragged, width, "padded or truncated rows to header width");
        }

        Ok(Self {
            headers,
            rows,
            detection,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().enumerate().map(move |(index, cells)| Row {
            index,
            headers: &self.headers,
            cells,
        })
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        self.rows.get(index).map(|cells| Row {
            index,
            headers: &self.headers,
            cells,
        })
    }

    /// The report's own aggregate row, if it has one.
    pub fn total_row(&self) -> Option<Row<'_>> {
        self.iter().find(Row::is_total)
    }

    /// Count from the Total row when present, otherwise the sum over all
    /// other rows. The report's own total is never recomputed.
    pub fn total_or_sum_count(&self, column: &str) -> u64 {
        match self.total_row() {
            Some(total) => total.count(column).value,
            None => self
                .iter()
                .map(|r| r.count(column).value)
                .fold(0u64, u64::saturating_add),
        }
    }

    /// Decimal variant. A Total row with an unreadable value yields `None`;
    /// in the fallback sum unreadable cells contribute nothing.
    pub fn total_or_sum_decimal(&self, column: &str) -> Option<f64> {
        match self.total_row() {
            Some(total) => total.decimal(column),
            None => Some(self.iter().filter_map(|r| r.decimal(column)).sum()),
        }
    }

    /// First non-Total row whose block cell contains `token`, ignoring case.
    pub fn first_row_matching(&self, block_column: &str, token: &str) -> Option<Row<'_>> {
        let needle = token.to_lowercase();
        self.iter().filter(|r| !r.is_total()).find(|r| {
            r.get(block_column)
                .map(str::trim)
                .filter(|cell| !cell.is_empty())
                .map(|cell| cell.to_lowercase().contains(&needle))
                .unwrap_or(false)
        })
    }

    /// Try synonyms in priority order; the first one that hits wins.
    pub fn first_row_matching_any<'a>(
        &'a self,
        block_column: &str,
        tokens: &'a [String],
    ) -> Option<BlockMatch<'a>> {
        tokens.iter().find_map(|token| {
            self.first_row_matching(block_column, token)
                .map(|row| BlockMatch {
                    token: token.as_str(),
                    row,
                })
        })
    }

    pub fn summary(&self) -> TableSummary {
        TableSummary {
            header_index: self.detection.header_index,
            delimiter: self.detection.delimiter,
            columns: self.headers.len(),
            rows: self.rows.len(),
            has_total_row: self.total_row().is_some(),
        }
    }
}

/// Blank headers become `unnamed_<i>`; repeats get `.1`, `.2`, ...
fn unique_headers<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    raw.enumerate()
        .map(|(i, h)| {
            let base = if h.trim().is_empty() {
                format!("unnamed_{}", i)
            } else {
                h.to_string()
            };
            let n = seen.entry(base.clone()).or_insert(0);
            let name = if *n == 0 {
                base
            } else {
                format!("{}.{}", base, n)
            };
            *n += 1;
            name
        })
        .collect()
}
