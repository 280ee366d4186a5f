use thiserror::Error;

use crate::ingest::columns::Role;

/// Structural failures that stop processing of a single report.
///
/// Soft failures (an unparseable percentage, a garbled count) never show up
/// here; they travel as `None` or as a degraded `ParsedCount` instead.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("{report}: missing columns: {}", join_roles(.roles))]
    MissingColumns { report: String, roles: Vec<Role> },

    #[error("{report}: no row found for block(s): {}", .tokens.join(", "))]
    MissingBlocks { report: String, tokens: Vec<String> },

    #[error("{report}: report is empty")]
    EmptyReport { report: String },

    #[error("{report}: CSV error: {source}")]
    Csv {
        report: String,
        #[source]
        source: csv::Error,
    },
}

fn join_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(|r| r.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, IngestError>;
