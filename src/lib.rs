pub mod config;
pub mod error;
pub mod ingest;
pub mod overview;
pub mod pricing;

pub use error::IngestError;
pub use ingest::{load_report, ParsedTable, ReportProfile};
pub use overview::{build_overview, OverviewRequest, OverviewResult};
