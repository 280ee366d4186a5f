// src/ingest/mod.rs
pub mod columns;
pub mod detect;
pub mod normalize;
pub mod numeric;
pub mod profile;
pub mod table;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{IngestError, Result};
pub use columns::{resolve_columns, ColumnRoleMap, Role, RoleTable};
pub use detect::{detect, Detection};
pub use normalize::normalize;
pub use numeric::{parse_count, parse_decimal, ParsedCount};
pub use profile::{ProfileSet, ReportProfile};
pub use table::{BlockMatch, ParsedTable, Row, TableSummary};

/// An uploaded export exactly as received.
#[derive(Clone, Debug)]
pub struct RawReport {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl RawReport {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// UTF-8 with the BOM dropped; undecodable bytes are skipped.
    pub fn decode(&self) -> String {
        let bytes = self
            .bytes
            .strip_prefix(b"\xEF\xBB\xBF".as_slice())
            .unwrap_or(&self.bytes);
        String::from_utf8_lossy(bytes)
            .chars()
            .filter(|c| *c != char::REPLACEMENT_CHARACTER)
            .collect()
    }
}

/// A tabulated report whose required roles all resolved.
#[derive(Clone, Debug)]
pub struct LoadedReport {
    pub name: String,
    pub table: ParsedTable,
    pub columns: ColumnRoleMap,
}

impl LoadedReport {
    /// Header for a role that the profile guaranteed.
    pub fn column(&self, role: Role) -> Option<&str> {
        self.columns.get(role)
    }
}

/// Layout and column mapping of a report, without enforcing the profile.
#[derive(Clone, Debug, Serialize)]
pub struct ReportInspection {
    pub name: String,
    pub summary: TableSummary,
    pub headers: Vec<String>,
    pub columns: ColumnRoleMap,
    pub missing: Vec<Role>,
}

fn tabulate(raw: &RawReport, profile: &ReportProfile) -> Result<ParsedTable> {
    let text = raw.decode();
    if text.trim().is_empty() {
        return Err(IngestError::EmptyReport {
            report: raw.name.clone(),
        });
    }
    let detection = detect(&text, &profile.vocabulary);
    ParsedTable::from_text(&text, detection).map_err(|source| IngestError::Csv {
        report: raw.name.clone(),
        source,
    })
}

/// Detect, tabulate and map columns without failing on missing roles.
pub fn inspect_report(raw: &RawReport, profile: &ReportProfile) -> Result<ReportInspection> {
    let table = tabulate(raw, profile)?;
    let columns = resolve_columns(&table.headers, &profile.roles);
    let missing = columns.missing(&profile.required);
    Ok(ReportInspection {
        name: raw.name.clone(),
        summary: table.summary(),
        headers: table.headers,
        columns,
        missing,
    })
}

/// Full ingestion: layout detection, tabulation, column resolution and the
/// profile's structural checks (required roles, required blocks).
#[tracing::instrument(level = "info", skip(raw, profile), fields(report = %raw.name, profile = %profile.name, bytes = raw.bytes.len()))]
pub fn load_report(raw: &RawReport, profile: &ReportProfile) -> Result<LoadedReport> {
    let table = tabulate(raw, profile)?;
    let columns = resolve_columns(&table.headers, &profile.roles);
    debug!(?columns, "resolved columns");

    let missing = columns.missing(&profile.required);
    if !missing.is_empty() {
        warn!(?missing, headers = ?table.headers, "required columns not found");
        return Err(IngestError::MissingColumns {
            report: raw.name.clone(),
            roles: missing,
        });
    }

    if let Some(block_column) = columns.get(Role::Block) {
        let absent: Vec<String> = profile
            .required_blocks
            .iter()
            .filter(|synonyms| table.first_row_matching_any(block_column, synonyms).is_none())
            .map(|synonyms| synonyms.join("|"))
            .collect();
        if !absent.is_empty() {
            warn!(?absent, "required blocks not found");
            return Err(IngestError::MissingBlocks {
                report: raw.name.clone(),
                tokens: absent,
            });
        }
    }

    info!(rows = table.rows.len(), columns = table.headers.len(), "report loaded");
    Ok(LoadedReport {
        name: raw.name.clone(),
        table,
        columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,adopspricer::ingest=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    const P1_CSV: &str = "\u{FEFF}Relatório de Ad Exchange\n\
Rede: Exemplo\n\
Período: 01/09/2025 - 30/09/2025\n\
Bloco de anúncios;Solicitações de anúncios;Cliques do Ad Exchange;CTR do Ad Exchange;Taxa de correspondência;CPC do Ad Exchange\n\
app_interstitial;1.000;120;1,20%;45,00%;US$ 0,52\n\
mob_top;2.500;480;2,00%;35,50%;US$ 0,31\n\
Total;3.500;600;1,71%;38,00%;US$ 0,40\n";

    fn p1_report() -> RawReport {
        RawReport::new("P1", P1_CSV.as_bytes())
    }

    #[test]
    fn decode_drops_bom_and_invalid_bytes() {
        let raw = RawReport::new("x", b"\xEF\xBB\xBFa;\xFFb".to_vec());
        assert_eq!(raw.decode(), "a;b");
    }

    #[test]
    fn loads_p1_report_end_to_end() -> anyhow::Result<()> {
        init_test_logging();
        let report = load_report(&p1_report(), &ReportProfile::p1())?;
        assert_eq!(report.table.detection.header_index, 3);
        assert_eq!(report.table.detection.delimiter, ';');
        assert_eq!(report.column(Role::Cpc), Some("CPC do Ad Exchange"));

        let clicks = report.column(Role::Clicks).unwrap();
        assert_eq!(report.table.total_or_sum_count(clicks), 600);

        let block = report.column(Role::Block).unwrap();
        let mob = report.table.first_row_matching(block, "mob_top").unwrap();
        assert_eq!(mob.count(report.column(Role::Requests).unwrap()).value, 2500);
        assert_eq!(mob.decimal(report.column(Role::Cpc).unwrap()), Some(0.31));
        Ok(())
    }

    #[test]
    fn missing_required_columns_are_named() {
        let err = load_report(&p1_report(), &ReportProfile::p2()).unwrap_err();
        match err {
            IngestError::MissingColumns { report, roles } => {
                assert_eq!(report, "P1");
                assert_eq!(roles, vec![Role::Impressions, Role::Revenue]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_required_block_is_reported() {
        init_test_logging();
        let csv = P1_CSV.replace("mob_top", "mob_bottom");
        let raw = RawReport::new("P1", csv.into_bytes());
        let err = load_report(&raw, &ReportProfile::p1()).unwrap_err();
        match err {
            IngestError::MissingBlocks { tokens, .. } => assert_eq!(tokens, vec!["mob_top"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn offerwall_satisfies_interstitial_requirement() {
        let csv = P1_CSV.replace("app_interstitial", "app_offerwall");
        let raw = RawReport::new("P1", csv.into_bytes());
        assert!(load_report(&raw, &ReportProfile::p1()).is_ok());
    }

    #[test]
    fn empty_report_is_rejected() {
        let raw = RawReport::new("P2", b"\xEF\xBB\xBF \n\n".to_vec());
        assert!(matches!(
            load_report(&raw, &ReportProfile::p2()),
            Err(IngestError::EmptyReport { .. })
        ));
    }

    #[test]
    fn inspection_lists_missing_roles_without_failing() -> anyhow::Result<()> {
        let inspection = inspect_report(&p1_report(), &ReportProfile::p2())?;
        assert_eq!(inspection.missing, vec![Role::Impressions, Role::Revenue]);
        assert_eq!(inspection.summary.rows, 3);
        assert!(inspection.summary.has_total_row);
        Ok(())
    }
}
