pub mod display;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::error::Result;
use crate::ingest::{
    load_report, BlockMatch, ColumnRoleMap, LoadedReport, ProfileSet, RawReport, Role,
};
use crate::pricing::formulas::{base_target_cpc, corrected_cpc, loss_ratio, target_cpc, user_loss};
use crate::pricing::recommend::{bands_for, recommend_block, recommend_rewarded, Action, BlockKind};
use crate::pricing::variation::VariationBand;

/// Block names searched in the P1 report, by priority.
pub const INTERSTITIAL_TOKENS: [&str; 2] = ["interstitial", "offerwall"];
pub const MOB_TOP_TOKENS: [&str; 1] = ["mob_top"];
/// Synonyms for the rewarded placement in the P2 report, by priority.
pub const REWARDED_TOKENS: [&str; 5] = ["rewarded", "reward", "offerwall", "offer_wall", "offwall"];
/// Match rate at or above this is considered healthy.
pub const HEALTHY_COVERAGE_PCT: f64 = 40.0;

/// Form inputs for the overview.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverviewRequest {
    pub cpa: f64,
    pub roas_pct: f64,
    /// Current rule value; enables variation bands on recommendations.
    #[serde(default)]
    pub last_rule: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageTier {
    Healthy,
    Low,
}

impl CoverageTier {
    pub fn of(match_rate_pct: f64) -> Self {
        if match_rate_pct >= HEALTHY_COVERAGE_PCT {
            CoverageTier::Healthy
        } else {
            CoverageTier::Low
        }
    }
}

/// Comparison of a CPC against a reference value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Good,
    Below,
    Unknown,
}

impl Status {
    pub fn compare(value: Option<f64>, reference: Option<f64>) -> Self {
        match (value, reference) {
            (Some(v), Some(r)) if v >= r => Status::Good,
            (Some(_), Some(_)) => Status::Below,
            _ => Status::Unknown,
        }
    }
}

/// Metrics read from one block row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockMetrics {
    /// Block cell as written in the report.
    pub label: String,
    /// Synonym that selected the row.
    pub matched_token: String,
    pub requests: u64,
    pub clicks: u64,
    pub impressions: Option<u64>,
    pub ctr_pct: Option<f64>,
    pub match_rate_pct: Option<f64>,
    pub cpc: Option<f64>,
    pub revenue: Option<f64>,
    pub coverage: Option<CoverageTier>,
    /// Count columns whose cell could not be read cleanly.
    pub degraded: Vec<Role>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct P1Section {
    pub clicks_total: u64,
    pub interstitial: Option<BlockMetrics>,
    pub mob_top: Option<BlockMetrics>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct P2Section {
    pub clicks_total: u64,
    pub mob_top: Option<BlockMetrics>,
    pub rewarded: Option<BlockMetrics>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetSection {
    pub loss: f64,
    pub target_cpc: f64,
    /// CPA × ROAS without the loss adjustment.
    pub base_target_cpc: f64,
    pub interstitial_status: Status,
    pub mob_top_status: Status,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorrectedSection {
    pub block: String,
    pub user_loss: Option<f64>,
    pub corrected_cpc: Option<f64>,
    pub mob_top_cpc: Option<f64>,
    pub status: Status,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub block: String,
    /// `None` when an input metric is unknown.
    pub action: Option<Action>,
    pub bands: Vec<VariationBand>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverviewResult {
    pub p1: P1Section,
    pub p2: P2Section,
    pub target: TargetSection,
    pub corrected: Option<CorrectedSection>,
    pub recommendations: Vec<Recommendation>,
    pub columns: BTreeMap<String, ColumnRoleMap>,
}

fn tokens(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn block_metrics(report: &LoadedReport, hit: BlockMatch<'_>) -> BlockMetrics {
    let row = hit.row;
    let mut degraded = Vec::new();
    let mut count = |role: Role| -> Option<u64> {
        report.column(role).map(|col| {
            let c = row.count(col);
            if c.degraded {
                degraded.push(role);
            }
            c.value
        })
    };
    let requests = count(Role::Requests).unwrap_or(0);
    let clicks = count(Role::Clicks).unwrap_or(0);
    let impressions = count(Role::Impressions);

    let decimal = |role: Role| report.column(role).and_then(|col| row.decimal(col));
    let match_rate_pct = decimal(Role::MatchRate);

    BlockMetrics {
        label: report
            .column(Role::Block)
            .and_then(|col| row.get(col))
            .unwrap_or_default()
            .trim()
            .to_string(),
        matched_token: hit.token.to_string(),
        requests,
        clicks,
        impressions,
        ctr_pct: decimal(Role::Ctr),
        match_rate_pct,
        cpc: decimal(Role::Cpc),
        revenue: decimal(Role::Revenue),
        coverage: match_rate_pct.map(CoverageTier::of),
        degraded,
    }
}

fn find_block(report: &LoadedReport, synonyms: &[String]) -> Option<BlockMetrics> {
    let block_column = report.column(Role::Block)?;
    let hit = report.table.first_row_matching_any(block_column, synonyms)?;
    debug!(report = %report.name, token = hit.token, row = hit.row.index, "block row selected");
    Some(block_metrics(report, hit))
}

fn clicks_total(report: &LoadedReport) -> u64 {
    report
        .column(Role::Clicks)
        .map(|col| report.table.total_or_sum_count(col))
        .unwrap_or(0)
}

fn corrected_section(rewarded: &BlockMetrics, mob_top_cpc: Option<f64>) -> CorrectedSection {
    let lost = rewarded
        .match_rate_pct
        .map(|rate| user_loss(rewarded.requests, rate, rewarded.impressions.unwrap_or(0)));
    let corrected = match (rewarded.revenue, lost) {
        (Some(revenue), Some(lost)) => corrected_cpc(revenue, rewarded.clicks, lost),
        _ => None,
    };
    CorrectedSection {
        block: rewarded.matched_token.clone(),
        user_loss: lost,
        corrected_cpc: corrected,
        mob_top_cpc,
        status: Status::compare(corrected, mob_top_cpc),
    }
}

fn block_recommendation(
    name: &str,
    kind: BlockKind,
    block: Option<&BlockMetrics>,
    target: f64,
    last_rule: Option<f64>,
) -> Recommendation {
    let action = block.and_then(|b| match (b.cpc, b.match_rate_pct) {
        (Some(cpc), Some(coverage)) => Some(recommend_block(kind, cpc, target, coverage)),
        _ => None,
    });
    with_bands(name, action, last_rule)
}

fn with_bands(name: &str, action: Option<Action>, last_rule: Option<f64>) -> Recommendation {
    let bands = match (action, last_rule) {
        (Some(a), Some(rule)) => bands_for(a, rule),
        _ => Vec::new(),
    };
    Recommendation {
        block: name.to_string(),
        action,
        bands,
    }
}

/// P1 + P2 overview: per-block metrics, loss-adjusted target CPC, corrected
/// CPC for the rewarded placement and recommended actions.
#[tracing::instrument(level = "info", skip_all, fields(p1 = %p1.name, p2 = %p2.name))]
pub fn build_overview(
    p1: &RawReport,
    p2: &RawReport,
    request: &OverviewRequest,
    profiles: &ProfileSet,
) -> Result<OverviewResult> {
    let r1 = load_report(p1, &profiles.p1)?;
    let r2 = load_report(p2, &profiles.p2)?;

    // ─── P1 ─────────────────────────────────────────────────────────
    let p1_section = P1Section {
        clicks_total: clicks_total(&r1),
        interstitial: find_block(&r1, &tokens(&INTERSTITIAL_TOKENS)),
        mob_top: find_block(&r1, &tokens(&MOB_TOP_TOKENS)),
    };

    // ─── P2 ─────────────────────────────────────────────────────────
    let p2_section = P2Section {
        clicks_total: clicks_total(&r2),
        mob_top: find_block(&r2, &tokens(&MOB_TOP_TOKENS)),
        rewarded: find_block(&r2, &tokens(&REWARDED_TOKENS)),
    };

    // ─── target CPC (P1) ────────────────────────────────────────────
    let interstitial_requests = p1_section
        .interstitial
        .as_ref()
        .map(|b| b.requests)
        .unwrap_or(0);
    let loss = loss_ratio(
        interstitial_requests,
        p1_section.clicks_total,
        p2_section.clicks_total,
    );
    let target = target_cpc(request.cpa, request.roas_pct, loss);
    let base_target = base_target_cpc(request.cpa, request.roas_pct);
    let target_section = TargetSection {
        loss,
        target_cpc: target,
        base_target_cpc: base_target,
        interstitial_status: Status::compare(
            p1_section.interstitial.as_ref().and_then(|b| b.cpc),
            Some(target),
        ),
        mob_top_status: Status::compare(p1_section.mob_top.as_ref().and_then(|b| b.cpc), Some(target)),
    };

    // ─── corrected CPC (P2) ─────────────────────────────────────────
    let mob_top_p2_cpc = p2_section.mob_top.as_ref().and_then(|b| b.cpc);
    let corrected = p2_section
        .rewarded
        .as_ref()
        .map(|rw| corrected_section(rw, mob_top_p2_cpc));

    // ─── recommendations ────────────────────────────────────────────
    let mut recommendations = vec![
        block_recommendation(
            "interstitial",
            BlockKind::Interstitial,
            p1_section.interstitial.as_ref(),
            target,
            request.last_rule,
        ),
        block_recommendation(
            "mob_top",
            BlockKind::MobTop,
            p1_section.mob_top.as_ref(),
            target,
            request.last_rule,
        ),
    ];
    if let Some(c) = &corrected {
        let action = match (c.corrected_cpc, c.mob_top_cpc) {
            (Some(cpc), Some(mob)) => Some(recommend_rewarded(cpc, base_target, mob)),
            _ => None,
        };
        recommendations.push(with_bands(&c.block, action, request.last_rule));
    }

    info!(
        loss,
        target_cpc = target,
        corrected_cpc = ?corrected.as_ref().and_then(|c| c.corrected_cpc),
        "overview computed"
    );

    let columns = BTreeMap::from([
        (r1.name.clone(), r1.columns.clone()),
        (r2.name.clone(), r2.columns.clone()),
    ]);

    Ok(OverviewResult {
        p1: p1_section,
        p2: p2_section,
        target: target_section,
        corrected,
        recommendations,
        columns,
    })
}
