use adopspricer::{
    build_overview,
    config::{init_tracing, AppConfig},
    ingest::{inspect_report, ProfileSet, RawReport, ReportInspection},
    overview::display,
    pricing::{
        analyze_block, analyze_rewarded, variation_bands, BlockAnalysisInput, BlockKind,
        CorrectedCpcInput, Direction, RewardedAnalysisInput, TargetCpcInput, VariationBand,
    },
    OverviewRequest,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

#[derive(Parser)]
#[command(author, version, about = "Ad-ops pricing calculators", long_about = None)]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
    /// YAML file overriding the built-in report profiles (else ADOPS_PROFILES)
    #[arg(long, global = true)]
    profiles: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProfileKind {
    P1,
    P2,
}

#[derive(Subcommand)]
enum Commands {
    /// Full P1 + P2 report overview
    Overview {
        #[arg(long)]
        p1: PathBuf,
        #[arg(long)]
        p2: PathBuf,
        #[arg(long, value_parser = non_negative)]
        cpa: f64,
        /// ROAS target in percent
        #[arg(long, value_parser = non_negative)]
        roas: f64,
        /// Current rule value; adds variation bands to each recommendation
        #[arg(long, value_parser = non_negative)]
        last_rule: Option<f64>,
    },
    /// Loss ratio and loss-adjusted target CPC
    TargetCpc {
        #[arg(long)]
        requests: u64,
        #[arg(long)]
        clicks_p1: u64,
        #[arg(long)]
        clicks_p2: u64,
        #[arg(long, value_parser = non_negative)]
        cpa: f64,
        #[arg(long, value_parser = non_negative)]
        roas: f64,
    },
    /// User loss and corrected CPC
    CorrectedCpc {
        #[arg(long)]
        requests: u64,
        /// Match rate in percent
        #[arg(long, value_parser = non_negative)]
        coverage: f64,
        #[arg(long)]
        impressions: u64,
        #[arg(long)]
        clicks: u64,
        #[arg(long, value_parser = non_negative)]
        revenue: f64,
    },
    /// Rule recommendation for a display block
    Block {
        #[arg(long, value_enum)]
        block: BlockKind,
        #[arg(long, value_parser = non_negative)]
        cpc: f64,
        #[arg(long, value_parser = non_negative)]
        coverage: f64,
        #[arg(long, value_parser = non_negative)]
        last_rule: f64,
        #[arg(long, value_parser = non_negative)]
        cpa: f64,
        #[arg(long, value_parser = non_negative)]
        roas: f64,
    },
    /// Rule recommendation for a rewarded placement
    Rewarded {
        #[arg(long)]
        requests: u64,
        #[arg(long)]
        impressions: u64,
        #[arg(long)]
        clicks: u64,
        #[arg(long, value_parser = non_negative)]
        coverage: f64,
        #[arg(long, value_parser = non_negative)]
        revenue: f64,
        #[arg(long, value_parser = non_negative)]
        last_rule: f64,
        #[arg(long, value_parser = non_negative)]
        cpa: f64,
        #[arg(long, value_parser = non_negative)]
        roas: f64,
        #[arg(long, value_parser = non_negative)]
        mob_top_cpc: f64,
    },
    /// Light / medium / aggressive bands around a rule value
    Variation {
        #[arg(long, value_parser = non_negative)]
        base: f64,
        #[arg(long, value_enum)]
        direction: Direction,
    },
    /// Show detected layout and column mapping of report files
    Inspect {
        #[arg(long, value_enum, default_value = "p1")]
        profile: ProfileKind,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn non_negative(s: &str) -> Result<f64, String> {
    let v: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("{s:?} is not a number"))?;
    if v.is_finite() && v >= 0.0 {
        Ok(v)
    } else {
        Err(format!("{s} must be a non-negative number"))
    }
}

fn read_report(path: &Path, name: &str) -> Result<RawReport> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(RawReport::new(name, bytes))
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce(&T) -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", text(value));
    }
    Ok(())
}

fn corrected_text(cpc: Option<f64>) -> String {
    match cpc {
        Some(_) => display::fmt_money(cpc),
        None => "cannot divide by zero (clicks + user loss is 0)".to_string(),
    }
}

fn bands_text(bands: &[VariationBand]) -> String {
    bands
        .iter()
        .map(|b| format!("  {}\n", b.describe()))
        .collect()
}

fn inspection_text(i: &ReportInspection) -> String {
    let mut out = format!(
        "{}: header line {}, delimiter {:?}, {} columns, {} rows{}\n",
        i.name,
        i.summary.header_index,
        i.summary.delimiter,
        i.summary.columns,
        i.summary.rows,
        if i.summary.has_total_row { ", Total row" } else { "" },
    );
    for (role, header) in &i.columns.0 {
        out.push_str(&format!(
            "  {:<12} {}\n",
            role.as_str(),
            header.as_deref().unwrap_or(display::PLACEHOLDER)
        ));
    }
    if !i.missing.is_empty() {
        let missing: Vec<&str> = i.missing.iter().map(|r| r.as_str()).collect();
        out.push_str(&format!("  missing: {}\n", missing.join(", ")));
    }
    out
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    init_tracing(&config.log_level);

    let profiles = match &cli.profiles {
        Some(path) => ProfileSet::load(Some(path))?,
        None => config.profiles()?,
    };

    match cli.command {
        Commands::Overview {
            p1,
            p2,
            cpa,
            roas,
            last_rule,
        } => {
            let request = OverviewRequest {
                cpa,
                roas_pct: roas,
                last_rule,
            };
            let result = build_overview(
                &read_report(&p1, "P1")?,
                &read_report(&p2, "P2")?,
                &request,
                &profiles,
            )?;
            emit(cli.json, &result, display::render)?;
        }
        Commands::TargetCpc {
            requests,
            clicks_p1,
            clicks_p2,
            cpa,
            roas,
        } => {
            let result = TargetCpcInput {
                requests,
                clicks_p1,
                clicks_p2,
                cpa,
                roas_pct: roas,
            }
            .compute();
            emit(cli.json, &result, |r| {
                format!(
                    "loss: {}\ntarget CPC: {}\n",
                    display::fmt_ratio_pct(r.loss),
                    display::fmt_money(Some(r.target_cpc))
                )
            })?;
        }
        Commands::CorrectedCpc {
            requests,
            coverage,
            impressions,
            clicks,
            revenue,
        } => {
            let result = CorrectedCpcInput {
                requests,
                coverage_pct: coverage,
                impressions,
                clicks,
                revenue,
            }
            .compute();
            emit(cli.json, &result, |r| {
                format!(
                    "user loss: {:.2}\ncorrected CPC: {}\n",
                    r.user_loss,
                    corrected_text(r.corrected_cpc)
                )
            })?;
        }
        Commands::Block {
            block,
            cpc,
            coverage,
            last_rule,
            cpa,
            roas,
        } => {
            let result = analyze_block(&BlockAnalysisInput {
                block,
                cpc,
                coverage_pct: coverage,
                last_rule,
                cpa,
                roas_pct: roas,
            });
            emit(cli.json, &result, |r| {
                format!(
                    "target CPC: {}\naction: {}\n{}",
                    display::fmt_money(Some(r.target_cpc)),
                    r.action.as_str(),
                    bands_text(&r.bands)
                )
            })?;
        }
        Commands::Rewarded {
            requests,
            impressions,
            clicks,
            coverage,
            revenue,
            last_rule,
            cpa,
            roas,
            mob_top_cpc,
        } => {
            let result = analyze_rewarded(&RewardedAnalysisInput {
                requests,
                impressions,
                clicks,
                coverage_pct: coverage,
                revenue,
                last_rule,
                cpa,
                roas_pct: roas,
                mob_top_cpc,
            });
            emit(cli.json, &result, |r| {
                format!(
                    "user loss: {}\ncorrected CPC: {}\ntarget CPC: {}\naction: {}\n{}",
                    display::fmt_count(r.user_loss),
                    corrected_text(r.corrected_cpc),
                    display::fmt_money(Some(r.target_cpc)),
                    r.action.map(|a| a.as_str()).unwrap_or(display::PLACEHOLDER),
                    bands_text(&r.bands)
                )
            })?;
        }
        Commands::Variation { base, direction } => {
            let bands = variation_bands(base, direction);
            emit(cli.json, &bands, |b| bands_text(b))?;
        }
        Commands::Inspect { profile, files } => {
            let profile = match profile {
                ProfileKind::P1 => &profiles.p1,
                ProfileKind::P2 => &profiles.p2,
            };
            let mut inspections = Vec::with_capacity(files.len());
            for path in &files {
                let name = path.display().to_string();
                inspections.push(inspect_report(&read_report(path, &name)?, profile)?);
            }
            info!(files = inspections.len(), profile = %profile.name, "inspected");
            emit(cli.json, &inspections, |all| {
                all.iter().map(inspection_text).collect::<Vec<_>>().join("\n")
            })?;
        }
    }
    Ok(())
}
