use adopspricer::{
    config::{init_tracing, AppConfig},
    ingest::{inspect_report, RawReport, ReportInspection, ReportProfile},
};
use anyhow::{Context, Result};
use glob::glob;
use rayon::prelude::*;
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

const DEFAULT_PATTERN: &str = "reports/**/*.csv";

fn inspect_path(path: &Path, profile: &ReportProfile) -> Result<ReportInspection> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read '{}'", path.display()))?;
    let raw = RawReport::new(path.display().to_string(), bytes);
    inspect_report(&raw, profile).with_context(|| format!("Failed to inspect '{}'", path.display()))
}

fn collect_paths(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths: Vec<PathBuf> = glob(pattern)
        .with_context(|| format!("Failed to read glob pattern '{}'", pattern))?
        .filter_map(|entry| entry.ok())
        .collect();
    if paths.is_empty() {
        return Err(anyhow::anyhow!("No report files found under '{}'", pattern));
    }
    Ok(paths)
}

/// Usage: inspect_reports [PATTERN] [p1|p2]
fn main() -> Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing(&config.log_level);

    let mut args = env::args().skip(1);
    let pattern = args.next().unwrap_or_else(|| DEFAULT_PATTERN.to_string());
    let profiles = config.profiles()?;
    let profile = match args.next().as_deref() {
        None | Some("p1") => profiles.p1,
        Some("p2") => profiles.p2,
        Some(other) => anyhow::bail!("unknown profile '{}', expected p1 or p2", other),
    };

    let paths = collect_paths(&pattern)?;
    info!(files = paths.len(), %pattern, profile = %profile.name, "inspecting reports");

    // In parallel: detect layout and map columns for every file
    let results: Vec<(PathBuf, Result<ReportInspection>)> = paths
        .par_iter()
        .map(|path| (path.clone(), inspect_path(path, &profile)))
        .collect();

    let mut complete = 0usize;
    let mut incomplete = 0usize;
    let mut failed = 0usize;
    for (path, result) in &results {
        match result {
            Ok(i) if i.missing.is_empty() => {
                complete += 1;
                println!(
                    "✅ {}: header line {}, delimiter {:?}, {} rows",
                    path.display(),
                    i.summary.header_index,
                    i.summary.delimiter,
                    i.summary.rows
                );
            }
            Ok(i) => {
                incomplete += 1;
                let missing: Vec<&str> = i.missing.iter().map(|r| r.as_str()).collect();
                println!(
                    "⚠️  {}: header line {}, missing {}",
                    path.display(),
                    i.summary.header_index,
                    missing.join(", ")
                );
            }
            Err(e) => {
                failed += 1;
                warn!("❌ {:#}", e);
            }
        }
    }

    println!(
        "\n{} complete, {} missing columns, {} failed",
        complete, incomplete, failed
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn inspects_every_matching_file() -> Result<()> {
        let dir = TempDir::new()?;
        let good = "Bloco de anúncios,Solicitações de anúncios,Cliques do Ad Exchange,CTR do Ad Exchange,Taxa de correspondência,CPC do Ad Exchange\nmob_top,10,1,10%,50%,0.10\n";
        let partial = "Bloco de anúncios;Cliques do Ad Exchange\nmob_top;1\n";
        for (name, body) in [("a.csv", good), ("b.csv", partial)] {
            let mut f = fs::File::create(dir.path().join(name))?;
            f.write_all(body.as_bytes())?;
        }

        let pattern = format!("{}/*.csv", dir.path().display());
        let mut paths = collect_paths(&pattern)?;
        paths.sort();
        assert_eq!(paths.len(), 2);

        let profile = ReportProfile::p1();
        let a = inspect_path(&paths[0], &profile)?;
        assert!(a.missing.is_empty());
        assert_eq!(a.summary.delimiter, ',');

        let b = inspect_path(&paths[1], &profile)?;
        assert!(!b.missing.is_empty());
        Ok(())
    }

    #[test]
    fn empty_pattern_is_an_error() {
        assert!(collect_paths("/nonexistent-dir/*.csv").is_err());
    }
}
