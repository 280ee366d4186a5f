use anyhow::{Context, Result};
use std::{env, path::PathBuf};
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::ingest::ProfileSet;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Process settings taken from the environment.
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub port: u16,
    pub log_level: String,
    /// Upper bound on an uploaded report (and the whole multipart form).
    pub max_upload_bytes: u64,
    /// YAML file overriding the built-in report profiles.
    pub profiles_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            profiles_path: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let port = match lookup("PORT") {
            Some(v) => v
                .trim()
                .parse()
                .with_context(|| format!("PORT must be a port number, got {v:?}"))?,
            None => defaults.port,
        };
        let max_upload_bytes = match lookup("MAX_UPLOAD_BYTES") {
            Some(v) => v
                .trim()
                .parse()
                .with_context(|| format!("MAX_UPLOAD_BYTES must be a byte count, got {v:?}"))?,
            None => defaults.max_upload_bytes,
        };

        Ok(Self {
            port,
            log_level: lookup("LOG_LEVEL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.log_level),
            max_upload_bytes,
            profiles_path: lookup("ADOPS_PROFILES")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    pub fn profiles(&self) -> Result<ProfileSet> {
        ProfileSet::load(self.profiles_path.as_deref())
    }
}

/// `RUST_LOG` wins; `level` is added as the default directive.
pub fn init_tracing(level: &str) {
    fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(level.parse().unwrap_or(Level::INFO.into())),
        )
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() -> Result<()> {
        let cfg = AppConfig::from_lookup(lookup(&[]))?;
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.max_upload_bytes, 10 * 1024 * 1024);
        Ok(())
    }

    #[test]
    fn reads_overrides() -> Result<()> {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("PORT", "9090"),
            ("LOG_LEVEL", "debug"),
            ("MAX_UPLOAD_BYTES", "2048"),
            ("ADOPS_PROFILES", "/etc/adops/profiles.yaml"),
        ]))?;
        assert_eq!(cfg.port, 9090);
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.max_upload_bytes, 2048);
        assert_eq!(
            cfg.profiles_path,
            Some(PathBuf::from("/etc/adops/profiles.yaml"))
        );
        Ok(())
    }

    #[test]
    fn bad_port_is_an_error() {
        let err = AppConfig::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn profiles_come_from_the_configured_file() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        writeln!(tmp, "p1:\n  name: Full\n  required: [block]\np2:\n  name: Reduced\n  required: [block]")?;
        let cfg = AppConfig {
            profiles_path: Some(tmp.path().to_path_buf()),
            ..AppConfig::default()
        };
        let set = cfg.profiles()?;
        assert_eq!(set.p1.name, "Full");
        assert_eq!(set.p2.name, "Reduced");
        assert_eq!(AppConfig::default().profiles()?, ProfileSet::default());
        Ok(())
    }
}
