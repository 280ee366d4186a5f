use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use super::columns::{Role, RoleTable};

/// Header phrases of a GAM export. Accented and plain spellings are both
/// listed; they normalize to the same key.
pub fn default_vocabulary() -> Vec<String> {
    [
        "bloco de anúncios",
        "bloco de anuncios",
        "cliques do ad exchange",
        "ctr do ad exchange",
        "taxa de correspondência",
        "taxa de correspondencia",
        "solicitações de anúncios",
        "solicitacoes de anuncios",
        "impressões do ad exchange",
        "receita do ad exchange",
        "cpc do ad exchange",
        "ecpm medio do ad exchange",
        "ad unit",
        "ad requests",
        "ad exchange clicks",
        "ad exchange ctr",
        "match rate",
        "ad exchange impressions",
        "ad exchange revenue",
        "ad exchange cpc",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// How one kind of report is ingested: which roles must resolve, which
/// phrases identify its header, which blocks must be present.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportProfile {
    pub name: String,
    pub required: Vec<Role>,
    #[serde(default = "default_vocabulary")]
    pub vocabulary: Vec<String>,
    #[serde(default)]
    pub roles: RoleTable,
    /// Each entry is a list of synonyms; at least one must match a row.
    #[serde(default)]
    pub required_blocks: Vec<Vec<String>>,
}

impl ReportProfile {
    /// Full report: per-block CPC and CTR are mandatory.
    pub fn p1() -> Self {
        Self {
            name: "P1".into(),
            required: vec![
                Role::Block,
                Role::Requests,
                Role::Clicks,
                Role::Ctr,
                Role::MatchRate,
                Role::Cpc,
            ],
            vocabulary: default_vocabulary(),
            roles: RoleTable::default(),
            required_blocks: vec![
                vec!["interstitial".into(), "offerwall".into()],
                vec!["mob_top".into()],
            ],
        }
    }

    /// Reduced report: CPC and CTR may be absent.
    pub fn p2() -> Self {
        Self {
            name: "P2".into(),
            required: vec![
                Role::Block,
                Role::Requests,
                Role::Clicks,
                Role::Impressions,
                Role::MatchRate,
                Role::Revenue,
            ],
            vocabulary: default_vocabulary(),
            roles: RoleTable::default(),
            required_blocks: Vec::new(),
        }
    }
}

/// The pair of profiles used by the overview.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfileSet {
    pub p1: ReportProfile,
    pub p2: ReportProfile,
}

impl Default for ProfileSet {
    fn default() -> Self {
        Self {
            p1: ReportProfile::p1(),
            p2: ReportProfile::p2(),
        }
    }
}

impl ProfileSet {
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        serde_yaml::from_str(s).context("parsing report profiles")
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading profiles file {}", path.display()))?;
        Self::from_yaml_str(&text)
    }

    /// Profiles from `path` when given, built-in ones otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_yaml_file(p),
            None => Ok(Self::default()),
        }
    }
}
