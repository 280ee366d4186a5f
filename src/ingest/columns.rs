use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

use super::normalize::normalize;

/// Semantic column roles a report can provide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Block,
    Requests,
    Clicks,
    Ctr,
    MatchRate,
    Cpc,
    Impressions,
    Revenue,
}

impl Role {
    pub const ALL: [Role; 8] = [
        Role::Block,
        Role::Requests,
        Role::Clicks,
        Role::Ctr,
        Role::MatchRate,
        Role::Cpc,
        Role::Impressions,
        Role::Revenue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Block => "block",
            Role::Requests => "requests",
            Role::Clicks => "clicks",
            Role::Ctr => "ctr",
            Role::MatchRate => "match_rate",
            Role::Cpc => "cpc",
            Role::Impressions => "impressions",
            Role::Revenue => "revenue",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One alternative: every token must appear in the normalized header.
pub type TokenSet = Vec<String>;

/// Role → ordered token-set alternatives, tried in priority order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoleTable(pub BTreeMap<Role, Vec<TokenSet>>);

fn sets(alternatives: &[&[&str]]) -> Vec<TokenSet> {
    alternatives
        .iter()
        .map(|set| set.iter().map(|t| t.to_string()).collect())
        .collect()
}

impl Default for RoleTable {
    /// GAM exports in Portuguese first, English column names as fallback.
    fn default() -> Self {
        let mut table = BTreeMap::new();
        table.insert(
            Role::Block,
            sets(&[&["bloco", "anuncios"], &["bloco", "anuncio"], &["ad", "unit"]]),
        );
        table.insert(Role::Requests, sets(&[&["solicitacoes"], &["ad", "requests"]]));
        table.insert(Role::Clicks, sets(&[&["cliques"], &["clicks"]]));
        table.insert(Role::Ctr, sets(&[&["ctr"]]));
        table.insert(
            Role::MatchRate,
            sets(&[&["taxa", "correspondencia"], &["match", "rate"]]),
        );
        table.insert(Role::Cpc, sets(&[&["cpc"]]));
        table.insert(Role::Impressions, sets(&[&["impressoes"], &["impressions"]]));
        table.insert(Role::Revenue, sets(&[&["receita"], &["revenue"]]));
        Self(table)
    }
}

impl RoleTable {
    pub fn alternatives(&self, role: Role) -> &[TokenSet] {
        self.0.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Role → actual header text, `None` when nothing matched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnRoleMap(pub BTreeMap<Role, Option<String>>);

impl ColumnRoleMap {
    pub fn get(&self, role: Role) -> Option<&str> {
        self.0.get(&role).and_then(|c| c.as_deref())
    }

    /// Required roles that did not resolve, in the order given.
    pub fn missing(&self, required: &[Role]) -> Vec<Role> {
        required
            .iter()
            .copied()
            .filter(|r| self.get(*r).is_none())
            .collect()
    }
}

/// First header (in original order) whose normalized key contains every token.
pub fn find_column<'a>(headers: &'a [String], tokens: &[String]) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| {
            let key = normalize(h);
            tokens.iter().all(|t| key.contains(t.as_str()))
        })
        .map(String::as_str)
}

pub fn resolve_columns(headers: &[String], table: &RoleTable) -> ColumnRoleMap {
    let map = Role::ALL
        .iter()
        .map(|role| {
            let column = table
                .alternatives(*role)
                .iter()
                .find_map(|tokens| find_column(headers, tokens))
                .map(str::to_string);
            (*role, column)
        })
        .collect();
    ColumnRoleMap(map)
}
