use serde::{Deserialize, Serialize};

use super::formulas::{base_target_cpc, corrected_cpc, user_loss};
use super::variation::{variation_bands, Direction, VariationBand};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Increase,
    Decrease,
    Hold,
}

impl Action {
    pub fn direction(&self) -> Option<Direction> {
        match self {
            Action::Increase => Some(Direction::Increase),
            Action::Decrease => Some(Direction::Decrease),
            Action::Hold => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Increase => "increase",
            Action::Decrease => "decrease",
            Action::Hold => "hold",
        }
    }
}

/// Bands for the recommended direction; empty when holding.
pub fn bands_for(action: Action, last_rule: f64) -> Vec<VariationBand> {
    action
        .direction()
        .map(|d| variation_bands(last_rule, d))
        .unwrap_or_default()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum BlockKind {
    MobTop,
    Interstitial,
}

/// Coverage thresholds (percent) for a block.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockRule {
    /// CPC under target: increase above this coverage, decrease otherwise.
    pub below_target: f64,
    /// CPC at or over target: increase above this coverage, hold otherwise.
    pub at_target: f64,
}

impl BlockKind {
    pub fn rule(&self) -> BlockRule {
        match self {
            BlockKind::MobTop => BlockRule {
                below_target: 30.0,
                at_target: 80.0,
            },
            BlockKind::Interstitial => BlockRule {
                below_target: 80.0,
                at_target: 95.0,
            },
        }
    }
}

pub fn recommend_block(kind: BlockKind, cpc: f64, target: f64, coverage_pct: f64) -> Action {
    let rule = kind.rule();
    if cpc < target {
        if coverage_pct > rule.below_target {
            Action::Increase
        } else {
            Action::Decrease
        }
    } else if coverage_pct > rule.at_target {
        Action::Increase
    } else {
        Action::Hold
    }
}

/// Rewarded placements are judged against the target and against what
/// mob_top earns in the same report. Ties fall through to `Increase`.
pub fn recommend_rewarded(corrected: f64, target: f64, mob_top_cpc: f64) -> Action {
    if corrected < target && corrected < mob_top_cpc {
        Action::Increase
    } else if corrected < target && corrected > mob_top_cpc {
        Action::Hold
    } else if corrected > target && corrected > mob_top_cpc {
        Action::Hold
    } else {
        Action::Increase
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockAnalysisInput {
    pub block: BlockKind,
    pub cpc: f64,
    pub coverage_pct: f64,
    pub last_rule: f64,
    pub cpa: f64,
    pub roas_pct: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockAnalysis {
    pub target_cpc: f64,
    pub action: Action,
    pub bands: Vec<VariationBand>,
}

pub fn analyze_block(input: &BlockAnalysisInput) -> BlockAnalysis {
    let target = base_target_cpc(input.cpa, input.roas_pct);
    let action = recommend_block(input.block, input.cpc, target, input.coverage_pct);
    BlockAnalysis {
        target_cpc: target,
        action,
        bands: bands_for(action, input.last_rule),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RewardedAnalysisInput {
    pub requests: u64,
    pub impressions: u64,
    pub clicks: u64,
    pub coverage_pct: f64,
    pub revenue: f64,
    pub last_rule: f64,
    pub cpa: f64,
    pub roas_pct: f64,
    pub mob_top_cpc: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RewardedAnalysis {
    /// Whole users, rounded up.
    pub user_loss: u64,
    pub corrected_cpc: Option<f64>,
    pub target_cpc: f64,
    /// `None` when the corrected CPC is undefined.
    pub action: Option<Action>,
    pub bands: Vec<VariationBand>,
}

pub fn analyze_rewarded(input: &RewardedAnalysisInput) -> RewardedAnalysis {
    let lost = user_loss(input.requests, input.coverage_pct, input.impressions).ceil();
    let corrected = corrected_cpc(input.revenue, input.clicks, lost);
    let target = base_target_cpc(input.cpa, input.roas_pct);
    let action = corrected.map(|c| recommend_rewarded(c, target, input.mob_top_cpc));
    RewardedAnalysis {
        user_loss: lost as u64,
        corrected_cpc: corrected,
        target_cpc: target,
        action,
        bands: action
            .map(|a| bands_for(a, input.last_rule))
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mob_top_rule_table() {
        // under target
        assert_eq!(recommend_block(BlockKind::MobTop, 0.2, 0.5, 31.0), Action::Increase);
        assert_eq!(recommend_block(BlockKind::MobTop, 0.2, 0.5, 30.0), Action::Decrease);
        // at or over target
        assert_eq!(recommend_block(BlockKind::MobTop, 0.5, 0.5, 81.0), Action::Increase);
        assert_eq!(recommend_block(BlockKind::MobTop, 0.6, 0.5, 80.0), Action::Hold);
    }

    #[test]
    fn interstitial_rule_table() {
        assert_eq!(recommend_block(BlockKind::Interstitial, 0.2, 0.5, 81.0), Action::Increase);
        assert_eq!(recommend_block(BlockKind::Interstitial, 0.2, 0.5, 50.0), Action::Decrease);
        assert_eq!(recommend_block(BlockKind::Interstitial, 0.9, 0.5, 96.0), Action::Increase);
        assert_eq!(recommend_block(BlockKind::Interstitial, 0.9, 0.5, 95.0), Action::Hold);
    }

    #[test]
    fn rewarded_rule_table() {
        assert_eq!(recommend_rewarded(0.1, 0.5, 0.3), Action::Increase);
        assert_eq!(recommend_rewarded(0.4, 0.5, 0.3), Action::Hold);
        assert_eq!(recommend_rewarded(0.9, 0.5, 0.3), Action::Hold);
        assert_eq!(recommend_rewarded(0.6, 0.5, 0.8), Action::Increase);
        // ties
        assert_eq!(recommend_rewarded(0.5, 0.5, 0.3), Action::Increase);
        assert_eq!(recommend_rewarded(0.3, 0.5, 0.3), Action::Increase);
    }

    #[test]
    fn block_analysis_offers_bands_only_when_moving() {
        let moving = analyze_block(&BlockAnalysisInput {
            block: BlockKind::MobTop,
            cpc: 0.20,
            coverage_pct: 50.0,
            last_rule: 1.0,
            cpa: 1.0,
            roas_pct: 70.0,
        });
        assert_eq!(moving.action, Action::Increase);
        assert_eq!(moving.bands.len(), 3);

        let holding = analyze_block(&BlockAnalysisInput {
            block: BlockKind::MobTop,
            cpc: 0.90,
            coverage_pct: 50.0,
            last_rule: 1.0,
            cpa: 1.0,
            roas_pct: 70.0,
        });
        assert_eq!(holding.action, Action::Hold);
        assert!(holding.bands.is_empty());
    }

    #[test]
    fn rewarded_analysis_rounds_user_loss_up() {
        let r = analyze_rewarded(&RewardedAnalysisInput {
            requests: 1001,
            impressions: 700,
            clicks: 100,
            coverage_pct: 80.0,
            revenue: 20.0,
            last_rule: 0.5,
            cpa: 1.0,
            roas_pct: 70.0,
            mob_top_cpc: 0.3,
        });
        // 1001 * 0.8 - 700 = 100.8 -> 101
        assert_eq!(r.user_loss, 101);
        let cpc = r.corrected_cpc.unwrap();
        assert!((cpc - 20.0 / 201.0).abs() < 1e-12);
        assert_eq!(r.action, Some(Action::Increase));
        assert_eq!(r.bands.len(), 3);
    }

    #[test]
    fn rewarded_analysis_without_denominator_has_no_action() {
        let r = analyze_rewarded(&RewardedAnalysisInput {
            requests: 0,
            impressions: 0,
            clicks: 0,
            coverage_pct: 100.0,
            revenue: 5.0,
            last_rule: 0.5,
            cpa: 1.0,
            roas_pct: 70.0,
            mob_top_cpc: 0.3,
        });
        assert_eq!(r.corrected_cpc, None);
        assert_eq!(r.action, None);
        assert!(r.bands.is_empty());
    }
}
