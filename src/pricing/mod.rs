pub mod formulas;
pub mod recommend;
pub mod variation;

pub use formulas::{
    base_target_cpc, corrected_cpc, loss_ratio, target_cpc, user_loss, CorrectedCpcInput,
    CorrectedCpcResult, TargetCpcInput, TargetCpcResult,
};
pub use recommend::{
    analyze_block, analyze_rewarded, recommend_block, recommend_rewarded, Action,
    BlockAnalysis, BlockAnalysisInput, BlockKind, BlockRule, RewardedAnalysis,
    RewardedAnalysisInput,
};
pub use variation::{variation_bands, Direction, VariationBand};
