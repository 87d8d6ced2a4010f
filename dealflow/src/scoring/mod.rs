//! Scoring policy: weights, thresholds, and narrative insights.

mod narrative;
mod policy;
mod weights;

pub use narrative::key_insights;
pub use policy::{
    AnalysisReport, Assessment, Recommendation, RiskLevel, ScoringPolicy, SubScores,
    INVEST_THRESHOLD, LOW_RISK_THRESHOLD, MAX_SCORE, MEDIUM_RISK_THRESHOLD, MIN_SCORE,
    OVERALL_DECIMALS, REVIEW_THRESHOLD,
};
pub use weights::{InvestorPreferences, ScoreWeights, WEIGHT_SUM_TOLERANCE};
