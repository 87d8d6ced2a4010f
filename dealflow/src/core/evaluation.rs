//! The final evaluation produced by the synthesis stage.

use crate::application::EntityId;
use crate::scoring::{Recommendation, RiskLevel, SubScores};
use serde::{Deserialize, Serialize};

/// The outcome of a successful pipeline run.
///
/// Created exactly once per run, by the synthesis stage, and published to
/// the evaluation sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// The evaluated application.
    pub application_id: EntityId,
    /// Founder-market fit sub-score in `[0, 10]`.
    pub founder_market_fit_score: f64,
    /// Market opportunity sub-score in `[0, 10]`.
    pub market_opportunity_score: f64,
    /// Business model sub-score in `[0, 10]`.
    pub business_model_score: f64,
    /// Traction sub-score in `[0, 10]`.
    pub traction_score: f64,
    /// Weighted overall score in `[0, 10]`.
    pub overall_score: f64,
    /// Risk classification.
    pub risk_level: RiskLevel,
    /// Investment recommendation.
    pub recommendation: Recommendation,
    /// Narrative insights, most specific first.
    pub key_insights: Vec<String>,
    /// Risk factors.
    pub red_flags: Vec<String>,
    /// Strengths.
    pub strengths: Vec<String>,
}

impl EvaluationResult {
    /// Returns the four sub-scores.
    #[must_use]
    pub const fn sub_scores(&self) -> SubScores {
        SubScores {
            founder_market_fit: self.founder_market_fit_score,
            market_opportunity: self.market_opportunity_score,
            business_model: self.business_model_score,
            traction: self.traction_score,
        }
    }
}
