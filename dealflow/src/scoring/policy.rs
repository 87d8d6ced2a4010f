//! The deterministic scoring policy.
//!
//! `overall = Σ weight_i × score_i`, then two threshold ladders map the
//! overall score to a recommendation and a risk level. Thresholds are
//! inclusive on their lower bound and checked from the top down.

use super::narrative;
use super::ScoreWeights;
use crate::application::EntityId;
use crate::core::EvaluationResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest score a sub-score may take.
pub const MIN_SCORE: f64 = 0.0;
/// Highest score a sub-score may take.
pub const MAX_SCORE: f64 = 10.0;

/// Overall score at or above which the recommendation is `INVEST`.
pub const INVEST_THRESHOLD: f64 = 7.5;
/// Overall score at or above which the recommendation is `REVIEW`.
pub const REVIEW_THRESHOLD: f64 = 6.0;
/// Overall score at or above which the risk is `LOW`.
pub const LOW_RISK_THRESHOLD: f64 = 8.0;
/// Overall score at or above which the risk is `MEDIUM`.
pub const MEDIUM_RISK_THRESHOLD: f64 = 6.5;

/// Decimal places kept in the overall score.
pub const OVERALL_DECIMALS: i32 = 6;

const OVERALL_SCALE: f64 = 1_000_000.0;

fn round_score(value: f64) -> f64 {
    (value * OVERALL_SCALE).round() / OVERALL_SCALE
}

/// Investment recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    /// Invest.
    Invest,
    /// Needs human review.
    Review,
    /// Pass on the deal.
    Pass,
}

impl Recommendation {
    /// Maps an overall score to a recommendation.
    #[must_use]
    pub fn from_overall(overall: f64) -> Self {
        if overall >= INVEST_THRESHOLD {
            Self::Invest
        } else if overall >= REVIEW_THRESHOLD {
            Self::Review
        } else {
            Self::Pass
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invest => write!(f, "INVEST"),
            Self::Review => write!(f, "REVIEW"),
            Self::Pass => write!(f, "PASS"),
        }
    }
}

/// Risk classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    /// Low risk.
    Low,
    /// Medium risk.
    Medium,
    /// High risk.
    High,
}

impl RiskLevel {
    /// Maps an overall score to a risk level.
    #[must_use]
    pub fn from_overall(overall: f64) -> Self {
        if overall >= LOW_RISK_THRESHOLD {
            Self::Low
        } else if overall >= MEDIUM_RISK_THRESHOLD {
            Self::Medium
        } else {
            Self::High
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

/// The four raw sub-scores produced by analysis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    /// Founder-market fit.
    pub founder_market_fit: f64,
    /// Market opportunity.
    pub market_opportunity: f64,
    /// Business model.
    pub business_model: f64,
    /// Traction.
    pub traction: f64,
}

impl SubScores {
    /// Creates a set of sub-scores.
    #[must_use]
    pub const fn new(founder_market_fit: f64, market_opportunity: f64, business_model: f64, traction: f64) -> Self {
        Self {
            founder_market_fit,
            market_opportunity,
            business_model,
            traction,
        }
    }

    /// Returns `(label, score)` pairs in a fixed order.
    #[must_use]
    pub const fn labelled(&self) -> [(&'static str, f64); 4] {
        [
            ("founder_market_fit", self.founder_market_fit),
            ("market_opportunity", self.market_opportunity),
            ("business_model", self.business_model),
            ("traction", self.traction),
        ]
    }

    /// Returns true if every score lies in `[0, 10]`.
    #[must_use]
    pub fn in_range(&self) -> bool {
        self.labelled()
            .iter()
            .all(|(_, s)| (MIN_SCORE..=MAX_SCORE).contains(s))
    }
}

/// Analysis output consumed by the policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// The raw sub-scores.
    pub scores: SubScores,
    /// Qualitative risk factors.
    #[serde(default)]
    pub risk_factors: Vec<String>,
    /// Qualitative strengths.
    #[serde(default)]
    pub strengths: Vec<String>,
}

/// Overall score and its classifications.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    /// Weighted overall score.
    pub overall_score: f64,
    /// Risk classification.
    pub risk_level: RiskLevel,
    /// Recommendation.
    pub recommendation: Recommendation,
}

impl Assessment {
    /// Classifies an overall score.
    #[must_use]
    pub fn from_overall(overall_score: f64) -> Self {
        Self {
            overall_score,
            risk_level: RiskLevel::from_overall(overall_score),
            recommendation: Recommendation::from_overall(overall_score),
        }
    }
}

/// Pure, deterministic scoring policy.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoringPolicy {
    weights: ScoreWeights,
}

impl ScoringPolicy {
    /// Creates a policy that uses `weights` verbatim.
    #[must_use]
    pub const fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    /// Returns the weights in use.
    #[must_use]
    pub const fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    /// Computes the weighted overall score, rounded to
    /// [`OVERALL_DECIMALS`] places.
    ///
    /// Rounding keeps sums that are exactly on a threshold in decimal, such
    /// as `9.5×0.3 + 10×0.25 + 8.2×0.25 + 0.5×0.2 = 7.5`, on that threshold.
    /// Weights are applied as given; nothing is clamped or renormalised.
    #[must_use]
    pub fn overall(&self, scores: &SubScores) -> f64 {
        let w = &self.weights;
        let weighted = scores.founder_market_fit * w.founder_market_fit
            + scores.market_opportunity * w.market_opportunity
            + scores.business_model * w.business_model
            + scores.traction * w.traction;
        round_score(weighted)
    }

    /// Computes the overall score and classifies it.
    #[must_use]
    pub fn assess(&self, scores: &SubScores) -> Assessment {
        Assessment::from_overall(self.overall(scores))
    }

    /// Builds the final evaluation for an application.
    #[must_use]
    pub fn evaluate(&self, application_id: EntityId, report: &AnalysisReport) -> EvaluationResult {
        let scores = report.scores;
        let assessment = self.assess(&scores);

        EvaluationResult {
            application_id,
            founder_market_fit_score: scores.founder_market_fit,
            market_opportunity_score: scores.market_opportunity,
            business_model_score: scores.business_model,
            traction_score: scores.traction,
            overall_score: assessment.overall_score,
            risk_level: assessment.risk_level,
            recommendation: assessment.recommendation,
            key_insights: narrative::key_insights(&scores, &assessment),
            red_flags: report.risk_factors.clone(),
            strengths: report.strengths.clone(),
        }
    }
}
