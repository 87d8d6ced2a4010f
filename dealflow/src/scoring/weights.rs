//! Scoring weights and investor preferences.

use crate::errors::WeightsError;
use serde::{Deserialize, Serialize};

/// Maximum distance from 1.0 tolerated when validating a weight sum.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Weights applied to the four sub-scores.
///
/// The policy uses the weights verbatim and never renormalizes them.
/// Callers supplying custom weights should run [`ScoreWeights::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Weight of founder-market fit.
    #[serde(rename = "founder_weight")]
    pub founder_market_fit: f64,
    /// Weight of market opportunity.
    #[serde(rename = "market_weight")]
    pub market_opportunity: f64,
    /// Weight of the business model.
    #[serde(rename = "business_model_weight")]
    pub business_model: f64,
    /// Weight of traction.
    #[serde(rename = "traction_weight")]
    pub traction: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            founder_market_fit: 0.30,
            market_opportunity: 0.25,
            business_model: 0.25,
            traction: 0.20,
        }
    }
}

impl ScoreWeights {
    /// Creates a set of weights.
    #[must_use]
    pub const fn new(founder_market_fit: f64, market_opportunity: f64, business_model: f64, traction: f64) -> Self {
        Self {
            founder_market_fit,
            market_opportunity,
            business_model,
            traction,
        }
    }

    /// Returns the sum of the four weights.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.founder_market_fit + self.market_opportunity + self.business_model + self.traction
    }

    /// Checks that every weight is a finite non-negative number and that
    /// they sum to 1.0.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), WeightsError> {
        for (name, value) in self.named() {
            if !value.is_finite() {
                return Err(WeightsError::NonFinite { name });
            }
            if value < 0.0 {
                return Err(WeightsError::Negative { name, value });
            }
        }

        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(WeightsError::SumMismatch { sum });
        }
        Ok(())
    }

    fn named(&self) -> [(&'static str, f64); 4] {
        [
            ("founder_weight", self.founder_market_fit),
            ("market_weight", self.market_opportunity),
            ("business_model_weight", self.business_model),
            ("traction_weight", self.traction),
        ]
    }
}

/// An investor's evaluation preferences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvestorPreferences {
    /// Weights that replace the default policy weights.
    #[serde(flatten)]
    pub weights: ScoreWeights,
    /// Sectors the investor focuses on.
    #[serde(default)]
    pub sector_focus: Vec<String>,
    /// Funding stages the investor invests in.
    #[serde(default)]
    pub investment_stage: Vec<String>,
}

impl InvestorPreferences {
    /// Creates preferences with the given weights and no focus lists.
    #[must_use]
    pub fn with_weights(weights: ScoreWeights) -> Self {
        Self {
            weights,
            ..Self::default()
        }
    }

    /// Returns true if the investor has no sector focus or focuses on `sector`.
    #[must_use]
    pub fn covers_sector(&self, sector: &str) -> bool {
        self.sector_focus.is_empty()
            || self
                .sector_focus
                .iter()
                .any(|s| s.eq_ignore_ascii_case(sector))
    }

    /// Returns true if the investor has no stage preference or invests at `stage`.
    #[must_use]
    pub fn covers_stage(&self, stage: &str) -> bool {
        self.investment_stage.is_empty()
            || self
                .investment_stage
                .iter()
                .any(|s| s.eq_ignore_ascii_case(stage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_weights_are_valid() {
        let weights = ScoreWeights::default();
        assert!(weights.validate().is_ok());
        assert!((weights.sum() - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
    }

    #[test]
    fn test_sum_mismatch() {
        let weights = ScoreWeights::new(0.4, 0.4, 0.4, 0.4);
        assert!(matches!(weights.validate(), Err(WeightsError::SumMismatch { .. })));
    }

    #[test]
    fn test_negative_weight() {
        let weights = ScoreWeights::new(1.2, -0.2, 0.0, 0.0);
        assert_eq!(
            weights.validate(),
            Err(WeightsError::Negative { name: "market_weight", value: -0.2 })
        );
    }

    #[test]
    fn test_non_finite_weight() {
        let weights = ScoreWeights::new(f64::NAN, 0.25, 0.25, 0.5);
        assert_eq!(
            weights.validate(),
            Err(WeightsError::NonFinite { name: "founder_weight" })
        );
    }

    #[test]
    fn test_preferences_deserialize_flat_weights() {
        let prefs: InvestorPreferences = serde_json::from_value(json!({
            "founder_weight": 0.3,
            "market_weight": 0.25,
            "business_model_weight": 0.2,
            "traction_weight": 0.25,
            "sector_focus": ["fintech"],
        }))
        .unwrap();

        assert_eq!(prefs.weights.traction, 0.25);
        assert!(prefs.weights.validate().is_ok());
        assert!(prefs.covers_sector("FinTech"));
        assert!(!prefs.covers_sector("biotech"));
        assert!(prefs.covers_stage("seed"));
    }
}
