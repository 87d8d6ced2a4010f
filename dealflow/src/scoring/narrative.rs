//! Narrative insights derived from sub-scores.

use super::{Assessment, SubScores};

struct Ladder {
    strong_at: f64,
    fair_at: f64,
    strong: &'static str,
    fair: &'static str,
    weak: &'static str,
}

impl Ladder {
    fn describe(&self, score: f64) -> &'static str {
        if score >= self.strong_at {
            self.strong
        } else if score >= self.fair_at {
            self.fair
        } else {
            self.weak
        }
    }
}

const FOUNDER: Ladder = Ladder {
    strong_at: 8.0,
    fair_at: 6.0,
    strong: "Strong founder-market fit with relevant experience",
    fair: "Adequate founder-market fit; experience partially relevant",
    weak: "Founder-market fit needs validation",
};

const MARKET: Ladder = Ladder {
    strong_at: 7.0,
    fair_at: 5.0,
    strong: "Large addressable market with clear growth potential",
    fair: "Moderate market opportunity",
    weak: "Limited or unproven market opportunity",
};

const BUSINESS_MODEL: Ladder = Ladder {
    strong_at: 7.0,
    fair_at: 5.0,
    strong: "Solid business model with multiple revenue streams",
    fair: "Workable business model that needs refinement",
    weak: "Business model is unclear",
};

const TRACTION: Ladder = Ladder {
    strong_at: 7.0,
    fair_at: 5.0,
    strong: "Demonstrated traction with paying customers",
    fair: "Early traction; growth still to be proven",
    weak: "Traction not yet demonstrated",
};

/// Builds the ordered insight list: one line per sub-score, then a summary.
#[must_use]
pub fn key_insights(scores: &SubScores, assessment: &Assessment) -> Vec<String> {
    vec![
        FOUNDER.describe(scores.founder_market_fit).to_string(),
        MARKET.describe(scores.market_opportunity).to_string(),
        BUSINESS_MODEL.describe(scores.business_model).to_string(),
        TRACTION.describe(scores.traction).to_string(),
        format!(
            "Overall score {:.2}/10: {} recommendation, {} risk",
            assessment.overall_score, assessment.recommendation, assessment.risk_level
        ),
    ]
}
