//! Sample applications for tests, benches and demos.

use crate::application::{facts, Application, EntityId};
use serde_json::{json, Value};

/// The reference application: signals 8.5 / 7.2 / 8.0 / 6.5, which score
/// 7.65 overall, `INVEST` at `MEDIUM` risk under the default weights.
#[must_use]
pub fn sample_application(id: impl Into<EntityId>) -> Application {
    application_with_signals(
        id,
        json!({
            "founder_market_fit": 8.5,
            "market_opportunity": 7.2,
            "business_model": 8.0,
            "traction": 6.5,
        }),
    )
}

/// A complete application carrying the given assessment signals.
#[must_use]
pub fn application_with_signals(id: impl Into<EntityId>, signals: Value) -> Application {
    application_without_signals(id).with_fact(facts::ASSESSMENT_SIGNALS, signals)
}

/// A complete application whose analysis will fail for lack of signals.
#[must_use]
pub fn application_without_signals(id: impl Into<EntityId>) -> Application {
    Application::new(id).with_facts(json!({
        (facts::COMPANY_NAME): "Acme Analytics",
        (facts::BUSINESS_DESCRIPTION): "AI-powered platform for startup evaluation",
        (facts::FOUNDER_NAMES): ["Dana Reyes", "Sam Okafor"],
        (facts::FOUNDER_BACKGROUNDS): ["10 years in VC", "5 years in AI/ML"],
        (facts::FINANCIALS): { "year1": 1_000_000, "year2": 5_000_000 },
        (facts::MARKET): { "tam": 10_000_000_000_u64, "sam": 1_000_000_000 },
        (facts::RISK_FACTORS): ["High competition", "Market timing"],
        (facts::STRENGTHS): ["Strong technical team", "Large market opportunity"],
    }))
}

/// An application with no business description.
#[must_use]
pub fn application_without_description(id: impl Into<EntityId>) -> Application {
    Application::new(id).with_fact(facts::COMPANY_NAME, json!("Nameless Inc"))
}
