//! Data extraction: turns raw application facts into a structured profile.

use super::{names, simulate_work, Stage, StageContext};
use crate::application::{facts, Application};
use crate::core::StageResult;
use crate::errors::StageError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Structured profile produced by [`DataExtractionStage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedProfile {
    /// Company name, if given.
    #[serde(default)]
    pub company_name: Option<String>,
    /// Pitch content, taken from the business description.
    pub pitch_content: String,
    /// Founder names.
    #[serde(default)]
    pub founder_names: Vec<String>,
    /// Founder background summaries.
    #[serde(default)]
    pub founder_backgrounds: Vec<String>,
    /// Financial projections, passed through as given.
    #[serde(default)]
    pub financial_projections: Value,
    /// Market research, passed through as given.
    #[serde(default)]
    pub market_research: Value,
    /// Raw assessment signals. Validated by the analysis stage.
    #[serde(default)]
    pub signals: Map<String, Value>,
    /// Risk factors reported with the application.
    #[serde(default)]
    pub risk_factors: Vec<String>,
    /// Strengths reported with the application.
    #[serde(default)]
    pub strengths: Vec<String>,
}

impl ExtractedProfile {
    /// Extracts a profile from the application's facts.
    ///
    /// # Errors
    ///
    /// Returns an invalid-input error if the business description is missing
    /// or blank, or if the assessment signals are not an object.
    pub fn from_application(application: &Application) -> Result<Self, StageError> {
        let stage = names::DATA_EXTRACTION;

        let pitch_content = application
            .fact_str(facts::BUSINESS_DESCRIPTION)
            .ok_or_else(|| StageError::invalid_input(stage, "business description is missing or blank"))?
            .to_string();

        let signals = match application.fact(facts::ASSESSMENT_SIGNALS) {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(other) => {
                return Err(StageError::invalid_input(
                    stage,
                    format!("assessment signals must be an object, got {}", json_kind(other)),
                ))
            }
        };

        Ok(Self {
            company_name: application.fact_str(facts::COMPANY_NAME).map(str::to_string),
            pitch_content,
            founder_names: string_list(application.fact(facts::FOUNDER_NAMES)),
            founder_backgrounds: string_list(application.fact(facts::FOUNDER_BACKGROUNDS)),
            financial_projections: application.fact(facts::FINANCIALS).cloned().unwrap_or_default(),
            market_research: application.fact(facts::MARKET).cloned().unwrap_or_default(),
            signals,
            risk_factors: string_list(application.fact(facts::RISK_FACTORS)),
            strengths: string_list(application.fact(facts::STRENGTHS)),
        })
    }
}

/// Reads a fact that may be a single string or a list of strings.
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => non_blank(s).into_iter().collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter_map(non_blank)
            .collect(),
        _ => Vec::new(),
    }
}

fn non_blank(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub(super) const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// First stage: derives an [`ExtractedProfile`] from the raw facts.
#[derive(Debug, Clone)]
pub struct DataExtractionStage {
    latency: Duration,
}

impl DataExtractionStage {
    /// Creates the stage with a simulated processing delay.
    #[must_use]
    pub const fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl Stage for DataExtractionStage {
    fn name(&self) -> &str {
        names::DATA_EXTRACTION
    }

    async fn run(&self, ctx: &StageContext) -> Result<StageResult, StageError> {
        ctx.report_progress(50);
        simulate_work(self.latency).await;

        let profile = ExtractedProfile::from_application(ctx.application())?;
        ctx.output(&profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StageErrorCause;
    use crate::testing::fixtures;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_profile_from_sample_application() {
        let app = fixtures::sample_application("app-1");
        let profile = ExtractedProfile::from_application(&app).unwrap();

        assert_eq!(profile.company_name.as_deref(), Some("Acme Analytics"));
        assert_eq!(profile.founder_backgrounds, vec!["10 years in VC", "5 years in AI/ML"]);
        assert_eq!(profile.signals["founder_market_fit"], json!(8.5));
        assert_eq!(profile.risk_factors, vec!["High competition", "Market timing"]);
    }

    #[test]
    fn test_missing_description_is_invalid_input() {
        let app = Application::new("app-1").with_fact(facts::COMPANY_NAME, json!("Acme"));
        let err = ExtractedProfile::from_application(&app).unwrap_err();

        assert_eq!(err.cause, StageErrorCause::InvalidInput);
        assert_eq!(err.stage, names::DATA_EXTRACTION);
    }

    #[test]
    fn test_blank_description_is_invalid_input() {
        let app = Application::new("app-1").with_fact(facts::BUSINESS_DESCRIPTION, json!("   "));
        assert!(ExtractedProfile::from_application(&app).is_err());
    }

    #[test]
    fn test_signals_must_be_an_object() {
        let app = Application::new("app-1")
            .with_fact(facts::BUSINESS_DESCRIPTION, json!("Payments for clinics"))
            .with_fact(facts::ASSESSMENT_SIGNALS, json!([1, 2, 3]));
        let err = ExtractedProfile::from_application(&app).unwrap_err();

        assert!(err.message.contains("an array"));
    }

    #[test]
    fn test_string_list_accepts_single_string() {
        assert_eq!(string_list(Some(&json!(" Fintech veteran "))), vec!["Fintech veteran"]);
        assert_eq!(string_list(Some(&json!(["a", 3, "", "b"]))), vec!["a", "b"]);
        assert!(string_list(None).is_empty());
    }
}
