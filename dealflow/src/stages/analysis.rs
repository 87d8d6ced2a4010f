//! Analysis: scores the extracted profile on the four evaluation axes.

use super::extraction::{json_kind, ExtractedProfile};
use super::{names, simulate_work, Stage, StageContext};
use crate::core::StageResult;
use crate::errors::StageError;
use crate::scoring::{AnalysisReport, SubScores, MAX_SCORE, MIN_SCORE};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;

/// Below this a sub-score is reported as a risk factor.
const WEAK_SIGNAL: f64 = 5.0;
/// At or above this a sub-score is reported as a strength.
const STRONG_SIGNAL: f64 = 8.0;

fn signal(signals: &Map<String, Value>, key: &str) -> Result<f64, StageError> {
    let stage = names::ANALYSIS;
    let value = signals
        .get(key)
        .ok_or_else(|| StageError::invalid_input(stage, format!("missing assessment signal '{key}'")))?;
    let score = value.as_f64().ok_or_else(|| {
        StageError::invalid_input(
            stage,
            format!("assessment signal '{key}' must be a number, got {}", json_kind(value)),
        )
    })?;
    if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
        return Err(StageError::invalid_input(
            stage,
            format!("assessment signal '{key}' = {score} is outside [{MIN_SCORE}, {MAX_SCORE}]"),
        ));
    }
    Ok(score)
}

fn push_unique(list: &mut Vec<String>, item: String) {
    if !list.contains(&item) {
        list.push(item);
    }
}

/// Builds the analysis report for an extracted profile.
///
/// Reported risk factors and strengths come first, followed by those
/// derived from weak or strong sub-scores. Duplicates are dropped.
///
/// # Errors
///
/// Returns an invalid-input error if any signal is missing, not a number,
/// or outside `[0, 10]`.
pub fn analyze(profile: &ExtractedProfile) -> Result<AnalysisReport, StageError> {
    let scores = SubScores::new(
        signal(&profile.signals, "founder_market_fit")?,
        signal(&profile.signals, "market_opportunity")?,
        signal(&profile.signals, "business_model")?,
        signal(&profile.signals, "traction")?,
    );

    let mut risk_factors = Vec::new();
    let mut strengths = Vec::new();
    for item in &profile.risk_factors {
        push_unique(&mut risk_factors, item.clone());
    }
    for item in &profile.strengths {
        push_unique(&mut strengths, item.clone());
    }

    for (label, score) in scores.labelled() {
        let label = label.replace('_', " ");
        if score < WEAK_SIGNAL {
            push_unique(&mut risk_factors, format!("Weak {label}"));
        } else if score >= STRONG_SIGNAL {
            push_unique(&mut strengths, format!("Strong {label}"));
        }
    }

    Ok(AnalysisReport {
        scores,
        risk_factors,
        strengths,
    })
}

/// Second stage: turns the extraction profile into an [`AnalysisReport`].
#[derive(Debug, Clone)]
pub struct AnalysisStage {
    latency: Duration,
}

impl AnalysisStage {
    /// Creates the stage with a simulated processing delay.
    #[must_use]
    pub const fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl Stage for AnalysisStage {
    fn name(&self) -> &str {
        names::ANALYSIS
    }

    async fn run(&self, ctx: &StageContext) -> Result<StageResult, StageError> {
        ctx.report_progress(30);
        simulate_work(self.latency).await;

        let profile: ExtractedProfile = ctx
            .prior()
            .require(names::DATA_EXTRACTION, names::ANALYSIS)?
            .decode(names::ANALYSIS)?;
        let report = analyze(&profile)?;
        ctx.output(&report)
    }
}
