//! Synthesis: applies the scoring policy to the analysis report.

use super::{names, simulate_work, Stage, StageContext};
use crate::core::StageResult;
use crate::errors::StageError;
use crate::scoring::{AnalysisReport, ScoringPolicy};
use async_trait::async_trait;
use std::time::Duration;

/// Final stage. Its payload is the run's `EvaluationResult`.
#[derive(Debug, Clone)]
pub struct SynthesisStage {
    latency: Duration,
    policy: ScoringPolicy,
}

impl SynthesisStage {
    /// Creates the stage with a simulated processing delay.
    #[must_use]
    pub const fn new(latency: Duration, policy: ScoringPolicy) -> Self {
        Self { latency, policy }
    }

    /// Returns the scoring policy.
    #[must_use]
    pub const fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }
}

#[async_trait]
impl Stage for SynthesisStage {
    fn name(&self) -> &str {
        names::SYNTHESIS
    }

    async fn run(&self, ctx: &StageContext) -> Result<StageResult, StageError> {
        ctx.report_progress(50);
        simulate_work(self.latency).await;

        let report: AnalysisReport = ctx
            .prior()
            .require(names::ANALYSIS, names::SYNTHESIS)?
            .decode(names::SYNTHESIS)?;
        let evaluation = self.policy.evaluate(ctx.application().id.clone(), &report);
        ctx.output(&evaluation)
    }
}
