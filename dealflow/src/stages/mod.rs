//! Stage trait and the built-in evaluation stages.
//!
//! Stages are the units of work of an evaluation pipeline. Each one reads
//! the application and the results of earlier stages, reports progress
//! through its [`StageContext`], and produces a single [`StageResult`].

mod analysis;
mod context;
mod coordination;
mod extraction;
mod synthesis;

pub use analysis::{analyze, AnalysisStage};
pub use context::{ProgressReporter, StageContext};
pub use coordination::{CoordinationRecord, CoordinationStage};
pub use extraction::{DataExtractionStage, ExtractedProfile};
pub use synthesis::SynthesisStage;

use crate::core::StageResult;
use crate::errors::StageError;
use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;

/// Names of the built-in stages, in pipeline order.
pub mod names {
    /// Structured profile extraction from raw facts.
    pub const DATA_EXTRACTION: &str = "data_extraction";
    /// Sub-score analysis.
    pub const ANALYSIS: &str = "analysis";
    /// Meeting scheduling placeholder.
    pub const SCHEDULING: &str = "scheduling";
    /// Founder interview placeholder.
    pub const INTERVIEW: &str = "interview";
    /// Final scoring and recommendation.
    pub const SYNTHESIS: &str = "synthesis";

    /// All built-in stage names, in pipeline order.
    pub const ALL: [&str; 5] = [DATA_EXTRACTION, ANALYSIS, SCHEDULING, INTERVIEW, SYNTHESIS];
}

/// Trait for pipeline stages.
///
/// A stage must report at least one intermediate progress value through
/// [`StageContext::report_progress`]. The runner records the `Running`
/// transition before calling [`Stage::run`] and the terminal transition
/// after it returns.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Runs the stage.
    ///
    /// # Errors
    ///
    /// Returns a `StageError` if the stage cannot produce its payload.
    async fn run(&self, ctx: &StageContext) -> Result<StageResult, StageError>;
}

/// Suspends the current run for a simulated processing delay.
///
/// A zero delay still yields once, so concurrent runs interleave.
pub(crate) async fn simulate_work(latency: Duration) {
    if latency.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(latency).await;
    }
}
