//! Ordered pipeline definitions and their builder.

use crate::config::OrchestratorConfig;
use crate::errors::{ContractErrorInfo, PipelineValidationError};
use crate::scoring::ScoringPolicy;
use crate::stages::{AnalysisStage, CoordinationStage, DataExtractionStage, Stage, SynthesisStage};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// One stage slot in a pipeline.
#[derive(Debug, Clone)]
pub struct StageDescriptor {
    /// The unique name of the stage.
    pub name: String,
    /// The stage implementation.
    pub runner: Arc<dyn Stage>,
    /// Maximum duration of one execution, if bounded.
    pub timeout: Option<Duration>,
}

impl StageDescriptor {
    /// Creates a descriptor named after its runner.
    #[must_use]
    pub fn new(runner: Arc<dyn Stage>) -> Self {
        Self {
            name: runner.name().to_string(),
            runner,
            timeout: None,
        }
    }

    /// Bounds the stage's duration.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A validated, ordered list of stages.
///
/// The same definition drives status registration, status queries and
/// execution, so all three always agree on the stage set.
#[derive(Debug, Clone)]
pub struct PipelineDefinition {
    name: String,
    stages: Vec<StageDescriptor>,
}

impl PipelineDefinition {
    /// Starts building a pipeline.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(name)
    }

    /// Builds the standard five-stage evaluation pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in stages fail validation.
    pub fn evaluation(config: &OrchestratorConfig) -> Result<Self, PipelineValidationError> {
        let latency = config.stage_latency();
        let policy = ScoringPolicy::new(config.weights);

        Self::builder("startup_evaluation")
            .with_default_timeout(config.stage_timeout())
            .stage(Arc::new(DataExtractionStage::new(latency)))
            .stage(Arc::new(AnalysisStage::new(latency)))
            .stage(Arc::new(CoordinationStage::scheduling(latency)))
            .stage(Arc::new(CoordinationStage::interview(latency)))
            .stage(Arc::new(SynthesisStage::new(latency, policy)))
            .build()
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stages in execution order.
    #[must_use]
    pub fn stages(&self) -> &[StageDescriptor] {
        &self.stages
    }

    /// Returns the stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name.clone()).collect()
    }

    /// Returns the name of the stage whose payload is the run's result.
    #[must_use]
    pub fn final_stage_name(&self) -> &str {
        // Non-empty by construction.
        self.stages.last().map_or("", |s| s.name.as_str())
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always false for a built definition.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Builder for [`PipelineDefinition`].
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    name: String,
    stages: Vec<StageDescriptor>,
    default_timeout: Option<Duration>,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            default_timeout: None,
        }
    }

    /// Sets the timeout applied to stages added without one.
    #[must_use]
    pub const fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Appends a stage using the default timeout.
    #[must_use]
    pub fn stage(mut self, runner: Arc<dyn Stage>) -> Self {
        let descriptor = StageDescriptor::new(runner).with_timeout(self.default_timeout);
        self.stages.push(descriptor);
        self
    }

    /// Appends a stage with its own timeout.
    #[must_use]
    pub fn stage_with_timeout(mut self, runner: Arc<dyn Stage>, timeout: Duration) -> Self {
        self.stages.push(StageDescriptor::new(runner).with_timeout(Some(timeout)));
        self
    }

    /// Returns the number of stages added so far.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Validates and builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no stages or if two stages share a name.
    pub fn build(self) -> Result<PipelineDefinition, PipelineValidationError> {
        if self.stages.is_empty() {
            return Err(PipelineValidationError::new("Pipeline has no stages").with_error_info(
                ContractErrorInfo::new("PIPELINE-EMPTY", "Cannot build an empty pipeline")
                    .with_fix_hint("Add at least one stage to the pipeline before building."),
            ));
        }

        let mut seen = HashSet::new();
        for stage in &self.stages {
            if !seen.insert(stage.name.as_str()) {
                return Err(PipelineValidationError::new(format!(
                    "Stage '{}' is declared more than once",
                    stage.name
                ))
                .with_stages(vec![stage.name.clone()])
                .with_error_info(
                    ContractErrorInfo::new(
                        "PIPELINE-DUPLICATE-STAGE",
                        format!("Duplicate stage name '{}'", stage.name),
                    )
                    .with_fix_hint("Give every stage in a pipeline a unique name.")
                    .with_context_entry("pipeline", self.name.clone()),
                ));
            }
        }

        Ok(PipelineDefinition {
            name: self.name,
            stages: self.stages,
        })
    }
}
