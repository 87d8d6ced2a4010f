//! Mock stages for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::time::Duration;
use tokio::sync::Notify;

use crate::application::EntityId;
use crate::core::StageResult;
use crate::errors::{StageError, StageErrorCause};
use crate::stages::{Stage, StageContext};

/// A recorded execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedExecution {
    /// The application the stage ran for.
    pub application_id: EntityId,
    /// Names of the results visible to the stage.
    pub prior_stages: Vec<String>,
}

/// A stage that succeeds and records every execution.
#[derive(Debug)]
pub struct RecordingStage {
    name: String,
    executions: Mutex<Vec<RecordedExecution>>,
}

impl RecordingStage {
    /// Creates a new recording stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            executions: Mutex::new(Vec::new()),
        }
    }

    /// Returns all recorded executions.
    #[must_use]
    pub fn executions(&self) -> Vec<RecordedExecution> {
        self.executions.lock().clone()
    }

    /// Returns the number of executions.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.executions.lock().len()
    }
}

#[async_trait]
impl Stage for RecordingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &StageContext) -> Result<StageResult, StageError> {
        ctx.report_progress(50);
        self.executions.lock().push(RecordedExecution {
            application_id: ctx.application().id.clone(),
            prior_stages: ctx.prior().stage_names().into_iter().map(str::to_string).collect(),
        });
        tokio::task::yield_now().await;
        Ok(StageResult::new(&self.name, json!({ "stage": self.name })))
    }
}

/// A stage that always fails after reporting some progress.
#[derive(Debug)]
pub struct FailingStage {
    name: String,
    cause: StageErrorCause,
    message: String,
    progress: u8,
}

impl FailingStage {
    /// Creates a stage failing with an internal error at 30%.
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cause: StageErrorCause::Internal,
            message: message.into(),
            progress: 30,
        }
    }

    /// Sets the failure cause.
    #[must_use]
    pub const fn with_cause(mut self, cause: StageErrorCause) -> Self {
        self.cause = cause;
        self
    }

    /// Sets the progress reported before failing.
    #[must_use]
    pub const fn at_progress(mut self, progress: u8) -> Self {
        self.progress = progress;
        self
    }
}

#[async_trait]
impl Stage for FailingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &StageContext) -> Result<StageResult, StageError> {
        ctx.report_progress(self.progress);
        tokio::task::yield_now().await;
        Err(StageError::new(&self.name, self.cause, &self.message))
    }
}

/// A stage that takes time to execute.
#[derive(Debug)]
pub struct SlowStage {
    name: String,
    delay: Duration,
}

impl SlowStage {
    /// Creates a new slow stage.
    #[must_use]
    pub fn new(name: impl Into<String>, delay: Duration) -> Self {
        Self {
            name: name.into(),
            delay,
        }
    }

    /// Creates a slow stage with delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(name: impl Into<String>, ms: u64) -> Self {
        Self::new(name, Duration::from_millis(ms))
    }
}

#[async_trait]
impl Stage for SlowStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &StageContext) -> Result<StageResult, StageError> {
        ctx.report_progress(10);
        tokio::time::sleep(self.delay).await;
        Ok(StageResult::new(&self.name, json!({ "delay_ms": self.delay.as_millis() })))
    }
}

/// A stage that panics after reporting progress.
#[derive(Debug)]
pub struct PanickingStage {
    name: String,
    message: String,
}

impl PanickingStage {
    /// Creates a new panicking stage.
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Stage for PanickingStage {
    fn name(&self) -> &str {
        &self.name
    }

    #[allow(clippy::panic)]
    async fn run(&self, ctx: &StageContext) -> Result<StageResult, StageError> {
        ctx.report_progress(20);
        panic!("{}", self.message);
    }
}

/// A stage that blocks until released, for observing a run mid-flight.
#[derive(Debug, Default)]
pub struct GatedStage {
    name: String,
    entered: Notify,
    release: Notify,
}

impl GatedStage {
    /// Creates a new gated stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }

    /// Waits until the stage has started and reported progress.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    /// Lets one waiting execution finish.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl Stage for GatedStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &StageContext) -> Result<StageResult, StageError> {
        ctx.report_progress(50);
        self.entered.notify_one();
        self.release.notified().await;
        Ok(StageResult::new(&self.name, json!({ "released": true })))
    }
}
