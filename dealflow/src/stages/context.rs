//! Execution context handed to a running stage.

use crate::application::Application;
use crate::cancellation::CancellationToken;
use crate::core::{StageResult, StageResults, StageState};
use crate::errors::StageError;
use crate::events::{EvaluationEvent, EventKind, EventSink};
use crate::status::{RunTicket, StatusStore, UpdateOutcome};
use serde::Serialize;
use serde_json::json;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Writes one stage's status transitions for one run.
///
/// Every transition goes to the [`StatusStore`] under the run's ticket and is
/// mirrored to the event sink.
pub struct ProgressReporter {
    store: Arc<StatusStore>,
    ticket: RunTicket,
    stage_name: String,
    events: Arc<dyn EventSink>,
    last_progress: AtomicU8,
}

impl ProgressReporter {
    /// Creates a reporter for `stage_name`.
    #[must_use]
    pub fn new(
        store: Arc<StatusStore>,
        ticket: RunTicket,
        stage_name: impl Into<String>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            store,
            ticket,
            stage_name: stage_name.into(),
            events,
            last_progress: AtomicU8::new(0),
        }
    }

    /// Returns the stage being reported on.
    #[must_use]
    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    /// Returns the run ticket.
    #[must_use]
    pub const fn ticket(&self) -> &RunTicket {
        &self.ticket
    }

    /// Returns the highest progress reported so far.
    #[must_use]
    pub fn last_progress(&self) -> u8 {
        self.last_progress.load(Ordering::SeqCst)
    }

    /// Moves the stage to `Running` at 0%.
    pub fn start(&self) -> UpdateOutcome {
        let outcome = self.store.set(&self.ticket, &self.stage_name, StageState::Running, 0);
        if outcome.is_applied() {
            self.emit(EventKind::StageStarted, json!({}));
        }
        outcome
    }

    /// Records intermediate progress, clamped to `[1, 99]`.
    ///
    /// Progress never decreases: a lower value than one already reported is
    /// recorded as the previous value.
    pub fn report(&self, progress: u8) -> UpdateOutcome {
        let progress = progress.clamp(1, 99);
        let previous = self.last_progress.fetch_max(progress, Ordering::SeqCst);
        let progress = progress.max(previous);

        let outcome = self.store.set(&self.ticket, &self.stage_name, StageState::Running, progress);
        if outcome.is_applied() {
            self.emit(EventKind::StageProgress, json!({ "progress": progress }));
        }
        outcome
    }

    /// Moves the stage to `Completed` at 100%.
    pub fn complete(&self, duration_ms: f64) -> UpdateOutcome {
        self.last_progress.store(100, Ordering::SeqCst);
        let outcome = self.store.set(&self.ticket, &self.stage_name, StageState::Completed, 100);
        if outcome.is_applied() {
            self.emit(EventKind::StageCompleted, json!({ "duration_ms": duration_ms }));
        }
        outcome
    }

    /// Moves the stage to `Failed`, keeping the last reported progress.
    pub fn fail(&self, error: &StageError, duration_ms: f64) -> UpdateOutcome {
        let progress = self.last_progress();
        let outcome = self.store.set(&self.ticket, &self.stage_name, StageState::Failed, progress);
        if outcome.is_applied() {
            self.emit(
                EventKind::StageFailed,
                json!({
                    "cause": error.cause,
                    "error": error.message,
                    "progress": progress,
                    "duration_ms": duration_ms,
                }),
            );
        }
        outcome
    }

    fn emit(&self, kind: EventKind, data: serde_json::Value) {
        self.events.record(EvaluationEvent::stage(
            kind,
            self.ticket.entity_id.clone(),
            &self.stage_name,
            data,
        ));
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("ticket", &self.ticket)
            .field("stage_name", &self.stage_name)
            .field("last_progress", &self.last_progress())
            .finish_non_exhaustive()
    }
}

/// Context for one stage execution.
#[derive(Debug)]
pub struct StageContext {
    application: Arc<Application>,
    prior: StageResults,
    reporter: ProgressReporter,
    cancel: Arc<CancellationToken>,
}

impl StageContext {
    /// Creates a new stage context.
    #[must_use]
    pub const fn new(
        application: Arc<Application>,
        prior: StageResults,
        reporter: ProgressReporter,
        cancel: Arc<CancellationToken>,
    ) -> Self {
        Self {
            application,
            prior,
            reporter,
            cancel,
        }
    }

    /// Returns the application under evaluation.
    #[must_use]
    pub fn application(&self) -> &Application {
        &self.application
    }

    /// Returns the results of the stages that ran before this one.
    #[must_use]
    pub const fn prior(&self) -> &StageResults {
        &self.prior
    }

    /// Returns the running stage's name.
    #[must_use]
    pub fn stage_name(&self) -> &str {
        self.reporter.stage_name()
    }

    /// Returns the progress reporter.
    #[must_use]
    pub const fn reporter(&self) -> &ProgressReporter {
        &self.reporter
    }

    /// Records intermediate progress for the running stage.
    pub fn report_progress(&self, progress: u8) {
        self.reporter.report(progress);
    }

    /// Returns true if the run has been asked to stop.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wraps a typed payload as this stage's result.
    ///
    /// # Errors
    ///
    /// Returns an internal `StageError` if the payload cannot be serialized.
    pub fn output<T: Serialize>(&self, payload: &T) -> Result<StageResult, StageError> {
        StageResult::from_serializable(self.stage_name(), payload)
    }
}
