//! Sequential pipeline execution.

use super::definition::{PipelineDefinition, StageDescriptor};
use crate::application::Application;
use crate::cancellation::CancellationToken;
use crate::core::{StageResult, StageResults};
use crate::errors::StageError;
use crate::events::{EvaluationEvent, EventKind, EventSink};
use crate::observability::SpanTimer;
use crate::stages::{ProgressReporter, StageContext};
use crate::status::{RunTicket, StatusStore};
use futures::FutureExt;
use serde_json::json;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

/// Runs a [`PipelineDefinition`] against the shared status store.
///
/// Stages run strictly in declared order, each one starting only after its
/// predecessor completed. The first failure ends the run and later stages
/// stay `Pending`. There are no retries.
pub struct Pipeline {
    definition: Arc<PipelineDefinition>,
    store: Arc<StatusStore>,
    events: Arc<dyn EventSink>,
}

impl Pipeline {
    /// Creates a runner for `definition`.
    #[must_use]
    pub fn new(
        definition: Arc<PipelineDefinition>,
        store: Arc<StatusStore>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            definition,
            store,
            events,
        }
    }

    /// Returns the pipeline definition.
    #[must_use]
    pub fn definition(&self) -> &Arc<PipelineDefinition> {
        &self.definition
    }

    /// Runs every stage for one application.
    ///
    /// The cancellation token is checked before each stage. A cancelled run
    /// marks the stage it would have started as `Failed` and stops.
    ///
    /// # Errors
    ///
    /// Returns the `StageError` of the first stage that failed, timed out,
    /// panicked or was cancelled.
    pub async fn run(
        &self,
        application: Arc<Application>,
        ticket: &RunTicket,
        cancel: &Arc<CancellationToken>,
    ) -> Result<StageResults, StageError> {
        let timer = SpanTimer::start(self.definition.name());
        let mut results = StageResults::new();

        for descriptor in self.definition.stages() {
            let reporter = ProgressReporter::new(
                self.store.clone(),
                ticket.clone(),
                &descriptor.name,
                self.events.clone(),
            );

            if cancel.is_cancelled() {
                let reason = cancel
                    .reason()
                    .map_or_else(|| "run cancelled".to_string(), ToString::to_string);
                let error = StageError::cancelled(&descriptor.name, reason);
                reporter.fail(&error, 0.0);
                self.finish_failed(ticket, &error, timer.elapsed_ms());
                return Err(error);
            }

            let ctx = StageContext::new(application.clone(), results.clone(), reporter, cancel.clone());
            let span = info_span!(
                "stage",
                application_id = %ticket.entity_id,
                generation = ticket.generation,
                stage = %descriptor.name,
            );

            let stage_timer = SpanTimer::start(&descriptor.name);
            ctx.reporter().start();
            let outcome = execute_stage(descriptor, &ctx).instrument(span).await;
            let duration_ms = stage_timer.finish();

            match outcome {
                Ok(mut result) => {
                    result.stage_name.clone_from(&descriptor.name);
                    ctx.reporter().complete(duration_ms);
                    debug!(
                        application_id = %ticket.entity_id,
                        stage = %descriptor.name,
                        duration_ms,
                        "Stage completed"
                    );
                    results.push(result);
                }
                Err(error) => {
                    ctx.reporter().fail(&error, duration_ms);
                    warn!(
                        application_id = %ticket.entity_id,
                        stage = %descriptor.name,
                        cause = %error.cause,
                        error = %error.message,
                        duration_ms,
                        "Stage failed"
                    );
                    self.finish_failed(ticket, &error, timer.elapsed_ms());
                    return Err(error);
                }
            }
        }

        let duration_ms = timer.finish();
        info!(
            application_id = %ticket.entity_id,
            pipeline = %self.definition.name(),
            duration_ms,
            "Pipeline completed"
        );
        self.emit_run_event(
            ticket,
            EventKind::PipelineCompleted,
            json!({
                "pipeline": self.definition.name(),
                "duration_ms": duration_ms,
            }),
        );
        Ok(results)
    }

    /// Records a run-level event if `ticket` is still the entity's current
    /// registration.
    fn emit_run_event(&self, ticket: &RunTicket, kind: EventKind, data: serde_json::Value) {
        if self.store.is_current(ticket) {
            self.events
                .record(EvaluationEvent::pipeline(kind, ticket.entity_id.clone(), data));
        } else {
            debug!(
                application_id = %ticket.entity_id,
                generation = ticket.generation,
                kind = %kind,
                "Dropping event from a superseded run"
            );
        }
    }

    fn finish_failed(&self, ticket: &RunTicket, error: &StageError, duration_ms: f64) {
        self.emit_run_event(
            ticket,
            EventKind::PipelineFailed,
            json!({
                "pipeline": self.definition.name(),
                "stage": error.stage,
                "cause": error.cause,
                "error": error.message,
                "duration_ms": duration_ms,
            }),
        );
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

/// Runs one stage, converting panics and timeouts into `StageError`s.
async fn execute_stage(descriptor: &StageDescriptor, ctx: &StageContext) -> Result<StageResult, StageError> {
    let guarded = AssertUnwindSafe(descriptor.runner.run(ctx)).catch_unwind();

    let outcome = match descriptor.timeout {
        Some(limit) => match tokio::time::timeout(limit, guarded).await {
            Ok(outcome) => outcome,
            Err(_) => return Err(StageError::timeout(&descriptor.name, limit)),
        },
        None => guarded.await,
    };

    outcome.unwrap_or_else(|panic| {
        Err(StageError::internal(
            &descriptor.name,
            format!("stage panicked: {}", panic_message(panic.as_ref())),
        ))
    })
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
