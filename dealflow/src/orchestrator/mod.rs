//! The evaluation orchestrator.
//!
//! [`Orchestrator::submit`] registers a run and spawns it as an independent
//! tokio task. Callers follow progress through [`Orchestrator::query_status`]
//! and collect the outcome through [`Orchestrator::query_result`], the sinks,
//! or the returned [`RunHandle`].

mod metrics;
mod sinks;

#[cfg(test)]
mod orchestrator_tests;

pub use metrics::DashboardMetrics;
pub use sinks::{
    ApplicationRecord, ApplicationStatus, EntityStatusSink, EvaluationSink,
    InMemoryApplicationRegistry, InMemoryEvaluationStore, NoOpSink,
};

use crate::application::{Application, EntityId};
use crate::cancellation::{CancelReason, CancellationToken, CleanupGuard};
use crate::config::{DuplicatePolicy, OrchestratorConfig};
use crate::core::{EvaluationResult, StageResults};
use crate::errors::{DealflowError, DuplicateRunError, StageError};
use crate::events::{EventSink, NoOpEventSink};
use crate::observability::SpanTimer;
use crate::pipeline::{panic_message, Pipeline, PipelineDefinition};
use crate::status::{RunTicket, StatusSnapshot, StatusStore};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::FutureExt;
use metrics::RunLedger;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Name attributed to failures raised outside any stage.
const SUPERVISOR: &str = "supervisor";

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Every stage completed and the evaluation was published.
    Evaluated(EvaluationResult),
    /// A stage failed; the entity was marked errored.
    Failed(StageError),
    /// A newer submission replaced the run; nothing was published.
    Superseded,
}

impl RunOutcome {
    /// Returns the evaluation, if the run produced one.
    #[must_use]
    pub const fn evaluation(&self) -> Option<&EvaluationResult> {
        match self {
            Self::Evaluated(result) => Some(result),
            _ => None,
        }
    }

    /// Returns the failure, if the run failed.
    #[must_use]
    pub const fn error(&self) -> Option<&StageError> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Handle to a submitted run.
///
/// Dropping the handle does not stop the run.
#[derive(Debug)]
pub struct RunHandle {
    entity_id: EntityId,
    generation: u64,
    join: JoinHandle<RunOutcome>,
}

impl RunHandle {
    /// Returns the entity being evaluated.
    #[must_use]
    pub const fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    /// Returns the run's registration generation.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns true if the run has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Waits for the run to finish.
    pub async fn wait(self) -> RunOutcome {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(join_error) => RunOutcome::Failed(StageError::internal(
                SUPERVISOR,
                format!("run task did not complete: {join_error}"),
            )),
        }
    }
}

#[derive(Debug)]
struct ActiveRun {
    generation: u64,
    cancel: Arc<CancellationToken>,
    /// Set once the run finished its stages and is notifying the sinks.
    /// A committing run can no longer be superseded.
    committing: bool,
    released: Arc<Notify>,
}

impl ActiveRun {
    fn new(generation: u64, cancel: Arc<CancellationToken>) -> Self {
        Self {
            generation,
            cancel,
            committing: false,
            released: Arc::new(Notify::new()),
        }
    }
}

struct Inner {
    config: OrchestratorConfig,
    pipeline: Pipeline,
    store: Arc<StatusStore>,
    evaluations: Arc<dyn EvaluationSink>,
    entities: Arc<dyn EntityStatusSink>,
    results: DashMap<EntityId, EvaluationResult>,
    active: DashMap<EntityId, ActiveRun>,
    ledger: RunLedger,
}

impl Inner {
    /// Marks the run as committing if `ticket` still owns the entity's slot.
    /// Returns false if a newer submission took the slot.
    fn begin_commit(&self, ticket: &RunTicket) -> bool {
        self.active.get_mut(&ticket.entity_id).is_some_and(|mut run| {
            let owned = run.generation == ticket.generation;
            if owned {
                run.committing = true;
            }
            owned
        })
    }

    /// Frees the entity's active-run slot if `ticket` still owns it, waking
    /// submissions waiting on it. Returns true if it did.
    fn release(&self, ticket: &RunTicket) -> bool {
        match self
            .active
            .remove_if(&ticket.entity_id, |_, run| run.generation == ticket.generation)
        {
            Some((_, run)) => {
                run.released.notify_waiters();
                true
            }
            None => false,
        }
    }

    async fn supervise(
        self: Arc<Self>,
        application: Arc<Application>,
        ticket: RunTicket,
        cancel: Arc<CancellationToken>,
    ) -> RunOutcome {
        let mut guard = CleanupGuard::new({
            let inner = self.clone();
            let ticket = ticket.clone();
            move || {
                inner.release(&ticket);
            }
        });
        let timer = SpanTimer::start(ticket.entity_id.as_str());

        let run = AssertUnwindSafe(self.pipeline.run(application, &ticket, &cancel))
            .catch_unwind()
            .await;
        let outcome = match run {
            Ok(Ok(results)) => self.final_evaluation(&results),
            Ok(Err(error)) => Err(error),
            Err(panic) => Err(StageError::internal(
                SUPERVISOR,
                format!("pipeline panicked: {}", panic_message(panic.as_ref())),
            )),
        };
        let duration_ms = timer.finish();

        // The slot stays held until every sink has been notified.
        if !self.begin_commit(&ticket) {
            debug!(
                application_id = %ticket.entity_id,
                generation = ticket.generation,
                "Run superseded; discarding outcome"
            );
            return RunOutcome::Superseded;
        }

        let outcome = match outcome {
            Ok(evaluation) => {
                self.ledger
                    .evaluated(&ticket.entity_id, evaluation.recommendation, duration_ms);
                self.results.insert(ticket.entity_id.clone(), evaluation.clone());
                self.evaluations.publish(evaluation.clone()).await;
                self.entities.mark_evaluated(&ticket.entity_id).await;
                info!(
                    application_id = %ticket.entity_id,
                    overall_score = evaluation.overall_score,
                    recommendation = %evaluation.recommendation,
                    risk_level = %evaluation.risk_level,
                    duration_ms,
                    "Evaluation completed"
                );
                RunOutcome::Evaluated(evaluation)
            }
            Err(error) => {
                self.ledger.errored(&ticket.entity_id, duration_ms);
                self.entities.mark_errored(&ticket.entity_id, &error).await;
                warn!(
                    application_id = %ticket.entity_id,
                    stage = %error.stage,
                    cause = %error.cause,
                    error = %error.message,
                    duration_ms,
                    "Evaluation failed"
                );
                RunOutcome::Failed(error)
            }
        };

        self.release(&ticket);
        guard.disarm();
        outcome
    }

    fn final_evaluation(&self, results: &StageResults) -> Result<EvaluationResult, StageError> {
        let final_stage = self.pipeline.definition().final_stage_name();
        results.require(final_stage, SUPERVISOR)?.decode(SUPERVISOR)
    }
}

/// Runs evaluation pipelines for submitted applications.
///
/// Cloning is cheap; clones share all state.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// Creates an orchestrator with the standard pipeline and no-op sinks.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: OrchestratorConfig) -> Result<Self, DealflowError> {
        Self::builder().config(config).build()
    }

    /// Starts building an orchestrator.
    #[must_use]
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// Returns the configuration in use.
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    /// Returns the declared stage names in pipeline order.
    #[must_use]
    pub fn stage_names(&self) -> &[String] {
        self.inner.store.stage_names()
    }

    /// Submits an application for evaluation.
    ///
    /// Every declared stage is registered as `Pending` before this returns;
    /// the pipeline itself runs on a spawned task. A second submission for an
    /// entity with an active run follows the configured [`DuplicatePolicy`].
    /// Under [`DuplicatePolicy::Supersede`], a run that already finished its
    /// stages is not replaced: the call waits until that run has notified
    /// its sinks, then starts the new run.
    ///
    /// # Errors
    ///
    /// Returns [`DealflowError::DuplicateRun`] under [`DuplicatePolicy::Reject`]
    /// when the entity already has an active run.
    pub async fn submit(&self, application: Application) -> Result<RunHandle, DealflowError> {
        let inner = &self.inner;
        let entity_id = application.id.clone();
        let cancel = Arc::new(CancellationToken::new());

        let ticket = loop {
            let released = match inner.active.entry(entity_id.clone()) {
                Entry::Occupied(mut occupied) => {
                    if inner.config.duplicate_policy == DuplicatePolicy::Reject {
                        debug!(application_id = %entity_id, "Rejected duplicate submission");
                        return Err(DuplicateRunError::new(entity_id).into());
                    }
                    if occupied.get().committing {
                        occupied.get().released.clone()
                    } else {
                        let ticket = inner.store.register(&entity_id);
                        occupied.get().cancel.cancel(CancelReason::Superseded {
                            by_generation: ticket.generation,
                        });
                        info!(
                            application_id = %entity_id,
                            replaced_generation = occupied.get().generation,
                            generation = ticket.generation,
                            "Superseding active run"
                        );
                        occupied.insert(ActiveRun::new(ticket.generation, cancel.clone()));
                        break ticket;
                    }
                }
                Entry::Vacant(vacant) => {
                    let ticket = inner.store.register(&entity_id);
                    vacant.insert(ActiveRun::new(ticket.generation, cancel.clone()));
                    break ticket;
                }
            };

            // The active run is already notifying its sinks; wait for it to
            // let go of the slot, then take the slot over.
            debug!(application_id = %entity_id, "Waiting for committing run to finish");
            let notified = released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            let still_held = inner
                .active
                .get(&entity_id)
                .is_some_and(|run| Arc::ptr_eq(&run.released, &released));
            if still_held {
                notified.await;
            }
        };

        inner.results.remove(&entity_id);
        inner.ledger.started(&entity_id);
        inner.entities.mark_submitted(&application).await;

        info!(
            application_id = %entity_id,
            generation = ticket.generation,
            stages = inner.store.stage_names().len(),
            "Application submitted"
        );

        let span = info_span!(
            "evaluation",
            application_id = %entity_id,
            generation = ticket.generation,
        );
        let generation = ticket.generation;
        let task = inner
            .clone()
            .supervise(Arc::new(application), ticket, cancel);
        let join = tokio::spawn(
            async move {
                AssertUnwindSafe(task).catch_unwind().await.unwrap_or_else(|panic| {
                    let message = panic_message(panic.as_ref());
                    error!(error = %message, "Supervisor panicked");
                    RunOutcome::Failed(StageError::internal(
                        SUPERVISOR,
                        format!("supervisor panicked: {message}"),
                    ))
                })
            }
            .instrument(span),
        );

        Ok(RunHandle {
            entity_id,
            generation,
            join,
        })
    }

    /// Returns the status of every declared stage for an entity.
    ///
    /// Never fails: unknown entities report every stage as `Pending` at 0%.
    #[must_use]
    pub fn query_status(&self, entity_id: &EntityId) -> StatusSnapshot {
        self.inner.store.get_all(entity_id)
    }

    /// Returns the evaluation of the entity's latest run, if it completed.
    #[must_use]
    pub fn query_result(&self, entity_id: &EntityId) -> Option<EvaluationResult> {
        self.inner.results.get(entity_id).map(|r| r.clone())
    }

    /// Asks the entity's active run to stop at the next stage boundary.
    ///
    /// Returns false if the entity has no active run.
    pub fn cancel(&self, entity_id: &EntityId) -> bool {
        self.inner.active.get(entity_id).is_some_and(|run| {
            run.cancel.cancel("cancelled by request");
            info!(application_id = %entity_id, "Cancellation requested");
            true
        })
    }

    /// Returns true if the entity has a run in flight. A run stays in flight
    /// until both sinks have been notified of its outcome.
    #[must_use]
    pub fn is_active(&self, entity_id: &EntityId) -> bool {
        self.inner.active.contains_key(entity_id)
    }

    /// Returns dashboard counters.
    #[must_use]
    pub fn metrics(&self) -> DashboardMetrics {
        self.inner.ledger.snapshot()
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.inner.config)
            .field("pipeline", &self.inner.pipeline)
            .field("active_runs", &self.inner.active.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Orchestrator`].
#[derive(Default)]
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    definition: Option<PipelineDefinition>,
    evaluations: Option<Arc<dyn EvaluationSink>>,
    entities: Option<Arc<dyn EntityStatusSink>>,
    events: Option<Arc<dyn EventSink>>,
}

impl OrchestratorBuilder {
    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the standard five-stage pipeline.
    ///
    /// The final stage's payload must be an `EvaluationResult`.
    #[must_use]
    pub fn pipeline(mut self, definition: PipelineDefinition) -> Self {
        self.definition = Some(definition);
        self
    }

    /// Sets the sink receiving finished evaluations.
    #[must_use]
    pub fn evaluation_sink(mut self, sink: Arc<dyn EvaluationSink>) -> Self {
        self.evaluations = Some(sink);
        self
    }

    /// Sets the sink tracking application lifecycle status.
    #[must_use]
    pub fn entity_sink(mut self, sink: Arc<dyn EntityStatusSink>) -> Self {
        self.entities = Some(sink);
        self
    }

    /// Sets the sink receiving stage and pipeline events.
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    /// Validates the configuration and builds the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration or pipeline is invalid.
    pub fn build(self) -> Result<Orchestrator, DealflowError> {
        self.config.validate()?;
        let definition = match self.definition {
            Some(definition) => definition,
            None => PipelineDefinition::evaluation(&self.config)?,
        };
        let definition = Arc::new(definition);
        let store = Arc::new(StatusStore::new(definition.stage_names()));
        let events = self.events.unwrap_or_else(|| Arc::new(NoOpEventSink));

        debug!(
            pipeline = %definition.name(),
            stages = ?definition.stage_names(),
            duplicate_policy = ?self.config.duplicate_policy,
            "Building orchestrator"
        );

        Ok(Orchestrator {
            inner: Arc::new(Inner {
                pipeline: Pipeline::new(definition, store.clone(), events),
                store,
                config: self.config,
                evaluations: self.evaluations.unwrap_or_else(|| Arc::new(NoOpSink)),
                entities: self.entities.unwrap_or_else(|| Arc::new(NoOpSink)),
                results: DashMap::new(),
                active: DashMap::new(),
                ledger: RunLedger::default(),
            }),
        })
    }
}

impl std::fmt::Debug for OrchestratorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestratorBuilder")
            .field("config", &self.config)
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}
