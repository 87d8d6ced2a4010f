//! End-to-end orchestrator scenarios.

use super::*;
use crate::config::DuplicatePolicy;
use crate::core::{RunState, StageResult, StageState};
use crate::errors::StageErrorCause;
use crate::events::{CollectingEventSink, EventKind};
use crate::pipeline::PipelineBuilder;
use crate::scoring::{Recommendation, RiskLevel, ScoringPolicy};
use crate::stages::{names, AnalysisStage, DataExtractionStage, Stage, StageContext, SynthesisStage};
use crate::testing::{fixtures, GatedStage, SlowStage};
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use tokio::sync::Notify;

struct Harness {
    orchestrator: Orchestrator,
    evaluations: Arc<InMemoryEvaluationStore>,
    registry: Arc<InMemoryApplicationRegistry>,
}

impl Harness {
    fn with(config: OrchestratorConfig, definition: Option<PipelineDefinition>) -> Self {
        let evaluations = Arc::new(InMemoryEvaluationStore::new());
        let registry = Arc::new(InMemoryApplicationRegistry::new());
        let mut builder = Orchestrator::builder()
            .config(config)
            .evaluation_sink(evaluations.clone())
            .entity_sink(registry.clone());
        if let Some(definition) = definition {
            builder = builder.pipeline(definition);
        }
        Self {
            orchestrator: builder.build().unwrap(),
            evaluations,
            registry,
        }
    }

    fn new() -> Self {
        Self::with(OrchestratorConfig::immediate(), None)
    }

    fn state(&self, id: &str, stage: &str) -> StageState {
        self.orchestrator
            .query_status(&EntityId::new(id))
            .get(stage)
            .unwrap()
            .state
    }
}

/// Extraction, analysis, `extra`, synthesis.
fn pipeline_with(extra: Arc<dyn Stage>, timeout: Option<Duration>) -> PipelineDefinition {
    let builder = PipelineBuilder::new("custom")
        .stage(Arc::new(DataExtractionStage::new(Duration::ZERO)))
        .stage(Arc::new(AnalysisStage::new(Duration::ZERO)));
    let builder = match timeout {
        Some(limit) => builder.stage_with_timeout(extra, limit),
        None => builder.stage(extra),
    };
    builder
        .stage(Arc::new(SynthesisStage::new(Duration::ZERO, ScoringPolicy::default())))
        .build()
        .unwrap()
}

/// Holds every `publish` call until released.
#[derive(Default)]
struct ParkedEvaluationSink {
    entered: Notify,
    release: Notify,
    store: InMemoryEvaluationStore,
}

impl ParkedEvaluationSink {
    async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl EvaluationSink for ParkedEvaluationSink {
    async fn publish(&self, result: EvaluationResult) {
        self.entered.notify_one();
        self.release.notified().await;
        self.store.publish(result).await;
    }
}

struct ParkedHarness {
    orchestrator: Orchestrator,
    sink: Arc<ParkedEvaluationSink>,
    registry: Arc<InMemoryApplicationRegistry>,
}

impl ParkedHarness {
    fn new(policy: DuplicatePolicy) -> Self {
        let sink = Arc::new(ParkedEvaluationSink::default());
        let registry = Arc::new(InMemoryApplicationRegistry::new());
        let orchestrator = Orchestrator::builder()
            .config(OrchestratorConfig::immediate().with_duplicate_policy(policy))
            .evaluation_sink(sink.clone())
            .entity_sink(registry.clone())
            .build()
            .unwrap();
        Self {
            orchestrator,
            sink,
            registry,
        }
    }
}

/// Panics for one application only.
#[derive(Debug)]
struct PanicFor {
    victim: EntityId,
}

#[async_trait]
impl Stage for PanicFor {
    fn name(&self) -> &str {
        "risk_review"
    }

    async fn run(&self, ctx: &StageContext) -> Result<StageResult, StageError> {
        ctx.report_progress(40);
        tokio::task::yield_now().await;
        assert_ne!(ctx.application().id, self.victim, "risk model crashed");
        ctx.output(&json!({ "reviewed": true }))
    }
}

#[tokio::test]
async fn test_end_to_end_evaluation() {
    let harness = Harness::new();
    let id = EntityId::new("app-1");

    let handle = harness
        .orchestrator
        .submit(fixtures::sample_application("app-1"))
        .await
        .unwrap();
    assert_eq!(handle.entity_id(), &id);
    assert_eq!(handle.generation(), 1);

    let outcome = handle.wait().await;
    let evaluation = outcome.evaluation().unwrap().clone();

    assert_eq!(evaluation.overall_score, 7.65);
    assert_eq!(evaluation.recommendation, Recommendation::Invest);
    assert_eq!(evaluation.risk_level, RiskLevel::Medium);
    assert_eq!(evaluation.red_flags, vec!["High competition", "Market timing"]);
    assert_eq!(evaluation.key_insights.len(), 5);

    assert_eq!(harness.orchestrator.query_result(&id), Some(evaluation.clone()));
    assert_eq!(harness.evaluations.get(&id), Some(evaluation));
    assert_eq!(harness.evaluations.publish_count(), 1);
    assert_eq!(harness.registry.status(&id), Some(ApplicationStatus::Evaluated));

    let snapshot = harness.orchestrator.query_status(&id);
    assert_eq!(snapshot.run_state(), RunState::Completed);
    assert!(snapshot.iter().all(|s| s.state == StageState::Completed && s.progress == 100));
    assert!(!harness.orchestrator.is_active(&id));
}

#[tokio::test]
async fn test_submit_registers_pending_before_running() {
    let harness = Harness::new();
    let id = EntityId::new("app-1");

    let handle = harness
        .orchestrator
        .submit(fixtures::sample_application("app-1"))
        .await
        .unwrap();

    // The current-thread runtime has not polled the run yet.
    let snapshot = harness.orchestrator.query_status(&id);
    assert_eq!(snapshot.len(), 5);
    assert!(snapshot.iter().all(|s| s.state == StageState::Pending && s.progress == 0));
    assert!(harness.orchestrator.is_active(&id));
    assert_eq!(harness.registry.status(&id), Some(ApplicationStatus::Submitted));

    handle.wait().await;
}

#[tokio::test]
async fn test_analysis_failure_leaves_later_stages_pending() {
    let harness = Harness::new();
    let id = EntityId::new("app-2");

    let outcome = harness
        .orchestrator
        .submit(fixtures::application_without_signals("app-2"))
        .await
        .unwrap()
        .wait()
        .await;

    let error = outcome.error().unwrap();
    assert_eq!(error.stage, names::ANALYSIS);
    assert_eq!(error.cause, StageErrorCause::InvalidInput);

    assert_eq!(harness.state("app-2", names::DATA_EXTRACTION), StageState::Completed);
    assert_eq!(harness.state("app-2", names::ANALYSIS), StageState::Failed);
    assert_eq!(harness.state("app-2", names::SCHEDULING), StageState::Pending);
    assert_eq!(harness.state("app-2", names::INTERVIEW), StageState::Pending);
    assert_eq!(harness.state("app-2", names::SYNTHESIS), StageState::Pending);

    assert!(harness.orchestrator.query_result(&id).is_none());
    assert!(harness.evaluations.is_empty());
    let record = harness.registry.get(&id).unwrap();
    assert_eq!(record.status, ApplicationStatus::Error);
    assert_eq!(record.last_error.unwrap().stage, names::ANALYSIS);
}

#[tokio::test]
async fn test_unknown_entity_status_is_complete() {
    let harness = Harness::new();
    let snapshot = harness.orchestrator.query_status(&EntityId::new("never-submitted"));

    assert_eq!(
        snapshot.iter().map(|s| s.stage_name.as_str()).collect::<Vec<_>>(),
        names::ALL.to_vec()
    );
    assert!(snapshot.iter().all(|s| s.state == StageState::Pending && s.progress == 0));
    assert!(harness.orchestrator.query_result(&EntityId::new("never-submitted")).is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failure_is_isolated_between_entities() {
    let harness = Harness::with(OrchestratorConfig::immediate().with_stage_latency_ms(2), None);
    let mut handles = Vec::new();

    for i in 0..8 {
        let id = format!("app-{i}");
        let app = if i == 3 {
            fixtures::application_without_signals(id)
        } else {
            fixtures::sample_application(id)
        };
        handles.push(harness.orchestrator.submit(app).await.unwrap());
    }

    for handle in handles {
        let failed = handle.entity_id().as_str() == "app-3";
        let outcome = handle.wait().await;
        assert_eq!(outcome.error().is_some(), failed);
    }

    assert_eq!(harness.evaluations.len(), 7);
    assert_eq!(harness.registry.count(ApplicationStatus::Error), 1);
    assert_eq!(harness.registry.count(ApplicationStatus::Evaluated), 7);
}

#[tokio::test]
async fn test_panic_is_isolated_between_entities() {
    let definition = pipeline_with(
        Arc::new(PanicFor {
            victim: EntityId::new("victim"),
        }),
        None,
    );
    let harness = Harness::with(OrchestratorConfig::immediate(), Some(definition));

    let victim = harness
        .orchestrator
        .submit(fixtures::sample_application("victim"))
        .await
        .unwrap();
    let bystander = harness
        .orchestrator
        .submit(fixtures::sample_application("bystander"))
        .await
        .unwrap();

    let error = victim.wait().await.error().cloned().unwrap();
    assert_eq!(error.cause, StageErrorCause::Internal);
    assert_eq!(error.stage, "risk_review");
    assert!(error.message.contains("risk model crashed"));

    assert!(bystander.wait().await.evaluation().is_some());
    assert_eq!(harness.state("victim", "risk_review"), StageState::Failed);
    assert_eq!(harness.state("victim", names::SYNTHESIS), StageState::Pending);
    assert!(!harness.orchestrator.is_active(&EntityId::new("victim")));
}

#[tokio::test]
async fn test_duplicate_submission_rejected() {
    let gate = Arc::new(GatedStage::new("review_gate"));
    let harness = Harness::with(
        OrchestratorConfig::immediate(),
        Some(pipeline_with(gate.clone(), None)),
    );

    let handle = harness
        .orchestrator
        .submit(fixtures::sample_application("app-1"))
        .await
        .unwrap();
    gate.wait_entered().await;

    let err = harness
        .orchestrator
        .submit(fixtures::sample_application("app-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, DealflowError::DuplicateRun(ref e) if e.entity_id == EntityId::new("app-1")));
    assert_eq!(harness.state("app-1", names::DATA_EXTRACTION), StageState::Completed);
    assert_eq!(harness.state("app-1", "review_gate"), StageState::Running);

    gate.release();
    assert!(handle.wait().await.evaluation().is_some());

    // The slot is free again once the run finished.
    let again = harness
        .orchestrator
        .submit(fixtures::sample_application("app-1"))
        .await
        .unwrap();
    assert_eq!(again.generation(), 2);
    assert!(harness.orchestrator.query_result(&EntityId::new("app-1")).is_none());
    gate.wait_entered().await;
    gate.release();
    assert!(again.wait().await.evaluation().is_some());
    assert_eq!(harness.evaluations.publish_count(), 2);
}

#[tokio::test]
async fn test_supersede_discards_the_older_run() {
    let gate = Arc::new(GatedStage::new("review_gate"));
    let harness = Harness::with(
        OrchestratorConfig::immediate().with_duplicate_policy(DuplicatePolicy::Supersede),
        Some(pipeline_with(gate.clone(), None)),
    );
    let id = EntityId::new("app-1");

    let first = harness
        .orchestrator
        .submit(fixtures::sample_application("app-1"))
        .await
        .unwrap();
    gate.wait_entered().await;

    let second = harness
        .orchestrator
        .submit(fixtures::sample_application("app-1"))
        .await
        .unwrap();
    assert_eq!(second.generation(), 2);

    // Re-registration resets every stage.
    let snapshot = harness.orchestrator.query_status(&id);
    assert!(snapshot.iter().all(|s| s.state == StageState::Pending));

    // Only the first run is parked at the gate at this point.
    gate.release();
    assert_eq!(first.wait().await, RunOutcome::Superseded);

    gate.wait_entered().await;
    gate.release();
    assert!(second.wait().await.evaluation().is_some());

    assert_eq!(harness.evaluations.publish_count(), 1);
    assert_eq!(harness.registry.status(&id), Some(ApplicationStatus::Evaluated));
    assert_eq!(harness.orchestrator.query_status(&id).run_state(), RunState::Completed);
    assert_eq!(harness.orchestrator.metrics().total_applications, 1);
}

#[tokio::test]
async fn test_cancel_stops_at_next_stage_boundary() {
    let gate = Arc::new(GatedStage::new("review_gate"));
    let harness = Harness::with(
        OrchestratorConfig::immediate(),
        Some(pipeline_with(gate.clone(), None)),
    );
    let id = EntityId::new("app-1");

    let handle = harness
        .orchestrator
        .submit(fixtures::sample_application("app-1"))
        .await
        .unwrap();
    gate.wait_entered().await;

    assert!(harness.orchestrator.cancel(&id));
    gate.release();

    let error = handle.wait().await.error().cloned().unwrap();
    assert_eq!(error.cause, StageErrorCause::Cancelled);
    assert_eq!(error.stage, names::SYNTHESIS);

    assert_eq!(harness.state("app-1", "review_gate"), StageState::Completed);
    assert_eq!(harness.state("app-1", names::SYNTHESIS), StageState::Failed);
    assert_eq!(harness.registry.status(&id), Some(ApplicationStatus::Error));
    assert!(!harness.orchestrator.cancel(&id));
    assert!(!harness.orchestrator.cancel(&EntityId::new("unknown")));
}

#[tokio::test]
async fn test_stage_timeout_fails_the_run() {
    let definition = pipeline_with(
        Arc::new(SlowStage::with_delay_ms("slow_review", 5_000)),
        Some(Duration::from_millis(20)),
    );
    let harness = Harness::with(OrchestratorConfig::immediate(), Some(definition));

    let error = harness
        .orchestrator
        .submit(fixtures::sample_application("app-1"))
        .await
        .unwrap()
        .wait()
        .await
        .error()
        .cloned()
        .unwrap();

    assert!(error.is_timeout());
    assert_eq!(error.stage, "slow_review");
    assert_eq!(harness.state("app-1", "slow_review"), StageState::Failed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_polling_never_observes_regression() {
    let harness = Harness::with(OrchestratorConfig::immediate().with_stage_latency_ms(5), None);
    let id = EntityId::new("app-1");

    let handle = harness
        .orchestrator
        .submit(fixtures::sample_application("app-1"))
        .await
        .unwrap();

    let mut last: Vec<(u8, u8)> = vec![(0, 0); 5];
    while !handle.is_finished() {
        let snapshot = harness.orchestrator.query_status(&id);
        for (i, status) in snapshot.iter().enumerate() {
            let current = (status.state.rank(), status.progress);
            assert!(current >= last[i], "{} regressed: {:?} -> {:?}", status.stage_name, last[i], current);
            last[i] = current;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    assert!(handle.wait().await.evaluation().is_some());
}

#[tokio::test]
async fn test_metrics() {
    let harness = Harness::new();

    for id in ["a", "b"] {
        harness
            .orchestrator
            .submit(fixtures::sample_application(id))
            .await
            .unwrap()
            .wait()
            .await;
    }
    harness
        .orchestrator
        .submit(fixtures::application_without_signals("c"))
        .await
        .unwrap()
        .wait()
        .await;

    let metrics = harness.orchestrator.metrics();
    assert_eq!(metrics.total_applications, 3);
    assert_eq!(metrics.evaluated_applications, 2);
    assert_eq!(metrics.errored_applications, 1);
    assert_eq!(metrics.pending_evaluation, 0);
    assert_eq!(metrics.recommendations.get(&Recommendation::Invest), Some(&2));
    assert!(metrics.average_processing_ms.is_some());
}

#[tokio::test]
async fn test_events_reach_the_event_sink() {
    let events = Arc::new(CollectingEventSink::new());
    let orchestrator = Orchestrator::builder()
        .config(OrchestratorConfig::immediate())
        .event_sink(events.clone())
        .build()
        .unwrap();

    orchestrator
        .submit(fixtures::sample_application("app-1"))
        .await
        .unwrap()
        .wait()
        .await;

    assert_eq!(events.of_kind(EventKind::StageStarted).len(), 5);
    assert_eq!(events.of_kind(EventKind::StageCompleted).len(), 5);
    assert_eq!(events.of_kind(EventKind::PipelineCompleted).len(), 1);
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = OrchestratorConfig::immediate()
        .with_weights(crate::scoring::ScoreWeights::new(0.5, 0.5, 0.5, 0.5));
    let err = Orchestrator::new(config).unwrap_err();

    assert!(matches!(err, DealflowError::Config(_)));
}

#[tokio::test]
async fn test_run_holds_its_slot_while_publishing() {
    let harness = ParkedHarness::new(DuplicatePolicy::Reject);
    let id = EntityId::new("app-1");

    let first = harness
        .orchestrator
        .submit(fixtures::sample_application("app-1"))
        .await
        .unwrap();
    harness.sink.wait_entered().await;

    assert!(harness.orchestrator.is_active(&id));
    let err = harness
        .orchestrator
        .submit(fixtures::sample_application("app-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, DealflowError::DuplicateRun(_)));
    assert_eq!(harness.registry.status(&id), Some(ApplicationStatus::Submitted));

    harness.sink.release();
    assert!(first.wait().await.evaluation().is_some());
    assert!(!harness.orchestrator.is_active(&id));
    assert_eq!(harness.registry.status(&id), Some(ApplicationStatus::Evaluated));

    let second = harness
        .orchestrator
        .submit(fixtures::sample_application("app-1"))
        .await
        .unwrap();
    assert_eq!(harness.registry.status(&id), Some(ApplicationStatus::Submitted));
    assert!(harness.orchestrator.query_result(&id).is_none());

    harness.sink.wait_entered().await;
    harness.sink.release();
    assert!(second.wait().await.evaluation().is_some());
    assert_eq!(harness.sink.store.publish_count(), 2);
    assert_eq!(harness.registry.status(&id), Some(ApplicationStatus::Evaluated));
}

#[tokio::test]
async fn test_supersede_waits_for_a_committing_run() {
    let harness = ParkedHarness::new(DuplicatePolicy::Supersede);
    let id = EntityId::new("app-1");

    let first = harness
        .orchestrator
        .submit(fixtures::sample_application("app-1"))
        .await
        .unwrap();
    harness.sink.wait_entered().await;

    let orchestrator = harness.orchestrator.clone();
    let resubmit = tokio::spawn(async move {
        orchestrator
            .submit(fixtures::sample_application("app-1"))
            .await
    });
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(!resubmit.is_finished());
    assert_eq!(harness.orchestrator.query_status(&id).run_state(), RunState::Completed);

    harness.sink.release();
    assert!(first.wait().await.evaluation().is_some());

    let second = resubmit.await.unwrap().unwrap();
    assert_eq!(second.generation(), 2);
    assert_eq!(harness.registry.status(&id), Some(ApplicationStatus::Submitted));

    harness.sink.wait_entered().await;
    harness.sink.release();
    assert!(second.wait().await.evaluation().is_some());
    assert_eq!(harness.sink.store.publish_count(), 2);
    assert_eq!(harness.registry.status(&id), Some(ApplicationStatus::Evaluated));
}
