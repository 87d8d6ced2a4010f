//! # Dealflow
//!
//! A staged evaluation orchestrator for startup funding applications.
//!
//! Each submitted application runs through a fixed, ordered pipeline of
//! stages as an independent tokio task:
//!
//! - **Data extraction**: normalise the application's facts into a profile
//! - **Analysis**: validate the assessment signals into four sub-scores
//! - **Scheduling / interview**: coordination steps that do not affect scores
//! - **Synthesis**: apply the weighted scoring policy
//!
//! Per-stage status is kept in a concurrent [`StatusStore`] that callers poll
//! while the run is in flight. Finished evaluations go to an
//! [`EvaluationSink`], and lifecycle transitions go to an [`EntityStatusSink`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dealflow::prelude::*;
//!
//! # async fn demo() -> Result<(), DealflowError> {
//! let orchestrator = Orchestrator::new(OrchestratorConfig::default())?;
//! let handle = orchestrator
//!     .submit(dealflow::testing::sample_application("app-1"))
//!     .await?;
//!
//! let snapshot = orchestrator.query_status(handle.entity_id());
//! println!("{:?}", snapshot.run_state());
//!
//! if let RunOutcome::Evaluated(result) = handle.wait().await {
//!     println!("{} -> {}", result.overall_score, result.recommendation);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod application;
pub mod cancellation;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod orchestrator;
pub mod pipeline;
pub mod scoring;
pub mod stages;
pub mod status;
pub mod testing;

pub use orchestrator::{EntityStatusSink, EvaluationSink, Orchestrator};
pub use status::StatusStore;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::application::{Application, EntityId};
    pub use crate::cancellation::{CancelReason, CancellationToken};
    pub use crate::config::{DuplicatePolicy, OrchestratorConfig};
    pub use crate::core::{
        EvaluationResult, RunState, StageResult, StageResults, StageState, StageStatus,
    };
    pub use crate::errors::{
        ConfigError, DealflowError, DuplicateRunError, PipelineValidationError, StageError,
        StageErrorCause, WeightsError,
    };
    pub use crate::events::{EvaluationEvent, EventKind, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::orchestrator::{
        DashboardMetrics, EntityStatusSink, EvaluationSink, InMemoryApplicationRegistry,
        InMemoryEvaluationStore, Orchestrator, OrchestratorBuilder, RunHandle, RunOutcome,
    };
    pub use crate::pipeline::{PipelineBuilder, PipelineDefinition};
    pub use crate::scoring::{
        InvestorPreferences, Recommendation, RiskLevel, ScoreWeights, ScoringPolicy, SubScores,
    };
    pub use crate::stages::{Stage, StageContext};
    pub use crate::status::{StatusSnapshot, StatusStore};
}
