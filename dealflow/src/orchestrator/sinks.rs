//! Collaborators notified when a run finishes, and in-memory implementations.

use crate::application::{Application, EntityId};
use crate::core::EvaluationResult;
use crate::errors::StageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Receives every successful evaluation, exactly once per completed run.
#[async_trait]
pub trait EvaluationSink: Send + Sync {
    /// Publishes a finished evaluation.
    async fn publish(&self, result: EvaluationResult);
}

/// Tracks the coarse lifecycle of each submitted application.
///
/// `mark_evaluated` or `mark_errored` is called exactly once per finished,
/// non-superseded run.
#[async_trait]
pub trait EntityStatusSink: Send + Sync {
    /// Called when an application is accepted for evaluation.
    async fn mark_submitted(&self, _application: &Application) {}

    /// Called when a run produced an evaluation.
    async fn mark_evaluated(&self, entity_id: &EntityId);

    /// Called when a run failed.
    async fn mark_errored(&self, entity_id: &EntityId, error: &StageError);
}

/// A sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpSink;

#[async_trait]
impl EvaluationSink for NoOpSink {
    async fn publish(&self, _result: EvaluationResult) {}
}

#[async_trait]
impl EntityStatusSink for NoOpSink {
    async fn mark_evaluated(&self, _entity_id: &EntityId) {}

    async fn mark_errored(&self, _entity_id: &EntityId, _error: &StageError) {}
}

/// Stores published evaluations by application.
#[derive(Debug, Default)]
pub struct InMemoryEvaluationStore {
    evaluations: DashMap<EntityId, EvaluationResult>,
    published: AtomicUsize,
}

impl InMemoryEvaluationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the latest evaluation of an application.
    #[must_use]
    pub fn get(&self, entity_id: &EntityId) -> Option<EvaluationResult> {
        self.evaluations.get(entity_id).map(|e| e.clone())
    }

    /// Returns the number of applications with an evaluation.
    #[must_use]
    pub fn len(&self) -> usize {
        self.evaluations.len()
    }

    /// Returns true if nothing has been published.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.evaluations.is_empty()
    }

    /// Returns how many times `publish` was called.
    #[must_use]
    pub fn publish_count(&self) -> usize {
        self.published.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EvaluationSink for InMemoryEvaluationStore {
    async fn publish(&self, result: EvaluationResult) {
        self.published.fetch_add(1, Ordering::SeqCst);
        self.evaluations.insert(result.application_id.clone(), result);
    }
}

/// Coarse application lifecycle: `submitted → evaluated | error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    /// Accepted; evaluation in progress.
    Submitted,
    /// Evaluation finished successfully.
    Evaluated,
    /// Evaluation failed.
    Error,
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submitted => write!(f, "submitted"),
            Self::Evaluated => write!(f, "evaluated"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One entry of the [`InMemoryApplicationRegistry`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationRecord {
    /// The application as last submitted.
    pub application: Application,
    /// Its lifecycle status.
    pub status: ApplicationStatus,
    /// The failure of the last run, if it failed.
    pub last_error: Option<StageError>,
    /// When the status last changed.
    pub updated_at: DateTime<Utc>,
}

/// Keeps every submitted application with its lifecycle status.
#[derive(Debug, Default)]
pub struct InMemoryApplicationRegistry {
    records: DashMap<EntityId, ApplicationRecord>,
}

impl InMemoryApplicationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets one application's record.
    #[must_use]
    pub fn get(&self, entity_id: &EntityId) -> Option<ApplicationRecord> {
        self.records.get(entity_id).map(|r| r.clone())
    }

    /// Gets one application's status.
    #[must_use]
    pub fn status(&self, entity_id: &EntityId) -> Option<ApplicationStatus> {
        self.records.get(entity_id).map(|r| r.status)
    }

    /// Lists every application, oldest submission first.
    #[must_use]
    pub fn list(&self) -> Vec<ApplicationRecord> {
        let mut records: Vec<_> = self.records.iter().map(|r| r.clone()).collect();
        records.sort_by(|a, b| {
            a.application
                .submitted_at
                .cmp(&b.application.submitted_at)
                .then_with(|| a.application.id.cmp(&b.application.id))
        });
        records
    }

    /// Counts applications in `status`.
    #[must_use]
    pub fn count(&self, status: ApplicationStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }

    /// Returns the number of applications.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no application was submitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn transition(&self, entity_id: &EntityId, status: ApplicationStatus, error: Option<&StageError>) {
        if let Some(mut record) = self.records.get_mut(entity_id) {
            record.status = status;
            record.last_error = error.cloned();
            record.updated_at = Utc::now();
        }
    }
}

#[async_trait]
impl EntityStatusSink for InMemoryApplicationRegistry {
    async fn mark_submitted(&self, application: &Application) {
        self.records.insert(
            application.id.clone(),
            ApplicationRecord {
                application: application.clone(),
                status: ApplicationStatus::Submitted,
                last_error: None,
                updated_at: Utc::now(),
            },
        );
    }

    async fn mark_evaluated(&self, entity_id: &EntityId) {
        self.transition(entity_id, ApplicationStatus::Evaluated, None);
    }

    async fn mark_errored(&self, entity_id: &EntityId, error: &StageError) {
        self.transition(entity_id, ApplicationStatus::Error, Some(error));
    }
}
