//! Typed run and stage lifecycle events.

use crate::application::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A stage moved to `Running`.
    #[serde(rename = "stage.started")]
    StageStarted,
    /// A running stage reported intermediate progress.
    #[serde(rename = "stage.progress")]
    StageProgress,
    /// A stage completed.
    #[serde(rename = "stage.completed")]
    StageCompleted,
    /// A stage failed, timed out, panicked or was cancelled.
    #[serde(rename = "stage.failed")]
    StageFailed,
    /// Every stage of a run completed.
    #[serde(rename = "pipeline.completed")]
    PipelineCompleted,
    /// A run stopped at a failed stage.
    #[serde(rename = "pipeline.failed")]
    PipelineFailed,
}

impl EventKind {
    /// Returns the dotted event name, e.g. `stage.started`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StageStarted => "stage.started",
            Self::StageProgress => "stage.progress",
            Self::StageCompleted => "stage.completed",
            Self::StageFailed => "stage.failed",
            Self::PipelineCompleted => "pipeline.completed",
            Self::PipelineFailed => "pipeline.failed",
        }
    }

    /// Returns true for per-stage events.
    #[must_use]
    pub const fn is_stage_event(self) -> bool {
        matches!(
            self,
            Self::StageStarted | Self::StageProgress | Self::StageCompleted | Self::StageFailed
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One lifecycle event of an evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationEvent {
    /// What happened.
    pub kind: EventKind,
    /// The application being evaluated.
    pub application_id: EntityId,
    /// The stage concerned; `None` for run-level events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    /// Event-specific fields such as `progress` or `duration_ms`.
    #[serde(default)]
    pub data: Value,
    /// When the event was raised.
    pub at: DateTime<Utc>,
}

impl EvaluationEvent {
    /// Creates a per-stage event.
    #[must_use]
    pub fn stage(kind: EventKind, application_id: EntityId, stage: impl Into<String>, data: Value) -> Self {
        Self {
            kind,
            application_id,
            stage: Some(stage.into()),
            data,
            at: Utc::now(),
        }
    }

    /// Creates a run-level event.
    #[must_use]
    pub fn pipeline(kind: EventKind, application_id: EntityId, data: Value) -> Self {
        Self {
            kind,
            application_id,
            stage: None,
            data,
            at: Utc::now(),
        }
    }
}
