//! Stage and run state enums, and the per-stage status record.

use crate::application::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The lifecycle state of one stage for one entity.
///
/// States only move forward: `Pending → Running → {Completed, Failed}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    /// Registered but not started.
    #[default]
    Pending,
    /// Currently executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl StageState {
    /// Position in the forward-only order. Both terminal states share a rank.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Running => 1,
            Self::Completed | Self::Failed => 2,
        }
    }

    /// Returns true if the state is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if moving from `self` to `next` is allowed.
    ///
    /// Staying in `Running` is allowed so progress can be updated.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        next.rank() > self.rank() || matches!((self, next), (Self::Running, Self::Running))
    }
}

/// The lifecycle state of a whole pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// No stage has started.
    NotStarted,
    /// At least one stage has started and none has failed.
    Running,
    /// Every stage completed.
    Completed,
    /// A stage failed.
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl RunState {
    /// Derives the run state from the states of its stages, in pipeline order.
    #[must_use]
    pub fn from_stages<I>(states: I) -> Self
    where
        I: IntoIterator<Item = StageState>,
    {
        let mut any_started = false;
        let mut all_completed = true;
        let mut empty = true;

        for state in states {
            empty = false;
            match state {
                StageState::Failed => return Self::Failed,
                StageState::Pending => all_completed = false,
                StageState::Running => {
                    any_started = true;
                    all_completed = false;
                }
                StageState::Completed => any_started = true,
            }
        }

        if empty || !any_started {
            Self::NotStarted
        } else if all_completed {
            Self::Completed
        } else {
            Self::Running
        }
    }

    /// Returns true if the run has finished.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Progress record of one stage for one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageStatus {
    /// The entity being evaluated.
    pub entity_id: EntityId,
    /// The stage name.
    pub stage_name: String,
    /// Current state.
    pub state: StageState,
    /// Progress percentage in `[0, 100]`.
    pub progress: u8,
    /// When the record was last written.
    pub last_updated: DateTime<Utc>,
}

impl StageStatus {
    /// Creates a `Pending` record with zero progress.
    #[must_use]
    pub fn pending(entity_id: EntityId, stage_name: impl Into<String>) -> Self {
        Self {
            entity_id,
            stage_name: stage_name.into(),
            state: StageState::Pending,
            progress: 0,
            last_updated: Utc::now(),
        }
    }

    /// Returns true if the stage has finished.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
