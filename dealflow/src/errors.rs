//! Error types for the dealflow orchestrator.
//!
//! Stage failures are values, not faults: a [`StageError`] is captured by the
//! pipeline runner and surfaced through the status store and the entity sink.
//! The remaining types cover construction-time problems (pipeline validation,
//! weights, configuration) and the duplicate-submission policy.

use crate::application::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// The main error type for dealflow operations.
#[derive(Debug, Error)]
pub enum DealflowError {
    /// A pipeline validation error occurred.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// A stage could not produce its payload.
    #[error("{0}")]
    Stage(#[from] StageError),

    /// A run is already active for the submitted entity.
    #[error("{0}")]
    DuplicateRun(#[from] DuplicateRunError),

    /// Scoring weights are unusable.
    #[error("{0}")]
    Weights(#[from] WeightsError),

    /// Configuration could not be loaded.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Why a stage could not produce its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageErrorCause {
    /// The stage exceeded its maximum duration.
    Timeout,
    /// The entity's facts or a prior stage's payload were unusable.
    InvalidInput,
    /// The stage failed for any other reason, including panics.
    Internal,
    /// The run was cancelled before the stage could start.
    Cancelled,
}

impl fmt::Display for StageErrorCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::InvalidInput => write!(f, "invalid_input"),
            Self::Internal => write!(f, "internal"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Error raised when a single stage fails.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Stage '{stage}' failed ({cause}): {message}")]
pub struct StageError {
    /// The stage that failed.
    pub stage: String,
    /// The failure category.
    pub cause: StageErrorCause,
    /// Human readable detail.
    pub message: String,
}

impl StageError {
    /// Creates a new stage error.
    #[must_use]
    pub fn new(stage: impl Into<String>, cause: StageErrorCause, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            cause,
            message: message.into(),
        }
    }

    /// Creates an invalid-input error.
    #[must_use]
    pub fn invalid_input(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(stage, StageErrorCause::InvalidInput, message)
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(stage, StageErrorCause::Internal, message)
    }

    /// Creates a timeout error for a stage bounded by `limit`.
    #[must_use]
    pub fn timeout(stage: impl Into<String>, limit: Duration) -> Self {
        Self::new(
            stage,
            StageErrorCause::Timeout,
            format!("exceeded maximum duration of {}ms", limit.as_millis()),
        )
    }

    /// Creates a cancellation error.
    #[must_use]
    pub fn cancelled(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(stage, StageErrorCause::Cancelled, reason)
    }

    /// Returns true if the stage ran out of time.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.cause == StageErrorCause::Timeout
    }
}

/// Error raised when `submit` is called for an entity with an active run
/// and the duplicate policy is `Reject`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("An evaluation is already running for application '{entity_id}'")]
pub struct DuplicateRunError {
    /// The entity that already has a run in flight.
    pub entity_id: EntityId,
}

impl DuplicateRunError {
    /// Creates a new duplicate run error.
    #[must_use]
    pub fn new(entity_id: EntityId) -> Self {
        Self { entity_id }
    }
}

/// Error raised when scoring weights cannot be used verbatim.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeightsError {
    /// A weight is NaN or infinite.
    #[error("Weight '{name}' must be a finite number")]
    NonFinite {
        /// The offending weight.
        name: &'static str,
    },

    /// A weight is below zero.
    #[error("Weight '{name}' must not be negative (got {value})")]
    Negative {
        /// The offending weight.
        name: &'static str,
        /// Its value.
        value: f64,
    },

    /// The four weights do not sum to 1.0.
    #[error("Weights must sum to 1.0 (got {sum})")]
    SumMismatch {
        /// The actual sum.
        sum: f64,
    },
}

/// Error raised when configuration cannot be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration value is malformed or out of range.
    #[error("Invalid configuration value for '{key}': {message}")]
    Invalid {
        /// The configuration key.
        key: String,
        /// What is wrong with it.
        message: String,
    },

    /// The configuration document could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configured weights are unusable.
    #[error("{0}")]
    Weights(#[from] WeightsError),
}

impl ConfigError {
    /// Creates an invalid-value error.
    #[must_use]
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Metadata about a contract error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "PIPELINE-EMPTY").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when a pipeline definition is invalid.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the contract error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_display() {
        let err = StageError::invalid_input("analysis", "missing traction signal");
        assert_eq!(
            err.to_string(),
            "Stage 'analysis' failed (invalid_input): missing traction signal"
        );
    }

    #[test]
    fn test_stage_error_timeout() {
        let err = StageError::timeout("synthesis", Duration::from_millis(250));
        assert!(err.is_timeout());
        assert_eq!(err.message, "exceeded maximum duration of 250ms");
    }

    #[test]
    fn test_stage_error_serialization() {
        let err = StageError::internal("scheduling", "boom");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["cause"], serde_json::json!("internal"));

        let back: StageError = serde_json::from_value(json).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn test_duplicate_run_error_display() {
        let err = DuplicateRunError::new(EntityId::new("app-1"));
        assert_eq!(
            err.to_string(),
            "An evaluation is already running for application 'app-1'"
        );
    }

    #[test]
    fn test_validation_error_code() {
        let err = PipelineValidationError::new("Pipeline has no stages")
            .with_error_info(ContractErrorInfo::new("PIPELINE-EMPTY", "Cannot build an empty pipeline"));
        assert_eq!(err.code(), Some("PIPELINE-EMPTY"));
    }

    #[test]
    fn test_dealflow_error_from_stage_error() {
        let err: DealflowError = StageError::internal("analysis", "x").into();
        assert!(matches!(err, DealflowError::Stage(_)));
    }
}
