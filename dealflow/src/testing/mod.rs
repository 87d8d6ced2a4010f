//! Testing utilities for dealflow pipelines.
//!
//! This module provides:
//! - Mock stages that fail, stall, panic or record their inputs
//! - Sample applications

pub mod fixtures;
pub mod mocks;

pub use fixtures::{
    application_with_signals, application_without_description, application_without_signals,
    sample_application,
};
pub use mocks::{
    FailingStage, GatedStage, PanickingStage, RecordedExecution, RecordingStage, SlowStage,
};
