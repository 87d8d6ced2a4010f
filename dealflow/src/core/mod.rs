//! Core domain model types for dealflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Stage and run state enums and the per-stage status record
//! - Stage result payloads
//! - The final evaluation result

mod evaluation;
mod result;
mod status;

pub use evaluation::EvaluationResult;
pub use result::{StageResult, StageResults};
pub use status::{RunState, StageState, StageStatus};
