//! Pipeline definition and execution.
//!
//! This module provides:
//! - `PipelineDefinition`, the validated ordered stage list
//! - `PipelineBuilder` with validation
//! - `Pipeline`, the sequential runner

mod definition;
mod runner;


pub use definition::{PipelineBuilder, PipelineDefinition, StageDescriptor};
pub use runner::Pipeline;
pub(crate) use runner::panic_message;
