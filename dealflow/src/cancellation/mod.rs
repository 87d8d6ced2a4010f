//! Cooperative cancellation and cleanup utilities.
//!
//! This module provides:
//! - `CancellationToken`, checked by the pipeline at stage boundaries
//! - `CleanupGuard`, which runs a closure when dropped

mod guard;
mod token;

pub use guard::CleanupGuard;
pub use token::{CancelReason, CancellationToken};
