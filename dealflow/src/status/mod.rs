//! Per-stage status tracking.
//!
//! The [`StatusStore`] is the only state shared between the orchestrator's
//! read path and its background runs.

mod store;

pub use store::{RunTicket, StatusSnapshot, StatusStore, UpdateOutcome};
