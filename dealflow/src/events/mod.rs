//! Lifecycle events for observability.
//!
//! The pipeline runner reports every stage transition to an [`EventSink`]
//! alongside its `tracing` output, so callers can attach their own
//! monitoring without polling the status store.

mod event;
mod sink;

pub use event::{EvaluationEvent, EventKind};
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
