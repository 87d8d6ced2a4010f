//! Event sinks.

use super::{EvaluationEvent, EventKind};
use parking_lot::Mutex;
use tracing::{debug, info, Level};

/// Receives run and stage lifecycle events.
///
/// Called inline on the run's task: implementations must not block and
/// must not panic.
pub trait EventSink: Send + Sync {
    /// Records one event.
    fn record(&self, event: EvaluationEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn record(&self, _event: EvaluationEvent) {}
}

/// Logs every event through `tracing`.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a sink logging at `level`; anything but `DEBUG` logs at `INFO`.
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level sink.
    #[must_use]
    pub const fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl EventSink for LoggingEventSink {
    fn record(&self, event: EvaluationEvent) {
        let stage = event.stage.as_deref().unwrap_or("-");
        if self.level == Level::DEBUG {
            debug!(
                kind = %event.kind,
                application_id = %event.application_id,
                stage,
                data = %event.data,
                "Evaluation event"
            );
        } else {
            info!(
                kind = %event.kind,
                application_id = %event.application_id,
                stage,
                data = %event.data,
                "Evaluation event"
            );
        }
    }
}

/// Keeps every event in memory, in arrival order.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: Mutex<Vec<EvaluationEvent>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every collected event.
    #[must_use]
    pub fn events(&self) -> Vec<EvaluationEvent> {
        self.events.lock().clone()
    }

    /// Returns the kinds of the collected events, in arrival order.
    #[must_use]
    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().iter().map(|e| e.kind).collect()
    }

    /// Returns the events of one kind.
    #[must_use]
    pub fn of_kind(&self, kind: EventKind) -> Vec<EvaluationEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns true if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for CollectingEventSink {
    fn record(&self, event: EvaluationEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::EntityId;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn started(stage: &str) -> EvaluationEvent {
        EvaluationEvent::stage(EventKind::StageStarted, EntityId::new("app-1"), stage, json!({}))
    }

    #[test]
    fn test_logging_sink_accepts_both_levels() {
        LoggingEventSink::debug().record(started("analysis"));
        LoggingEventSink::default().record(EvaluationEvent::pipeline(
            EventKind::PipelineFailed,
            EntityId::new("app-1"),
            json!({ "stage": "analysis" }),
        ));
    }

    #[test]
    fn test_collecting_sink_filters_by_kind() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.record(started("data_extraction"));
        sink.record(started("analysis"));
        sink.record(EvaluationEvent::pipeline(
            EventKind::PipelineCompleted,
            EntityId::new("app-1"),
            json!({}),
        ));

        assert_eq!(sink.len(), 3);
        assert_eq!(
            sink.of_kind(EventKind::StageStarted)
                .iter()
                .filter_map(|e| e.stage.as_deref())
                .collect::<Vec<_>>(),
            vec!["data_extraction", "analysis"]
        );
        assert_eq!(
            sink.kinds(),
            vec![
                EventKind::StageStarted,
                EventKind::StageStarted,
                EventKind::PipelineCompleted
            ]
        );
    }
}
