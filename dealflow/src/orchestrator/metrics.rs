//! Dashboard counters over every application the orchestrator has seen.

use crate::application::EntityId;
use crate::scoring::Recommendation;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate counts for a dashboard view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardMetrics {
    /// Distinct applications ever submitted.
    pub total_applications: usize,
    /// Applications whose latest run produced an evaluation.
    pub evaluated_applications: usize,
    /// Applications whose latest run is still in flight.
    pub pending_evaluation: usize,
    /// Applications whose latest run failed.
    pub errored_applications: usize,
    /// Evaluations per recommendation.
    pub recommendations: BTreeMap<Recommendation, usize>,
    /// Mean wall-clock duration of finished runs, if any finished.
    pub average_processing_ms: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Outcome {
    InFlight,
    Evaluated(Recommendation),
    Errored,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    outcome: Outcome,
    duration_ms: Option<f64>,
}

/// Latest run outcome per application.
#[derive(Debug, Default)]
pub(crate) struct RunLedger {
    entries: DashMap<EntityId, Entry>,
}

impl RunLedger {
    pub(crate) fn started(&self, entity_id: &EntityId) {
        self.entries.insert(
            entity_id.clone(),
            Entry {
                outcome: Outcome::InFlight,
                duration_ms: None,
            },
        );
    }

    pub(crate) fn evaluated(&self, entity_id: &EntityId, recommendation: Recommendation, duration_ms: f64) {
        self.finish(entity_id, Outcome::Evaluated(recommendation), duration_ms);
    }

    pub(crate) fn errored(&self, entity_id: &EntityId, duration_ms: f64) {
        self.finish(entity_id, Outcome::Errored, duration_ms);
    }

    fn finish(&self, entity_id: &EntityId, outcome: Outcome, duration_ms: f64) {
        self.entries.insert(
            entity_id.clone(),
            Entry {
                outcome,
                duration_ms: Some(duration_ms),
            },
        );
    }

    pub(crate) fn snapshot(&self) -> DashboardMetrics {
        let mut metrics = DashboardMetrics::default();
        let mut total_ms = 0.0;
        let mut finished = 0_u32;

        for entry in &self.entries {
            metrics.total_applications += 1;
            match entry.outcome {
                Outcome::InFlight => metrics.pending_evaluation += 1,
                Outcome::Evaluated(recommendation) => {
                    metrics.evaluated_applications += 1;
                    *metrics.recommendations.entry(recommendation).or_default() += 1;
                }
                Outcome::Errored => metrics.errored_applications += 1,
            }
            if let Some(ms) = entry.duration_ms {
                total_ms += ms;
                finished += 1;
            }
        }

        metrics.average_processing_ms = (finished > 0).then(|| total_ms / f64::from(finished));
        metrics
    }
}
