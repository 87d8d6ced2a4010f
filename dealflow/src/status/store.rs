//! Concurrent status store keyed by `(entity, stage)`.

use crate::application::EntityId;
use crate::core::{RunState, StageState, StageStatus};
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Composite key of one status record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StatusKey {
    entity_id: EntityId,
    stage_name: String,
}

impl StatusKey {
    fn new(entity_id: &EntityId, stage_name: &str) -> Self {
        Self {
            entity_id: entity_id.clone(),
            stage_name: stage_name.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u64,
    status: StageStatus,
}

/// Write authority for one run of one entity.
///
/// Issued by [`StatusStore::register`]. A ticket whose generation has been
/// superseded by a later registration can no longer change any record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunTicket {
    /// The entity the run belongs to.
    pub entity_id: EntityId,
    /// Registration generation, starting at 1.
    pub generation: u64,
}

/// What happened to an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The record was written.
    Applied,
    /// The ticket belongs to a superseded run; nothing was written.
    Superseded,
    /// The write would have moved the record backwards; nothing was written.
    Rejected,
}

impl UpdateOutcome {
    /// Returns true if the record was written.
    #[must_use]
    pub const fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Ordered view of every declared stage's status for one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    entity_id: EntityId,
    stages: Vec<StageStatus>,
}

impl StatusSnapshot {
    /// Returns the entity the snapshot describes.
    #[must_use]
    pub const fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    /// Gets the status of one stage.
    #[must_use]
    pub fn get(&self, stage_name: &str) -> Option<&StageStatus> {
        self.stages.iter().find(|s| s.stage_name == stage_name)
    }

    /// Iterates statuses in pipeline order.
    pub fn iter(&self) -> impl Iterator<Item = &StageStatus> {
        self.stages.iter()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the pipeline declares no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Derives the overall run state.
    #[must_use]
    pub fn run_state(&self) -> RunState {
        RunState::from_stages(self.stages.iter().map(|s| s.state))
    }

    /// Converts to a stage-name keyed map.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, StageStatus> {
        self.stages
            .iter()
            .map(|s| (s.stage_name.clone(), s.clone()))
            .collect()
    }
}

/// Concurrency-safe mapping from `(entity, stage)` to a status record.
///
/// All synchronization is internal. Records only move forward within one
/// registration generation; a new registration invalidates the previous
/// generation's records in place and resets them to `Pending`.
#[derive(Debug)]
pub struct StatusStore {
    stage_names: Arc<[String]>,
    records: DashMap<StatusKey, Slot>,
    generations: DashMap<EntityId, u64>,
}

impl StatusStore {
    /// Creates a store reporting on the given stages, in pipeline order.
    #[must_use]
    pub fn new<I, S>(stage_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stage_names: stage_names.into_iter().map(Into::into).collect(),
            records: DashMap::new(),
            generations: DashMap::new(),
        }
    }

    /// Returns the declared stage names.
    #[must_use]
    pub fn stage_names(&self) -> &[String] {
        &self.stage_names
    }

    /// Registers a new run for `entity_id`, resetting every declared stage
    /// to `Pending` and invalidating tickets of earlier runs.
    pub fn register(&self, entity_id: &EntityId) -> RunTicket {
        let generation = {
            let mut current = self.generations.entry(entity_id.clone()).or_insert(0);
            *current += 1;
            *current
        };
        let ticket = RunTicket {
            entity_id: entity_id.clone(),
            generation,
        };

        for stage_name in self.stage_names.iter() {
            let fresh = Slot {
                generation,
                status: StageStatus::pending(entity_id.clone(), stage_name),
            };
            match self.records.entry(StatusKey::new(entity_id, stage_name)) {
                Entry::Occupied(mut occupied) => {
                    if occupied.get().generation < generation {
                        occupied.insert(fresh);
                    }
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(fresh);
                }
            }
        }

        debug!(entity_id = %entity_id, generation, "Registered run");
        ticket
    }

    /// Upserts the status of one stage.
    ///
    /// `Completed` always records 100% progress. While `Running`, progress
    /// may only grow. Writes from superseded tickets and backward moves are
    /// refused, so readers never observe a regression.
    pub fn set(&self, ticket: &RunTicket, stage_name: &str, state: StageState, progress: u8) -> UpdateOutcome {
        let progress = if state == StageState::Completed {
            100
        } else {
            progress.min(100)
        };

        let key = StatusKey::new(&ticket.entity_id, stage_name);
        let outcome = match self.records.entry(key) {
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                if slot.generation > ticket.generation {
                    UpdateOutcome::Superseded
                } else if slot.generation < ticket.generation {
                    slot.generation = ticket.generation;
                    slot.status = Self::record(ticket, stage_name, state, progress);
                    UpdateOutcome::Applied
                } else if !slot.status.state.can_transition_to(state)
                    || (state == StageState::Running && progress < slot.status.progress)
                {
                    UpdateOutcome::Rejected
                } else {
                    slot.status.state = state;
                    slot.status.progress = progress;
                    slot.status.last_updated = Utc::now();
                    UpdateOutcome::Applied
                }
            }
            Entry::Vacant(vacant) => {
                if self.current_generation(&ticket.entity_id) > ticket.generation {
                    UpdateOutcome::Superseded
                } else {
                    vacant.insert(Slot {
                        generation: ticket.generation,
                        status: Self::record(ticket, stage_name, state, progress),
                    });
                    UpdateOutcome::Applied
                }
            }
        };

        if !outcome.is_applied() {
            debug!(
                entity_id = %ticket.entity_id,
                stage = stage_name,
                state = %state,
                progress,
                ?outcome,
                "Status update not applied"
            );
        }
        outcome
    }

    /// Gets the status of one stage, defaulting to `Pending` at 0%.
    #[must_use]
    pub fn get(&self, entity_id: &EntityId, stage_name: &str) -> StageStatus {
        self.records
            .get(&StatusKey::new(entity_id, stage_name))
            .map_or_else(
                || StageStatus::pending(entity_id.clone(), stage_name),
                |slot| slot.status.clone(),
            )
    }

    /// Gets every declared stage's status, defaulting absent ones to `Pending`.
    #[must_use]
    pub fn get_all(&self, entity_id: &EntityId) -> StatusSnapshot {
        StatusSnapshot {
            entity_id: entity_id.clone(),
            stages: self
                .stage_names
                .iter()
                .map(|name| self.get(entity_id, name))
                .collect(),
        }
    }

    /// Returns the latest registration generation, or 0 if never registered.
    #[must_use]
    pub fn current_generation(&self, entity_id: &EntityId) -> u64 {
        self.generations.get(entity_id).map_or(0, |g| *g)
    }

    /// Returns true if `ticket` belongs to the latest registration.
    #[must_use]
    pub fn is_current(&self, ticket: &RunTicket) -> bool {
        self.current_generation(&ticket.entity_id) == ticket.generation
    }

    fn record(ticket: &RunTicket, stage_name: &str, state: StageState, progress: u8) -> StageStatus {
        StageStatus {
            entity_id: ticket.entity_id.clone(),
            stage_name: stage_name.to_string(),
            state,
            progress,
            last_updated: Utc::now(),
        }
    }
}
