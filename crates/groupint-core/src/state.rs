use crate::{CascadeId, EntityId, Time, BOUNDARY_SUBINDEX};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a state inside one simulated timestep.
///
/// Every interior sub-step of a multi-tick transition is collapsed onto a
/// single canonical `Interior` state per `(entity, time)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Subindex {
    Boundary,
    Interior,
}

impl Subindex {
    /// Collapse a raw subindex from the event log.
    pub fn from_raw(raw: i64) -> Self {
        if raw == BOUNDARY_SUBINDEX {
            Subindex::Boundary
        } else {
            Subindex::Interior
        }
    }

    /// Canonical raw value (`-1` for boundaries, `0` for interior sub-steps)
    pub fn raw(self) -> i64 {
        match self {
            Subindex::Boundary => BOUNDARY_SUBINDEX,
            Subindex::Interior => 0,
        }
    }
}

/// An entity's status at one simulated instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimedState {
    pub entity: EntityId,
    pub time: Time,
    pub subindex: Subindex,
}

impl TimedState {
    pub fn new(entity: EntityId, time: Time, raw_subindex: i64) -> Self {
        Self {
            entity,
            time,
            subindex: Subindex::from_raw(raw_subindex),
        }
    }

    pub fn boundary(entity: EntityId, time: Time) -> Self {
        Self { entity, time, subindex: Subindex::Boundary }
    }

    pub fn interior(entity: EntityId, time: Time) -> Self {
        Self { entity, time, subindex: Subindex::Interior }
    }

    /// True if the state lies before the intervention time.
    pub fn is_before(&self, intervention_time: Time) -> bool {
        self.time < intervention_time
    }
}

impl fmt::Display for TimedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.subindex {
            Subindex::Boundary => write!(f, "{}@{}", self.entity, self.time),
            Subindex::Interior => write!(f, "{}@{}.0", self.entity, self.time),
        }
    }
}

/// Key of a `y` variable: one state in one cascade.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateKey {
    pub state: TimedState,
    pub cascade: CascadeId,
}

impl StateKey {
    pub fn new(state: TimedState, cascade: CascadeId) -> Self {
        Self { state, cascade }
    }

    pub fn entity_key(&self) -> EntityKey {
        EntityKey::new(self.state.entity, self.cascade)
    }
}

/// Key of a `z` variable: one entity in one cascade.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub entity: EntityId,
    pub cascade: CascadeId,
}

impl EntityKey {
    pub fn new(entity: EntityId, cascade: CascadeId) -> Self {
        Self { entity, cascade }
    }
}
