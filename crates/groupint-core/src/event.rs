use crate::{EntityId, Time, TimedState};
use serde::{Deserialize, Serialize};

/// Transition label carried by an edge of the event log
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(alias = "StoE")]
    SusceptibleToExposed,
    #[serde(alias = "EtoI")]
    ExposedToInfectious,
    #[serde(alias = "ItoI")]
    InfectiousToInfectious,
    #[serde(alias = "EtoE")]
    ExposedToExposed,
}

impl EventType {
    /// Edges that carry the contagion between states.
    /// `ExposedToExposed` is internal to one entity and is absorbed by the
    /// subindex collapse.
    pub fn is_propagating(self) -> bool {
        !matches!(self, EventType::ExposedToExposed)
    }

    pub fn short_code(self) -> &'static str {
        match self {
            EventType::SusceptibleToExposed => "StoE",
            EventType::ExposedToInfectious => "EtoI",
            EventType::InfectiousToInfectious => "ItoI",
            EventType::ExposedToExposed => "EtoE",
        }
    }
}

/// One row of the event log.
///
/// Column names follow the log format; the simulator's native header names
/// are accepted as aliases and any extra columns are ignored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub simulation_step: i64,
    #[serde(alias = "source")]
    pub source_id: EntityId,
    #[serde(alias = "source_time_step")]
    pub source_time: Time,
    #[serde(alias = "source_index")]
    pub source_subindex: i64,
    #[serde(alias = "target")]
    pub target_id: EntityId,
    #[serde(alias = "target_time_step")]
    pub target_time: Time,
    #[serde(alias = "target_index")]
    pub target_subindex: i64,
    #[serde(default)]
    pub pathway: String,
    #[serde(alias = "event")]
    pub event_type: EventType,
}

impl EventRecord {
    /// Canonical (collapsed) source state
    pub fn source_state(&self) -> TimedState {
        TimedState::new(self.source_id, self.source_time, self.source_subindex)
    }

    /// Canonical (collapsed) target state
    pub fn target_state(&self) -> TimedState {
        TimedState::new(self.target_id, self.target_time, self.target_subindex)
    }
}
