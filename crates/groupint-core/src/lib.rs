pub mod state;
pub mod event;
pub mod graph;
pub mod cascade;
pub mod hierarchy;
pub mod gm;
pub mod gapfill;

// Core identifiers
pub type EntityId = i64;
pub type GroupId = i64;
pub type Time = i64;
pub type CascadeId = usize;

/// Group assigned to entities that are missing from the hierarchy.
/// Such entities can never be intervened on.
pub const UNGROUPED: GroupId = -1;

/// Raw subindex marking a timestep boundary state.
pub const BOUNDARY_SUBINDEX: i64 = -1;

pub use state::{TimedState, Subindex, StateKey, EntityKey};
pub use event::{EventType, EventRecord};
pub use graph::{CascadeDag, EventEdge, NodeId};
pub use cascade::{Cascade, CascadeStream};
pub use hierarchy::GroupHierarchy;
pub use gm::{gm_bound, gm_per_cascade};
pub use gapfill::{fill_gaps, AuditRow, Variant, VariantKey, FilledSolution};
