use crate::{CascadeDag, CascadeId, EntityId, EventRecord, TimedState};
use log::{debug, warn};
use std::collections::{BTreeSet, HashSet};
use std::iter::Peekable;

/// One simulated contagion run: the DAG induced by its event records.
#[derive(Clone, Debug)]
pub struct Cascade {
    /// Position of the cascade within the ensemble (0-based)
    pub index: CascadeId,
    /// Simulation id as written in the log
    pub simulation_step: i64,
    dag: CascadeDag,
    entities: BTreeSet<EntityId>,
    discarded: usize,
}

impl Cascade {
    pub fn new(index: CascadeId, simulation_step: i64) -> Self {
        Self {
            index,
            simulation_step,
            dag: CascadeDag::new(),
            entities: BTreeSet::new(),
            discarded: 0,
        }
    }

    /// Build a cascade from an already-grouped slice of records
    pub fn from_records<'a>(
        index: CascadeId,
        simulation_step: i64,
        records: impl IntoIterator<Item = &'a EventRecord>,
    ) -> Self {
        let mut cascade = Self::new(index, simulation_step);
        for rec in records {
            cascade.push(rec);
        }
        cascade
    }

    /// Fold one record into the DAG.
    /// `ExposedToExposed` edges are dropped; the collapse already merges
    /// their endpoints.
    pub fn push(&mut self, rec: &EventRecord) {
        if !rec.event_type.is_propagating() {
            self.discarded += 1;
            return;
        }
        self.entities.insert(rec.source_id);
        self.entities.insert(rec.target_id);
        self.dag.add_edge(rec.source_state(), rec.target_state(), rec.event_type);
    }

    pub fn dag(&self) -> &CascadeDag {
        &self.dag
    }

    /// Entities infected in this cascade when nobody is intervened on
    pub fn entities(&self) -> &BTreeSet<EntityId> {
        &self.entities
    }

    pub fn num_discarded(&self) -> usize {
        self.discarded
    }

    /// States with in-degree zero
    pub fn sources(&self) -> Vec<TimedState> {
        self.dag
            .sources()
            .filter_map(|id| self.dag.node(id).copied())
            .collect()
    }
}

/// Streaming parser: turns an ordered record iterator into one `Cascade`
/// per contiguous run of `simulation_step` values.
///
/// Only one cascade is ever held in memory. Restart by building a new
/// stream over a fresh record iterator.
pub struct CascadeStream<I>
where
    I: Iterator,
{
    records: Peekable<I>,
    next_index: CascadeId,
    seen: HashSet<i64>,
}

impl<I, E> CascadeStream<I>
where
    I: Iterator<Item = Result<EventRecord, E>>,
{
    pub fn new(records: I) -> Self {
        Self {
            records: records.peekable(),
            next_index: 0,
            seen: HashSet::new(),
        }
    }

    /// Number of cascades emitted so far
    pub fn emitted(&self) -> usize {
        self.next_index
    }
}

impl<I, E> Iterator for CascadeStream<I>
where
    I: Iterator<Item = Result<EventRecord, E>>,
{
    type Item = Result<Cascade, E>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = match self.records.next()? {
            Ok(rec) => rec,
            Err(e) => return Some(Err(e)),
        };
        let sim = first.simulation_step;
        if !self.seen.insert(sim) {
            warn!(
                "simulation {} appears in non-contiguous rows; treating as a new cascade",
                sim
            );
        }

        let mut cascade = Cascade::new(self.next_index, sim);
        cascade.push(&first);
        loop {
            match self.records.peek() {
                Some(Ok(rec)) if rec.simulation_step == sim => {}
                _ => break,
            }
            if let Some(Ok(rec)) = self.records.next() {
                cascade.push(&rec);
            }
        }

        debug!(
            "simulation {}: DAG (nodes, edges) {},{}; {} internal edges dropped",
            sim,
            cascade.dag().num_nodes(),
            cascade.dag().num_edges(),
            cascade.num_discarded()
        );
        self.next_index += 1;
        Some(Ok(cascade))
    }
}
