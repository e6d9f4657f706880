use crate::{EventType, TimedState};
use std::collections::{HashMap, HashSet};

pub type NodeId = usize;

/// Directed edge between two states of one cascade
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventEdge {
    pub u: NodeId, // source state
    pub v: NodeId, // target state
    pub kind: EventType,
}

impl EventEdge {
    pub fn new(u: NodeId, v: NodeId, kind: EventType) -> Self {
        Self { u, v, kind }
    }
}

/// Time-expanded DAG induced by one simulation.
///
/// Nodes are canonical `TimedState`s, numbered in first-seen order.
/// Edges are kept in log order, which the GM bound relies on.
#[derive(Clone, Debug, Default)]
pub struct CascadeDag {
    nodes: Vec<TimedState>,
    index: HashMap<TimedState, NodeId>,
    edges: Vec<EventEdge>,
    edge_set: HashSet<(NodeId, NodeId)>,
    in_degree: Vec<usize>,
    adjacency: Vec<Vec<NodeId>>,
}

impl CascadeDag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Node id of `state`, inserting it if unseen
    pub fn ensure_node(&mut self, state: TimedState) -> NodeId {
        if let Some(&id) = self.index.get(&state) {
            return id;
        }
        let id = self.nodes.len();
        self.nodes.push(state);
        self.index.insert(state, id);
        self.in_degree.push(0);
        self.adjacency.push(Vec::new());
        id
    }

    /// Add an edge between two states.
    ///
    /// Returns false when the edge is a duplicate or a self-loop; neither
    /// changes the DAG.
    pub fn add_edge(&mut self, src: TimedState, dst: TimedState, kind: EventType) -> bool {
        let u = self.ensure_node(src);
        let v = self.ensure_node(dst);
        if u == v || !self.edge_set.insert((u, v)) {
            return false;
        }
        self.edges.push(EventEdge::new(u, v, kind));
        self.in_degree[v] += 1;
        self.adjacency[u].push(v);
        true
    }

    pub fn node(&self, id: NodeId) -> Option<&TimedState> {
        self.nodes.get(id)
    }

    pub fn node_id(&self, state: &TimedState) -> Option<NodeId> {
        self.index.get(state).copied()
    }

    pub fn states(&self) -> &[TimedState] {
        &self.nodes
    }

    pub fn edges(&self) -> &[EventEdge] {
        &self.edges
    }

    pub fn in_degree(&self, id: NodeId) -> usize {
        self.in_degree.get(id).copied().unwrap_or(0)
    }

    /// Successors of node `u`
    pub fn neighbors(&self, u: NodeId) -> &[NodeId] {
        self.adjacency.get(u).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Nodes with no incoming edge (the forced-infected seeds)
    pub fn sources(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).filter(move |&id| self.in_degree[id] == 0)
    }
}
