use crate::program::{Comparison, ConstraintKind, LinearExpr, LinearProgram, VarBounds, VarId};
use crate::solver::LpSolution;
use crate::ModelError;
use groupint_core::{
    Cascade, CascadeId, EntityId, EntityKey, GroupHierarchy, GroupId, StateKey, Time, TimedState,
    UNGROUPED,
};
use indexmap::IndexMap;
use log::{debug, info, warn};
use std::collections::BTreeSet;

/// Accumulates the LP relaxation over an ensemble, one cascade at a time.
///
/// `x[group]` variables are shared by every cascade; `y[state, cascade]`
/// and `z[entity, cascade]` are scoped to the cascade that created them.
/// Cascades are numbered by the builder in the order they are added.
pub struct ModelBuilder<'h> {
    hierarchy: &'h GroupHierarchy,
    intervention_time: Time,
    program: LinearProgram,
    x: IndexMap<GroupId, VarId>,
    y: IndexMap<StateKey, VarId>,
    z: IndexMap<EntityKey, VarId>,
    unmapped: BTreeSet<EntityId>,
    cascades: usize,
    no_action_infected: usize,
}

impl<'h> ModelBuilder<'h> {
    pub fn new(hierarchy: &'h GroupHierarchy, intervention_time: Time) -> Self {
        Self {
            hierarchy,
            intervention_time,
            program: LinearProgram::new(),
            x: IndexMap::new(),
            y: IndexMap::new(),
            z: IndexMap::new(),
            unmapped: BTreeSet::new(),
            cascades: 0,
            no_action_infected: 0,
        }
    }

    pub fn intervention_time(&self) -> Time {
        self.intervention_time
    }

    pub fn num_cascades(&self) -> usize {
        self.cascades
    }

    pub fn program(&self) -> &LinearProgram {
        &self.program
    }

    pub fn group_variables(&self) -> &IndexMap<GroupId, VarId> {
        &self.x
    }

    pub fn state_variables(&self) -> &IndexMap<StateKey, VarId> {
        &self.y
    }

    pub fn entity_variables(&self) -> &IndexMap<EntityKey, VarId> {
        &self.z
    }

    /// Entities that were missing from the hierarchy
    pub fn unmapped_entities(&self) -> &BTreeSet<EntityId> {
        &self.unmapped
    }

    /// Group of `entity`; unmapped entities fall back to the sentinel and
    /// are reported once.
    pub fn group_of(&mut self, entity: EntityId) -> GroupId {
        match self.hierarchy.lookup(entity) {
            Some(g) => g,
            None => {
                if self.unmapped.insert(entity) {
                    warn!("entity {} not in any group; treated as ungrouped", entity);
                }
                UNGROUPED
            }
        }
    }

    /// `x[group]`, created on first use and reused across cascades
    pub fn ensure_group_variable(&mut self, group: GroupId) -> VarId {
        if let Some(&var) = self.x.get(&group) {
            return var;
        }
        let var = self.program.add_variable(VarBounds::unit());
        self.x.insert(group, var);
        var
    }

    /// `z[entity, cascade]`
    pub fn ensure_entity_variable(&mut self, key: EntityKey) -> VarId {
        if let Some(&var) = self.z.get(&key) {
            return var;
        }
        let var = self.program.add_variable(VarBounds::unit());
        self.z.insert(key, var);
        var
    }

    /// `y[state, cascade]`. A new state is tied to its entity's `z`, and is
    /// forced infected when it lies before the intervention time.
    pub fn ensure_state_variable(&mut self, key: StateKey) -> VarId {
        if let Some(&var) = self.y.get(&key) {
            return var;
        }
        let var = self.program.add_variable(VarBounds::unit());
        self.y.insert(key, var);

        let z = self.ensure_entity_variable(key.entity_key());
        self.program.add_constraint(
            ConstraintKind::EntityCoversState,
            LinearExpr::new().term(z, 1.0).term(var, -1.0),
            Comparison::Ge,
            0.0,
        );
        if key.state.is_before(self.intervention_time) {
            self.program.add_constraint(
                ConstraintKind::EarlySeed,
                LinearExpr::new().term(var, 1.0),
                Comparison::Eq,
                1.0,
            );
        }
        var
    }

    fn touch_state(&mut self, state: TimedState, cascade: CascadeId) {
        self.ensure_entity_variable(EntityKey::new(state.entity, cascade));
        self.ensure_state_variable(StateKey::new(state, cascade));
        let g = self.group_of(state.entity);
        self.ensure_group_variable(g);
    }

    /// Fold one cascade into the model.
    pub fn add_cascade(&mut self, cascade: &Cascade) {
        let c = self.cascades;
        let dag = cascade.dag();
        let tau = self.intervention_time;

        // Nodes are in first-seen order, so variables follow the log
        for &state in dag.states() {
            self.touch_state(state, c);
        }

        let mut n_sources = 0;
        for id in dag.sources() {
            let Some(&state) = dag.node(id) else { continue };
            let y = self.ensure_state_variable(StateKey::new(state, c));
            self.program.add_constraint(
                ConstraintKind::Source,
                LinearExpr::new().term(y, 1.0),
                Comparison::Eq,
                1.0,
            );
            n_sources += 1;
        }

        // y[t] >= y[s] - x[group(t)], skipped for targets already forced
        for edge in dag.edges() {
            let (Some(&s), Some(&t)) = (dag.node(edge.u), dag.node(edge.v)) else {
                continue;
            };
            if t.is_before(tau) {
                continue;
            }
            let ys = self.y[&StateKey::new(s, c)];
            let yt = self.y[&StateKey::new(t, c)];
            let g = self.group_of(t.entity);
            let xg = self.ensure_group_variable(g);
            self.program.add_constraint(
                ConstraintKind::Transmission,
                LinearExpr::new().term(yt, 1.0).term(ys, -1.0).term(xg, 1.0),
                Comparison::Ge,
                0.0,
            );
        }

        // y <= 1 - x[group]: an intervened group can't become infected
        for &state in dag.states() {
            if state.is_before(tau) {
                continue;
            }
            let y = self.y[&StateKey::new(state, c)];
            let g = self.group_of(state.entity);
            let xg = self.ensure_group_variable(g);
            self.program.add_constraint(
                ConstraintKind::Blocking,
                LinearExpr::new().term(y, 1.0).term(xg, 1.0),
                Comparison::Le,
                1.0,
            );
        }

        debug!(
            "simulation {} -> cascade {}: {} states, {} edges, {} sources",
            cascade.simulation_step,
            c,
            dag.num_nodes(),
            dag.num_edges(),
            n_sources
        );
        self.no_action_infected += cascade.entities().len();
        self.cascades += 1;
    }

    /// Close the model: budget, sentinel and objective.
    pub fn finish(mut self, budget: u32) -> Result<BuiltModel, ModelError> {
        if self.cascades == 0 {
            return Err(ModelError::EmptyEnsemble);
        }
        let m = self.cascades as f64;

        let mut budget_expr = LinearExpr::with_capacity(self.x.len());
        for (&g, &var) in &self.x {
            if g != UNGROUPED {
                budget_expr.add_term(var, 1.0);
            }
        }
        if !budget_expr.is_empty() {
            self.program
                .add_constraint(ConstraintKind::Budget, budget_expr, Comparison::Le, budget as f64);
        }
        if let Some(&sentinel) = self.x.get(&UNGROUPED) {
            self.program.add_constraint(
                ConstraintKind::SentinelZero,
                LinearExpr::new().term(sentinel, 1.0),
                Comparison::Eq,
                0.0,
            );
        }

        let mut objective = LinearExpr::with_capacity(self.z.len());
        for &var in self.z.values() {
            objective.add_term(var, 1.0 / m);
        }
        self.program.set_objective(objective);

        if !self.unmapped.is_empty() {
            warn!("{} entities are not in any group", self.unmapped.len());
        }
        let no_action = self.no_action_infected as f64 / m;
        info!("No action: avg. # entities infected {:.4}", no_action);
        info!(
            "Model: {} cascades, {} groups, {} variables, {} constraints",
            self.cascades,
            self.x.len(),
            self.program.num_variables(),
            self.program.num_constraints()
        );

        Ok(BuiltModel {
            program: self.program,
            x: self.x,
            y: self.y,
            z: self.z,
            num_cascades: self.cascades,
            no_action,
        })
    }
}

/// A closed model ready for the solver
pub struct BuiltModel {
    pub program: LinearProgram,
    pub x: IndexMap<GroupId, VarId>,
    pub y: IndexMap<StateKey, VarId>,
    pub z: IndexMap<EntityKey, VarId>,
    pub num_cascades: usize,
    /// Average entities infected per cascade with no intervention
    pub no_action: f64,
}

impl BuiltModel {
    /// Intervenable groups seen in the ensemble
    pub fn num_groups(&self) -> usize {
        self.x.keys().filter(|&&g| g != UNGROUPED).count()
    }

    /// Read the solver's values back into keyed tables
    pub fn extract(&self, solution: &LpSolution) -> FractionalSolution {
        let value = |var: &VarId| solution.values.get(var.0).copied().unwrap_or(0.0);
        FractionalSolution {
            x: self.x.iter().map(|(&k, v)| (k, value(v))).collect(),
            y: self.y.iter().map(|(&k, v)| (k, value(v))).collect(),
            z: self.z.iter().map(|(&k, v)| (k, value(v))).collect(),
        }
    }
}

/// Continuous optimum keyed by group, state and entity
#[derive(Clone, Debug, Default)]
pub struct FractionalSolution {
    pub x: IndexMap<GroupId, f64>,
    pub y: IndexMap<StateKey, f64>,
    pub z: IndexMap<EntityKey, f64>,
}

impl FractionalSolution {
    /// Budget actually spent by the relaxation (`Σ x`)
    pub fn lp_budget(&self) -> f64 {
        self.x.values().sum()
    }
}
