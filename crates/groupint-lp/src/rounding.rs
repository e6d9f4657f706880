use crate::builder::FractionalSolution;
use groupint_core::{AuditRow, EntityKey, GroupId, StateKey, UNGROUPED};
use indexmap::IndexMap;
use log::info;
use serde::{Deserialize, Serialize};

/// Midpoint used for the additive (`y`, `z`) part of the objective
pub const MIDPOINT: f64 = 0.5;

/// How fractional group values become 0/1 decisions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundingMode {
    /// `x[g] -> 1` iff `x[g] >= 1 / (2 * denom)`
    Threshold { denom: usize },
    /// The `budget` largest fractional values round to 1
    FixedBudget { budget: usize },
}

impl RoundingMode {
    pub fn threshold(&self) -> Option<f64> {
        match *self {
            RoundingMode::Threshold { denom } => Some(1.0 / (2.0 * denom.max(1) as f64)),
            RoundingMode::FixedBudget { .. } => None,
        }
    }
}

/// Integral decision plus the audit table it was derived from
#[derive(Clone, Debug, Default)]
pub struct RoundedSolution {
    pub x: IndexMap<GroupId, bool>,
    pub y: IndexMap<StateKey, bool>,
    pub z: IndexMap<EntityKey, bool>,
    /// Every intervenable group with its fractional value and decision
    pub audit: Vec<AuditRow>,
    pub threshold: Option<f64>,
}

impl RoundedSolution {
    /// Groups rounded to 1, in first-seen order
    pub fn selected_groups(&self) -> Vec<GroupId> {
        self.x
            .iter()
            .filter(|(_, &on)| on)
            .map(|(&g, _)| g)
            .collect()
    }

    /// `(entity, cascade)` pairs rounded to infected
    pub fn infected_count(&self) -> usize {
        self.z.values().filter(|&&on| on).count()
    }
}

/// Round group values. The sentinel group is never selected and never
/// audited.
pub fn round_groups(x: &IndexMap<GroupId, f64>, mode: RoundingMode) -> (IndexMap<GroupId, bool>, Vec<AuditRow>) {
    let mut decided: IndexMap<GroupId, bool> = IndexMap::with_capacity(x.len());

    match mode {
        RoundingMode::Threshold { .. } => {
            let threshold = mode.threshold().unwrap_or(f64::INFINITY);
            info!("Threshold: {}", threshold);
            for (&g, &val) in x {
                decided.insert(g, g != UNGROUPED && val >= threshold);
            }
        }
        RoundingMode::FixedBudget { budget } => {
            let mut ranked: Vec<(GroupId, f64)> = x
                .iter()
                .filter(|(&g, _)| g != UNGROUPED)
                .map(|(&g, &v)| (g, v))
                .collect();
            // Descending value, ascending group id on ties
            ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
            let chosen: Vec<GroupId> = ranked.iter().take(budget).map(|(g, _)| *g).collect();
            for &g in x.keys() {
                decided.insert(g, chosen.contains(&g));
            }
            info!("Fixed budget: top {} of {} groups", chosen.len(), ranked.len());
        }
    }

    let audit: Vec<AuditRow> = x
        .iter()
        .filter(|(&g, _)| g != UNGROUPED)
        .map(|(&g, &val)| AuditRow { group: g, intervene: decided[&g], val })
        .collect();
    info!("X rounded to 1: {}", audit.iter().filter(|r| r.intervene).count());

    (decided, audit)
}

/// Round a complete fractional solution.
pub fn round_solution(solution: &FractionalSolution, mode: RoundingMode) -> RoundedSolution {
    let (x, audit) = round_groups(&solution.x, mode);
    let y = solution.y.iter().map(|(&k, &v)| (k, v >= MIDPOINT)).collect();
    let z = solution.z.iter().map(|(&k, &v)| (k, v >= MIDPOINT)).collect();

    RoundedSolution {
        x,
        y,
        z,
        audit,
        threshold: mode.threshold(),
    }
}
