use crate::builder::{BuiltModel, ModelBuilder};
use crate::rounding::{round_solution, RoundedSolution, RoundingMode};
use crate::solver::{LpSolver, SolverConfig};
use crate::ModelError;
use groupint_core::{AuditRow, Cascade, GroupHierarchy, GroupId, Time};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which rounding the run applies
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundingStrategy {
    /// Calibrate the threshold with GM instead of the group count
    pub use_gm: bool,
    /// Select exactly `budget` groups instead of thresholding
    pub fixed_budget: bool,
}

impl Default for RoundingStrategy {
    fn default() -> Self {
        Self { use_gm: true, fixed_budget: false }
    }
}

/// Parameters of a single (budget, intervention time) run
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunParams {
    pub budget: u32,
    pub intervention_time: Time,
    pub rounding: RoundingStrategy,
}

/// Everything a run reports once the model has been disposed
#[derive(Clone, Debug)]
pub struct RunOutcome {
    pub params: RunParams,
    /// `M`, cascades folded into the model
    pub num_cascades: usize,
    /// Intervenable groups seen in the ensemble
    pub num_groups: usize,
    /// Average infected entities with no intervention
    pub no_action: f64,
    pub lp_objective: f64,
    /// `Σ x` in the relaxation
    pub lp_budget: f64,
    /// Average infected entities under the rounded solution
    pub objective: f64,
    /// GM value used for rounding, if any
    pub gm: Option<usize>,
    pub threshold: Option<f64>,
    pub wall_time: Duration,
    pub work_units: f64,
    /// Groups rounded to 1
    pub selected: Vec<GroupId>,
    pub audit: Vec<AuditRow>,
}

/// Stream cascades into a fresh model builder.
pub fn build_model<I, E>(
    cascades: I,
    hierarchy: &GroupHierarchy,
    intervention_time: Time,
    budget: u32,
) -> Result<BuiltModel, ModelError>
where
    I: IntoIterator<Item = Result<Cascade, E>>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let mut builder = ModelBuilder::new(hierarchy, intervention_time);
    for cascade in cascades {
        // Each cascade is dropped as soon as it has been folded in
        let cascade = cascade.map_err(|e| ModelError::Input(e.into()))?;
        builder.add_cascade(&cascade);
    }
    builder.finish(budget)
}

/// Rounding mode implied by a strategy and the optional GM bound
pub fn rounding_mode(params: &RunParams, gm: Option<usize>, num_groups: usize) -> RoundingMode {
    if params.rounding.fixed_budget {
        return RoundingMode::FixedBudget { budget: params.budget as usize };
    }
    match (params.rounding.use_gm, gm) {
        (true, Some(gm)) => RoundingMode::Threshold { denom: gm },
        (true, None) => {
            warn!("GM rounding requested without a GM value; using the group count");
            RoundingMode::Threshold { denom: num_groups }
        }
        (false, _) => RoundingMode::Threshold { denom: num_groups },
    }
}

/// Solve a closed model and round it. The model is consumed and released
/// before returning.
pub fn solve_and_round<S>(
    model: BuiltModel,
    params: &RunParams,
    gm: Option<usize>,
    solver: &S,
    config: &SolverConfig,
) -> Result<(RunOutcome, RoundedSolution), ModelError>
where
    S: LpSolver + ?Sized,
{
    let solution = solver.solve(&model.program, config)?;
    let fractional = model.extract(&solution);
    let lp_budget = fractional.lp_budget();
    let num_groups = model.num_groups();
    info!("budget used by LP {:.6}", lp_budget);
    info!("# groups: {}", num_groups);

    let gm = if params.rounding.use_gm { gm } else { None };
    let mode = rounding_mode(params, gm, num_groups);
    let rounded = round_solution(&fractional, mode);
    let objective = rounded.infected_count() as f64 / model.num_cascades as f64;
    info!("Algorithm objective value {:.6}", objective);

    let outcome = RunOutcome {
        params: *params,
        num_cascades: model.num_cascades,
        num_groups,
        no_action: model.no_action,
        lp_objective: solution.objective,
        lp_budget,
        objective,
        gm,
        threshold: rounded.threshold,
        wall_time: solution.wall_time,
        work_units: solution.work_units,
        selected: rounded.selected_groups(),
        audit: rounded.audit.clone(),
    };
    drop(model);
    Ok((outcome, rounded))
}

/// Full pipeline for one (budget, intervention time): build, solve, round.
///
/// `gm` comes from an independent pass over the same log and is only
/// consulted when the strategy asks for GM rounding.
pub fn run_intervention<I, E, S>(
    cascades: I,
    hierarchy: &GroupHierarchy,
    params: &RunParams,
    gm: Option<usize>,
    solver: &S,
    config: &SolverConfig,
) -> Result<RunOutcome, ModelError>
where
    I: IntoIterator<Item = Result<Cascade, E>>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
    S: LpSolver + ?Sized,
{
    let model = build_model(cascades, hierarchy, params.intervention_time, params.budget)?;
    let (outcome, _) = solve_and_round(model, params, gm, solver, config)?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(fixed_budget: bool, use_gm: bool) -> RunParams {
        RunParams {
            budget: 2,
            intervention_time: 1,
            rounding: RoundingStrategy { use_gm, fixed_budget },
        }
    }

    #[test]
    fn test_rounding_mode_selection() {
        assert_eq!(
            rounding_mode(&params(true, true), Some(3), 10),
            RoundingMode::FixedBudget { budget: 2 }
        );
        assert_eq!(
            rounding_mode(&params(false, true), Some(3), 10),
            RoundingMode::Threshold { denom: 3 }
        );
        assert_eq!(
            rounding_mode(&params(false, true), None, 10),
            RoundingMode::Threshold { denom: 10 }
        );
        assert_eq!(
            rounding_mode(&params(false, false), Some(3), 10),
            RoundingMode::Threshold { denom: 10 }
        );
    }
}
