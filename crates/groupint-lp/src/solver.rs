use crate::program::{Comparison, LinearExpr, LinearProgram};
use crate::SolveError;
use good_lp::{default_solver, variable, Expression, ProblemVariables, Solution, SolverModel, Variable};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Optimization method requested from the backend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    /// Deterministic dual simplex
    DualSimplex,
    /// Several methods raced on multiple threads
    Concurrent,
}

/// Solver settings, owned by the caller
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    pub threads: usize,
    pub algorithm: Algorithm,
}

impl SolverConfig {
    /// One thread selects dual simplex, more select the concurrent method
    pub fn with_threads(threads: usize) -> Self {
        let threads = threads.max(1);
        let algorithm = if threads == 1 {
            Algorithm::DualSimplex
        } else {
            Algorithm::Concurrent
        };
        Self { threads, algorithm }
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self::with_threads(1)
    }
}

/// Continuous optimum returned by a solver
#[derive(Clone, Debug)]
pub struct LpSolution {
    /// Indexed by `VarId`
    pub values: Vec<f64>,
    pub objective: f64,
    pub wall_time: Duration,
    /// Backend-independent effort measure: constraint-matrix nonzeros
    /// handed to the solver
    pub work_units: f64,
}

/// LP solver adapter.
///
/// A call blocks until the backend finishes; there are no partial results.
/// Anything short of optimality is an error.
pub trait LpSolver {
    fn name(&self) -> &'static str;

    fn solve(&self, program: &LinearProgram, config: &SolverConfig) -> Result<LpSolution, SolveError>;
}

/// Pure-Rust simplex backend through `good_lp`
#[derive(Clone, Copy, Debug, Default)]
pub struct MicroLpSolver;

fn to_expression(expr: &LinearExpr, handles: &[Variable]) -> Expression {
    let mut out = Expression::with_capacity(expr.len());
    for &(var, coef) in &expr.terms {
        out.add_mul(coef, handles[var.0]);
    }
    out
}

impl LpSolver for MicroLpSolver {
    fn name(&self) -> &'static str {
        "microlp"
    }

    fn solve(&self, program: &LinearProgram, config: &SolverConfig) -> Result<LpSolution, SolveError> {
        if config.threads > 1 || config.algorithm != Algorithm::DualSimplex {
            debug!(
                "{} is single-threaded; ignoring threads={} algorithm={:?}",
                self.name(),
                config.threads,
                config.algorithm
            );
        }
        let start = Instant::now();

        let mut vars = ProblemVariables::new();
        let handles: Vec<Variable> = program
            .variables()
            .iter()
            .map(|b| vars.add(variable().min(b.lower).max(b.upper)))
            .collect();

        let objective = to_expression(program.objective(), &handles);
        let mut problem = vars.minimise(objective).using(default_solver);
        for c in program.constraints() {
            let expr = to_expression(&c.expr, &handles);
            let constraint = match c.cmp {
                Comparison::Le => expr.leq(c.rhs),
                Comparison::Ge => expr.geq(c.rhs),
                Comparison::Eq => expr.eq(c.rhs),
            };
            problem = problem.with(constraint);
        }

        let solution = problem
            .solve()
            .map_err(|e| SolveError::NotOptimal(e.to_string()))?;
        let values: Vec<f64> = handles.iter().map(|&v| solution.value(v)).collect();
        if values.len() != program.num_variables() {
            return Err(SolveError::ValueCountMismatch {
                expected: program.num_variables(),
                got: values.len(),
            });
        }

        let objective = program.objective().eval(&values);
        let wall_time = start.elapsed();
        info!(
            "{}: optimal objective {:.6} in {:.3}s",
            self.name(),
            objective,
            wall_time.as_secs_f64()
        );

        Ok(LpSolution {
            values,
            objective,
            wall_time,
            work_units: program.nonzeros() as f64,
        })
    }
}
