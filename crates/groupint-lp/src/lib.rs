pub mod program;
pub mod builder;
pub mod solver;
pub mod rounding;
pub mod driver;
pub mod error;

pub use program::{LinearProgram, LinearExpr, LinearConstraint, Comparison, ConstraintKind, VarId, VarBounds};
pub use builder::{ModelBuilder, BuiltModel, FractionalSolution};
pub use solver::{LpSolver, MicroLpSolver, SolverConfig, Algorithm, LpSolution};
pub use rounding::{round_groups, round_solution, RoundingMode, RoundedSolution};
pub use driver::{build_model, run_intervention, solve_and_round, rounding_mode, RunParams, RunOutcome, RoundingStrategy};
pub use error::{ModelError, SolveError};
