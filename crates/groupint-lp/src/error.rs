use thiserror::Error;

/// Failure inside the LP solver adapter. Always fatal for the run.
#[derive(Debug, Error)]
pub enum SolveError {
    #[error("solver did not reach an optimal solution: {0}")]
    NotOptimal(String),
    #[error("solver returned {got} values for {expected} variables")]
    ValueCountMismatch { expected: usize, got: usize },
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("no cascades were read; the ensemble objective is undefined")]
    EmptyEnsemble,
    #[error("failed to read cascades: {0}")]
    Input(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error(transparent)]
    Solve(#[from] SolveError),
}
