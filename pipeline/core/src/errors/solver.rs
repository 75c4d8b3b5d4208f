use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolverError {
    #[error("the program has no feasible assignment")]
    Infeasible,

    #[error("solve exceeded its time budget of {0:?}")]
    Timeout(std::time::Duration),

    #[error("invalid program: {0}")]
    InvalidProgram(String),
}

pub type SolverResult<T> = std::result::Result<T, SolverError>;
