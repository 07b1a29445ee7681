use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    /// Misuse detected eagerly at setup or assembly time. Unrecoverable.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("boundary {boundary_id} is not reflective, no reflected direction for incident direction {direction}")]
    InvalidBoundaryQuery { boundary_id: u32, direction: usize },

    #[error("linear solve failed for component {component}: {reason}")]
    SolverFailure { component: usize, reason: String },

    #[error("multigroup iteration did not converge after {sweeps} sweeps (error {error:.3e})")]
    MultigroupNonConvergence { sweeps: usize, error: f64 },

    #[error("power iteration did not converge after {iterations} iterations (err_k {err_k:.3e}, err_phi {err_phi:.3e}, k {keff:.6})")]
    EigenNonConvergence {
        iterations: usize,
        err_k: f64,
        err_phi: f64,
        keff: f64,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type TransportResult<T> = Result<T, TransportError>;

impl TransportError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        TransportError::Configuration(message.into())
    }
}
