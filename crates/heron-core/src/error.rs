//! Error types for the core crate.

use thiserror::Error;

use crate::backend::BackendError;

/// Errors that can occur while building or running a variational loop.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VqeError {
    /// Hamiltonian input is invalid (empty, ragged labels, bad characters).
    #[error("Malformed Hamiltonian: {0}")]
    MalformedHamiltonian(String),

    /// Parameter vector length disagrees with the ansatz.
    #[error("Dimension mismatch: ansatz expects {expected} parameters, got {actual}")]
    DimensionMismatch {
        /// Free-parameter count of the ansatz.
        expected: usize,
        /// Length of the offending parameter vector.
        actual: usize,
    },

    /// The circuit evaluation backend failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Every point the optimizer evaluated produced a non-finite energy.
    #[error("Objective returned a non-finite value at all {evaluations} evaluated points")]
    ObjectiveAlwaysInvalid {
        /// Number of objective evaluations performed before giving up.
        evaluations: usize,
    },

    /// Configuration value rejected.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A concurrently spawned run panicked or was aborted.
    #[error("Run task failed: {0}")]
    TaskFailed(String),

    /// I/O error while reading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VqeError {
    /// Short machine-readable name of the failure, used in reports.
    pub fn reason(&self) -> &'static str {
        match self {
            VqeError::MalformedHamiltonian(_) => "MalformedHamiltonian",
            VqeError::DimensionMismatch { .. } => "DimensionMismatch",
            VqeError::Backend(BackendError::BackendUnavailable(_)) => "BackendUnavailable",
            VqeError::Backend(BackendError::InvalidCircuit(_)) => "InvalidCircuit",
            VqeError::Backend(_) => "BackendError",
            VqeError::ObjectiveAlwaysInvalid { .. } => "ObjectiveAlwaysInvalid",
            VqeError::InvalidConfig(_) => "InvalidConfig",
            VqeError::TaskFailed(_) => "TaskFailed",
            VqeError::Io(_) => "Io",
        }
    }
}

/// Result type for core operations.
pub type VqeResult<T> = Result<T, VqeError>;
