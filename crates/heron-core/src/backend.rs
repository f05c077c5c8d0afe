//! Circuit evaluation backend seam.
//!
//! The core never simulates or executes circuits. It hands a [`Backend`]
//! the ansatz descriptor, a bound [`ParameterVector`] and the Pauli strings
//! to measure, and receives one [`TermEstimate`] per string.
//!
//! ```text
//!   EnergyEvaluator ──→ Backend::estimate(ansatz, params, observables)
//!                         │
//!                         └──→ Vec<TermEstimate>   (or BackendError)
//! ```
//!
//! ## Contract
//!
//! - `estimate()` MUST return exactly one estimate per observable, in order.
//! - A failed measurement MAY be reported as a NaN `value`; the core
//!   propagates it instead of substituting a number.
//! - Transport or availability problems MUST surface as
//!   [`BackendError::BackendUnavailable`]; circuits the backend cannot run as
//!   [`BackendError::InvalidCircuit`]. Retrying is the adapter's business,
//!   never the optimizer's.
//! - Each call is independent; adapters may be stochastic (shot noise).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ansatz::TwoLocal;
use crate::hamiltonian::PauliString;
use crate::params::ParameterVector;

/// Errors reported by a circuit evaluation backend.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum BackendError {
    /// Backend is not reachable or not accepting work.
    #[error("Backend not available: {0}")]
    BackendUnavailable(String),

    /// Backend refused the circuit or observables.
    #[error("Invalid circuit: {0}")]
    InvalidCircuit(String),

    /// Generic backend error.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Estimated expectation value of one Pauli string.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TermEstimate {
    /// Estimated ⟨ψ|P|ψ⟩.
    pub value: f64,
    /// Variance of the estimate, when the backend samples.
    pub variance: Option<f64>,
    /// Shots spent on this estimate, when the backend samples.
    pub shots: Option<u32>,
}

impl TermEstimate {
    /// A noiseless estimate.
    pub fn exact(value: f64) -> Self {
        Self {
            value,
            variance: None,
            shots: None,
        }
    }

    /// A sampled estimate.
    pub fn sampled(value: f64, variance: f64, shots: u32) -> Self {
        Self {
            value,
            variance: Some(variance),
            shots: Some(shots),
        }
    }
}

/// Trait for circuit evaluation backends.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Get the name of this backend.
    fn name(&self) -> &str;

    /// Estimate ⟨P⟩ for every observable under the bound ansatz state.
    async fn estimate(
        &self,
        ansatz: &TwoLocal,
        params: &ParameterVector,
        observables: &[PauliString],
    ) -> BackendResult<Vec<TermEstimate>>;
}
