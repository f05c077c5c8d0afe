//! Energy evaluation: E(θ) = Σ c_i ⟨ψ(θ)|P_i|ψ(θ)⟩.

use std::sync::Arc;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::ansatz::TwoLocal;
use crate::backend::{Backend, BackendError};
use crate::error::{VqeError, VqeResult};
use crate::hamiltonian::{Hamiltonian, PauliString};
use crate::optimizers::Objective;
use crate::params::ParameterVector;

/// Energy estimate at one parameter point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationResult {
    /// Σ c_i ⟨P_i⟩, NaN if any term estimate was NaN.
    pub energy: f64,
    /// Σ c_i² Var(P_i), when every term was sampled.
    pub variance: Option<f64>,
    /// Total shots spent, when every term was sampled.
    pub shots: Option<u64>,
    /// ⟨P_i⟩ per merged Hamiltonian term, identity terms included.
    pub term_values: Vec<f64>,
}

/// Turns parameter vectors into energies through a [`Backend`].
///
/// Duplicate Pauli strings are merged once at construction, so each
/// distinct string is measured once per evaluation. Identity terms are
/// never sent to the backend: ⟨I⟩ = 1.
pub struct EnergyEvaluator {
    hamiltonian: Hamiltonian,
    ansatz: Arc<TwoLocal>,
    backend: Arc<dyn Backend>,
    /// Non-identity strings sent to the backend, in term order.
    observables: Vec<PauliString>,
    cache: Option<FxHashMap<Vec<u64>, EvaluationResult>>,
    backend_calls: usize,
}

impl EnergyEvaluator {
    /// Bind a Hamiltonian and ansatz to a backend.
    pub fn new(
        hamiltonian: &Hamiltonian,
        ansatz: Arc<TwoLocal>,
        backend: Arc<dyn Backend>,
    ) -> VqeResult<Self> {
        ansatz.validate()?;
        if ansatz.num_qubits != hamiltonian.num_qubits() {
            return Err(VqeError::InvalidConfig(format!(
                "ansatz acts on {} qubits but the Hamiltonian on {}",
                ansatz.num_qubits,
                hamiltonian.num_qubits()
            )));
        }

        let hamiltonian = hamiltonian.merged();
        let observables = hamiltonian
            .iter()
            .filter(|t| !t.pauli.is_identity())
            .map(|t| t.pauli.clone())
            .collect();

        Ok(Self {
            hamiltonian,
            ansatz,
            backend,
            observables,
            cache: None,
            backend_calls: 0,
        })
    }

    /// Reuse results for bit-identical parameter vectors.
    ///
    /// Only sound for deterministic backends.
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache = enabled.then(FxHashMap::default);
        self
    }

    /// Free parameters the ansatz expects.
    pub fn num_parameters(&self) -> usize {
        self.ansatz.num_parameters()
    }

    /// The merged Hamiltonian being evaluated.
    pub fn hamiltonian(&self) -> &Hamiltonian {
        &self.hamiltonian
    }

    /// Backend round-trips so far.
    pub fn backend_calls(&self) -> usize {
        self.backend_calls
    }

    /// Estimate the energy at `params`.
    #[instrument(skip_all, fields(backend = self.backend.name()))]
    pub async fn estimate_energy(
        &mut self,
        params: &ParameterVector,
    ) -> VqeResult<EvaluationResult> {
        let expected = self.num_parameters();
        if params.len() != expected {
            return Err(VqeError::DimensionMismatch {
                expected,
                actual: params.len(),
            });
        }

        if let Some(hit) = self.cache.as_ref().and_then(|c| c.get(&params.bits())) {
            debug!(energy = hit.energy, "cache hit");
            return Ok(hit.clone());
        }

        let estimates = if self.observables.is_empty() {
            Vec::new()
        } else {
            self.backend_calls += 1;
            self.backend
                .estimate(&self.ansatz, params, &self.observables)
                .await?
        };
        if estimates.len() != self.observables.len() {
            return Err(BackendError::Backend(format!(
                "returned {} estimates for {} observables",
                estimates.len(),
                self.observables.len()
            ))
            .into());
        }

        let mut estimates = estimates.into_iter();
        let mut energy = 0.0;
        let mut variance = Some(0.0);
        let mut shots = Some(0u64);
        let mut term_values = Vec::with_capacity(self.hamiltonian.num_terms());

        for term in &self.hamiltonian {
            if term.pauli.is_identity() {
                energy += term.coefficient;
                term_values.push(1.0);
                continue;
            }
            let Some(estimate) = estimates.next() else {
                break;
            };
            energy += term.coefficient * estimate.value;
            variance = variance
                .zip(estimate.variance)
                .map(|(acc, v)| acc + term.coefficient.powi(2) * v);
            shots = shots
                .zip(estimate.shots)
                .map(|(acc, s)| acc + u64::from(s));
            term_values.push(estimate.value);
        }
        if self.observables.is_empty() {
            variance = None;
            shots = None;
        }

        if energy.is_finite() {
            debug!(energy, "evaluated");
        } else {
            warn!(params = %params, "non-finite energy estimate");
        }
        let result = EvaluationResult {
            energy,
            variance,
            shots,
            term_values,
        };
        if let Some(cache) = self.cache.as_mut() {
            cache.insert(params.bits(), result.clone());
        }
        Ok(result)
    }
}

#[async_trait]
impl Objective for EnergyEvaluator {
    async fn evaluate(&mut self, params: &ParameterVector) -> VqeResult<f64> {
        Ok(self.estimate_energy(params).await?.energy)
    }
}
