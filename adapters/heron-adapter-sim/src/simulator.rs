//! Statevector backend implementation.

use std::sync::Mutex;
use std::time::Instant;

use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, instrument};

use heron_core::{
    Backend, BackendError, BackendResult, ParameterVector, PauliString, TermEstimate, TwoLocal,
};

use crate::statevector::{PauliMasks, Statevector};

/// Default qubit limit; 2^20 amplitudes is 16 MiB.
pub const DEFAULT_MAX_QUBITS: usize = 20;

/// How term expectations are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimationMode {
    /// Exact ⟨ψ|P|ψ⟩ from the amplitudes.
    Exact,
    /// Parity averaged over this many sampled shots per term.
    Shots(u32),
}

/// Local statevector backend.
///
/// Prepares the ansatz state from |0...0⟩ on every call and measures each
/// observable either exactly or by sampling in its eigenbasis.
pub struct StatevectorBackend {
    name: String,
    mode: EstimationMode,
    max_qubits: usize,
    /// Shot sampler; only touched in [`EstimationMode::Shots`].
    rng: Mutex<StdRng>,
}

impl StatevectorBackend {
    /// Noiseless backend.
    pub fn exact() -> Self {
        Self {
            name: "statevector".into(),
            mode: EstimationMode::Exact,
            max_qubits: DEFAULT_MAX_QUBITS,
            rng: Mutex::new(StdRng::seed_from_u64(0)),
        }
    }

    /// Sampling backend with `shots` per term, seeded with `seed`.
    ///
    /// A zero shot count is rejected by every [`Backend::estimate`] call.
    pub fn with_shots(shots: u32, seed: u64) -> Self {
        Self {
            name: "statevector-shots".into(),
            mode: EstimationMode::Shots(shots),
            max_qubits: DEFAULT_MAX_QUBITS,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Set the widest circuit the backend accepts.
    pub fn with_max_qubits(mut self, max_qubits: usize) -> Self {
        self.max_qubits = max_qubits;
        self
    }

    /// Bind the ansatz and simulate it.
    fn prepare(&self, ansatz: &TwoLocal, params: &ParameterVector) -> BackendResult<Statevector> {
        if ansatz.num_qubits > self.max_qubits {
            return Err(BackendError::InvalidCircuit(format!(
                "Circuit has {} qubits but simulator only supports {}",
                ansatz.num_qubits, self.max_qubits
            )));
        }
        let gates = ansatz
            .bind(params)
            .map_err(|e| BackendError::InvalidCircuit(e.to_string()))?;

        let mut sv = Statevector::new(ansatz.num_qubits);
        for gate in &gates {
            sv.apply(gate);
        }
        debug!("Applied {} gates", gates.len());
        Ok(sv)
    }

    /// Average parity over sampled shots in the eigenbasis of `pauli`.
    fn sample_term(&self, sv: &Statevector, pauli: &PauliString, shots: u32) -> TermEstimate {
        let masks = PauliMasks::new(pauli);
        let support = masks.x | masks.z;

        let mut rotated = sv.clone();
        rotated.rotate_to_z_basis(pauli);

        let outcomes = {
            let mut rng = self
                .rng
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            rotated.sample(shots, &mut *rng)
        };
        let Some(outcomes) = outcomes else {
            return TermEstimate::sampled(f64::NAN, f64::NAN, shots);
        };

        let odd = outcomes
            .iter()
            .filter(|&&o| (o & support).count_ones() % 2 == 1)
            .count();
        let n = f64::from(shots);
        let mean = (n - 2.0 * odd as f64) / n;
        // Variance of the sample mean of a ±1 variable.
        TermEstimate::sampled(mean, (1.0 - mean * mean) / n, shots)
    }
}

impl Default for StatevectorBackend {
    fn default() -> Self {
        Self::exact()
    }
}

#[async_trait]
impl Backend for StatevectorBackend {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip_all, fields(qubits = ansatz.num_qubits, terms = observables.len()))]
    async fn estimate(
        &self,
        ansatz: &TwoLocal,
        params: &ParameterVector,
        observables: &[PauliString],
    ) -> BackendResult<Vec<TermEstimate>> {
        let start = Instant::now();

        if self.mode == EstimationMode::Shots(0) {
            return Err(BackendError::InvalidCircuit(
                "shot count must be positive".into(),
            ));
        }
        if let Some(bad) = observables
            .iter()
            .find(|p| p.num_qubits() != ansatz.num_qubits)
        {
            return Err(BackendError::InvalidCircuit(format!(
                "observable {} spans {} qubits but the circuit has {}",
                bad,
                bad.num_qubits(),
                ansatz.num_qubits
            )));
        }

        let sv = self.prepare(ansatz, params)?;
        let estimates = observables
            .iter()
            .map(|pauli| {
                if pauli.is_identity() {
                    return TermEstimate::exact(1.0);
                }
                match self.mode {
                    EstimationMode::Exact => TermEstimate::exact(sv.expectation(pauli)),
                    EstimationMode::Shots(shots) => self.sample_term(&sv, pauli, shots),
                }
            })
            .collect();

        debug!("Estimation completed in {:?}", start.elapsed());
        Ok(estimates)
    }
}
