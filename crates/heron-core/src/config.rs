//! Run configuration.
//!
//! Loaded from a YAML file or built in code; every field has a default, so
//! an empty file describes the H2 ground-state search:
//!
//! ```yaml
//! hamiltonian:
//!   - { label: II, coefficient: -1.052373245772859 }
//!   - { label: XX, coefficient: 0.18093119978423156 }
//! ansatz: { reps: 3, rotations: [ry, rz], entangler: cz, entanglement: linear }
//! optimizer: { kind: cobyla, max_evaluations: 1000, tolerance: 1.0e-6, seed: 42 }
//! backend: { shots: 4096, seed: 7 }
//! starts: 4
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ansatz::{EntanglingGate, Entanglement, RotationGate, TwoLocal};
use crate::error::{VqeError, VqeResult};
use crate::hamiltonian::Hamiltonian;
use crate::molecules::H2_TERMS;
use crate::optimizers::{Cobyla, Optimizer, Spsa};

/// Complete run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VqeConfig {
    /// Pauli terms of the problem Hamiltonian.
    #[serde(default = "default_hamiltonian")]
    pub hamiltonian: Vec<TermConfig>,

    /// Ansatz shape.
    #[serde(default)]
    pub ansatz: AnsatzConfig,

    /// Optimizer settings.
    #[serde(default)]
    pub optimizer: OptimizerConfig,

    /// Simulator settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Number of independent seeded starts.
    #[serde(default = "default_starts")]
    pub starts: usize,
}

/// One `(label, coefficient)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TermConfig {
    pub label: String,
    pub coefficient: f64,
}

/// TwoLocal ansatz shape; the qubit count comes from the Hamiltonian.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnsatzConfig {
    #[serde(default = "default_reps")]
    pub reps: usize,

    #[serde(default = "default_rotations")]
    pub rotations: Vec<RotationGate>,

    #[serde(default = "default_entangler")]
    pub entangler: EntanglingGate,

    #[serde(default = "default_entanglement")]
    pub entanglement: Entanglement,
}

/// Which optimizer drives the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    Cobyla,
    Spsa,
}

/// Optimizer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptimizerConfig {
    #[serde(default = "default_kind")]
    pub kind: OptimizerKind,

    /// Objective evaluation budget.
    #[serde(default = "default_max_evaluations")]
    pub max_evaluations: usize,

    /// Convergence tolerance.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Initial trust region radius (COBYLA only).
    #[serde(default = "default_rhobeg")]
    pub rhobeg: f64,

    /// Seed of the first start point; start `i` uses `seed + i`.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

/// Statevector simulator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Shots per term; absent means exact expectation values.
    #[serde(default)]
    pub shots: Option<u32>,

    /// Seed of the shot sampler.
    #[serde(default = "default_backend_seed")]
    pub seed: u64,
}

fn default_hamiltonian() -> Vec<TermConfig> {
    H2_TERMS
        .iter()
        .map(|&(label, coefficient)| TermConfig {
            label: label.to_string(),
            coefficient,
        })
        .collect()
}

fn default_starts() -> usize {
    1
}

fn default_reps() -> usize {
    3
}

fn default_rotations() -> Vec<RotationGate> {
    vec![RotationGate::Ry, RotationGate::Rz]
}

fn default_entangler() -> EntanglingGate {
    EntanglingGate::Cz
}

fn default_entanglement() -> Entanglement {
    Entanglement::Linear
}

fn default_kind() -> OptimizerKind {
    OptimizerKind::Cobyla
}

fn default_max_evaluations() -> usize {
    1000
}

fn default_tolerance() -> f64 {
    1e-6
}

fn default_rhobeg() -> f64 {
    1.0
}

fn default_seed() -> u64 {
    42
}

fn default_backend_seed() -> u64 {
    7
}

impl Default for VqeConfig {
    fn default() -> Self {
        Self {
            hamiltonian: default_hamiltonian(),
            ansatz: AnsatzConfig::default(),
            optimizer: OptimizerConfig::default(),
            backend: BackendConfig::default(),
            starts: default_starts(),
        }
    }
}

impl Default for AnsatzConfig {
    fn default() -> Self {
        Self {
            reps: default_reps(),
            rotations: default_rotations(),
            entangler: default_entangler(),
            entanglement: default_entanglement(),
        }
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            max_evaluations: default_max_evaluations(),
            tolerance: default_tolerance(),
            rhobeg: default_rhobeg(),
            seed: default_seed(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            shots: None,
            seed: default_backend_seed(),
        }
    }
}

impl VqeConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> VqeResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate YAML.
    pub fn from_yaml(contents: &str) -> VqeResult<Self> {
        // An empty document means "all defaults".
        let config: VqeConfig = if contents.trim().is_empty() {
            VqeConfig::default()
        } else {
            serde_yaml_ng::from_str(contents).map_err(|e| VqeError::InvalidConfig(e.to_string()))?
        };
        config.validate()?;
        Ok(config)
    }

    /// Serialize back to YAML.
    pub fn to_yaml(&self) -> VqeResult<String> {
        serde_yaml_ng::to_string(self).map_err(|e| VqeError::InvalidConfig(e.to_string()))
    }

    /// Validate configuration values.
    pub fn validate(&self) -> VqeResult<()> {
        let hamiltonian = self.build_hamiltonian()?;
        self.build_ansatz(hamiltonian.num_qubits()).validate()?;
        self.build_optimizer()?;

        if self.starts == 0 {
            return Err(VqeError::InvalidConfig(
                "starts must be greater than 0".into(),
            ));
        }
        if self.backend.shots == Some(0) {
            return Err(VqeError::InvalidConfig(
                "shots must be greater than 0; omit the field for exact evaluation".into(),
            ));
        }
        Ok(())
    }

    /// Build the problem Hamiltonian.
    pub fn build_hamiltonian(&self) -> VqeResult<Hamiltonian> {
        Hamiltonian::from_labels(
            self.hamiltonian
                .iter()
                .map(|t| (t.label.as_str(), t.coefficient)),
        )
    }

    /// Build the ansatz for `num_qubits` qubits.
    pub fn build_ansatz(&self, num_qubits: usize) -> TwoLocal {
        TwoLocal::new(num_qubits, self.ansatz.reps)
            .with_rotations(self.ansatz.rotations.clone())
            .with_entangler(self.ansatz.entangler)
            .with_entanglement(self.ansatz.entanglement)
    }

    /// Build the configured optimizer.
    pub fn build_optimizer(&self) -> VqeResult<Arc<dyn Optimizer>> {
        let o = &self.optimizer;
        match o.kind {
            OptimizerKind::Cobyla => {
                let cobyla = Cobyla::new()
                    .with_max_evaluations(o.max_evaluations)
                    .with_tolerance(o.tolerance)
                    .with_rhobeg(o.rhobeg);
                cobyla.validate()?;
                Ok(Arc::new(cobyla))
            }
            OptimizerKind::Spsa => {
                let spsa = Spsa::new()
                    .with_max_evaluations(o.max_evaluations)
                    .with_tolerance(o.tolerance)
                    .with_seed(o.seed);
                spsa.validate()?;
                Ok(Arc::new(spsa))
            }
        }
    }

    /// Start-point seeds, one per start.
    pub fn seeds(&self) -> Vec<u64> {
        (0..self.starts as u64)
            .map(|i| self.optimizer.seed.wrapping_add(i))
            .collect()
    }
}
