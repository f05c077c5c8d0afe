//! Parameterized ansatz descriptors.
//!
//! An ansatz is a parameterized circuit family. The core never executes it;
//! backends receive the descriptor plus a [`ParameterVector`] and turn the
//! pair into a concrete gate list with [`TwoLocal::bind`].

use serde::{Deserialize, Serialize};

use crate::error::{VqeError, VqeResult};
use crate::params::ParameterVector;

/// Single-qubit rotation used in a rotation block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationGate {
    /// Rotation about X.
    Rx,
    /// Rotation about Y.
    Ry,
    /// Rotation about Z.
    Rz,
}

/// Two-qubit gate used in an entanglement block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntanglingGate {
    /// Controlled-Z.
    Cz,
    /// Controlled-X.
    Cx,
}

/// Which qubit pairs an entanglement block couples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Entanglement {
    /// Nearest neighbours: (0,1), (1,2), ...
    Linear,
    /// Every pair (i, j) with i < j.
    Full,
}

/// A bound gate, ready for a backend to apply.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "gate", rename_all = "lowercase")]
pub enum Gate {
    /// RX(theta) on `qubit`.
    Rx { qubit: usize, theta: f64 },
    /// RY(theta) on `qubit`.
    Ry { qubit: usize, theta: f64 },
    /// RZ(theta) on `qubit`.
    Rz { qubit: usize, theta: f64 },
    /// CZ between `control` and `target`.
    Cz { control: usize, target: usize },
    /// CX from `control` onto `target`.
    Cx { control: usize, target: usize },
}

impl Gate {
    fn rotation(kind: RotationGate, qubit: usize, theta: f64) -> Self {
        match kind {
            RotationGate::Rx => Gate::Rx { qubit, theta },
            RotationGate::Ry => Gate::Ry { qubit, theta },
            RotationGate::Rz => Gate::Rz { qubit, theta },
        }
    }

    fn entangler(kind: EntanglingGate, control: usize, target: usize) -> Self {
        match kind {
            EntanglingGate::Cz => Gate::Cz { control, target },
            EntanglingGate::Cx => Gate::Cx { control, target },
        }
    }
}

/// TwoLocal ansatz: `reps` repetitions of a rotation block followed by an
/// entanglement block.
///
/// Each rotation block applies every gate in `rotations` to every qubit,
/// consuming one parameter per gate. Parameters are consumed in order
/// repetition → qubit → rotation.
///
/// # Parameters needed
/// Total parameters = reps * rotations.len() * num_qubits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwoLocal {
    /// Number of qubits.
    pub num_qubits: usize,
    /// Number of rotation + entanglement repetitions.
    pub reps: usize,
    /// Rotation gates applied per qubit in each block.
    pub rotations: Vec<RotationGate>,
    /// Entangling gate.
    pub entangler: EntanglingGate,
    /// Entanglement topology.
    pub entanglement: Entanglement,
}

impl TwoLocal {
    /// Hardware-efficient default: RY+RZ rotations, linear CZ entanglement.
    pub fn new(num_qubits: usize, reps: usize) -> Self {
        Self {
            num_qubits,
            reps,
            rotations: vec![RotationGate::Ry, RotationGate::Rz],
            entangler: EntanglingGate::Cz,
            entanglement: Entanglement::Linear,
        }
    }

    /// Set the rotation block.
    pub fn with_rotations(mut self, rotations: impl Into<Vec<RotationGate>>) -> Self {
        self.rotations = rotations.into();
        self
    }

    /// Set the entangling gate.
    pub fn with_entangler(mut self, entangler: EntanglingGate) -> Self {
        self.entangler = entangler;
        self
    }

    /// Set the entanglement topology.
    pub fn with_entanglement(mut self, entanglement: Entanglement) -> Self {
        self.entanglement = entanglement;
        self
    }

    /// Number of free parameters.
    pub fn num_parameters(&self) -> usize {
        self.reps * self.rotations.len() * self.num_qubits
    }

    /// Check the descriptor describes a non-empty circuit.
    pub fn validate(&self) -> VqeResult<()> {
        if self.num_qubits == 0 {
            return Err(VqeError::InvalidConfig(
                "ansatz needs at least one qubit".into(),
            ));
        }
        if self.reps == 0 || self.rotations.is_empty() {
            return Err(VqeError::InvalidConfig(
                "ansatz needs at least one repetition and one rotation gate".into(),
            ));
        }
        Ok(())
    }

    /// Qubit pairs coupled by each entanglement block.
    pub fn entangling_pairs(&self) -> Vec<(usize, usize)> {
        match self.entanglement {
            Entanglement::Linear => (1..self.num_qubits).map(|q| (q - 1, q)).collect(),
            Entanglement::Full => (0..self.num_qubits)
                .flat_map(|i| ((i + 1)..self.num_qubits).map(move |j| (i, j)))
                .collect(),
        }
    }

    /// Bind `params` and expand the circuit into gates.
    pub fn bind(&self, params: &ParameterVector) -> VqeResult<Vec<Gate>> {
        let expected = self.num_parameters();
        if params.len() != expected {
            return Err(VqeError::DimensionMismatch {
                expected,
                actual: params.len(),
            });
        }

        let pairs = self.entangling_pairs();
        let mut gates = Vec::with_capacity(expected + self.reps * pairs.len());
        let mut theta = params.iter().copied();

        for _ in 0..self.reps {
            for qubit in 0..self.num_qubits {
                for &kind in &self.rotations {
                    // length checked above
                    let angle = theta.next().unwrap_or(f64::NAN);
                    gates.push(Gate::rotation(kind, qubit, angle));
                }
            }
            for &(control, target) in &pairs {
                gates.push(Gate::entangler(self.entangler, control, target));
            }
        }

        Ok(gates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_count() {
        // 3 reps * 2 rotations * 2 qubits
        assert_eq!(TwoLocal::new(2, 3).num_parameters(), 12);
        assert_eq!(
            TwoLocal::new(4, 2)
                .with_rotations([RotationGate::Ry])
                .num_parameters(),
            8
        );
    }

    #[test]
    fn test_bind_order() {
        let ansatz = TwoLocal::new(2, 1);
        let gates = ansatz
            .bind(&ParameterVector::new(vec![0.1, 0.2, 0.3, 0.4]))
            .unwrap();
        assert_eq!(
            gates,
            vec![
                Gate::Ry { qubit: 0, theta: 0.1 },
                Gate::Rz { qubit: 0, theta: 0.2 },
                Gate::Ry { qubit: 1, theta: 0.3 },
                Gate::Rz { qubit: 1, theta: 0.4 },
                Gate::Cz { control: 0, target: 1 },
            ]
        );
    }

    #[test]
    fn test_dimension_mismatch() {
        let ansatz = TwoLocal::new(2, 1).with_rotations([RotationGate::Ry]);
        assert_eq!(ansatz.num_parameters(), 2);
        let err = ansatz
            .bind(&ParameterVector::new(vec![0.0, 0.0, 0.0]))
            .unwrap_err();
        assert!(matches!(
            err,
            VqeError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_entangling_pairs() {
        let linear = TwoLocal::new(4, 1);
        assert_eq!(linear.entangling_pairs(), vec![(0, 1), (1, 2), (2, 3)]);
        let full = TwoLocal::new(3, 1).with_entanglement(Entanglement::Full);
        assert_eq!(full.entangling_pairs(), vec![(0, 1), (0, 2), (1, 2)]);
        assert!(TwoLocal::new(1, 1).entangling_pairs().is_empty());
    }

    #[test]
    fn test_validate() {
        assert!(TwoLocal::new(2, 3).validate().is_ok());
        assert!(TwoLocal::new(0, 3).validate().is_err());
        assert!(TwoLocal::new(2, 0).validate().is_err());
        assert!(TwoLocal::new(2, 1).with_rotations(Vec::new()).validate().is_err());
    }
}
