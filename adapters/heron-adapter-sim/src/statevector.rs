//! Statevector simulation engine.
//!
//! Basis index bit `q` is qubit `q`, matching the Pauli label convention
//! where the rightmost character acts on qubit 0.

use std::f64::consts::FRAC_1_SQRT_2;

use num_complex::Complex64;
use rand::Rng;

use heron_core::{Gate, Pauli, PauliString};

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);
const I: Complex64 = Complex64::new(0.0, 1.0);

/// 2×2 unitary, row-major.
type Matrix2 = [[Complex64; 2]; 2];

/// A statevector representing a quantum state.
#[derive(Debug, Clone)]
pub struct Statevector {
    /// The state amplitudes (2^n complex numbers).
    amplitudes: Vec<Complex64>,
    /// Number of qubits.
    num_qubits: usize,
}

/// Bit masks describing how a Pauli string acts on basis states:
/// P|i⟩ = i^y · (-1)^popcount(i & z) · |i ^ x⟩.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PauliMasks {
    pub x: usize,
    pub z: usize,
    pub y_count: u32,
}

impl PauliMasks {
    pub(crate) fn new(pauli: &PauliString) -> Self {
        let mut masks = Self {
            x: 0,
            z: 0,
            y_count: 0,
        };
        for (qubit, op) in pauli.support() {
            let bit = 1 << qubit;
            match op {
                Pauli::X => masks.x |= bit,
                Pauli::Z => masks.z |= bit,
                Pauli::Y => {
                    masks.x |= bit;
                    masks.z |= bit;
                    masks.y_count += 1;
                }
                Pauli::I => {}
            }
        }
        masks
    }

    /// Phase picked up by basis state `i`.
    pub(crate) fn phase(&self, i: usize) -> Complex64 {
        let sign = if (i & self.z).count_ones() % 2 == 0 { 1.0 } else { -1.0 };
        I.powu(self.y_count) * sign
    }
}

impl Statevector {
    /// Create a new statevector initialized to |0...0⟩.
    pub fn new(num_qubits: usize) -> Self {
        let mut amplitudes = vec![ZERO; 1 << num_qubits];
        amplitudes[0] = ONE;
        Self {
            amplitudes,
            num_qubits,
        }
    }

    /// Get the number of qubits.
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    pub fn amplitudes(&self) -> &[Complex64] {
        &self.amplitudes
    }

    /// Apply a bound ansatz gate.
    pub fn apply(&mut self, gate: &Gate) {
        match *gate {
            Gate::Rx { qubit, theta } => self.apply_rx(qubit, theta),
            Gate::Ry { qubit, theta } => self.apply_ry(qubit, theta),
            Gate::Rz { qubit, theta } => self.apply_rz(qubit, theta),
            Gate::Cz { control, target } => self.apply_cz(control, target),
            Gate::Cx { control, target } => self.apply_cx(control, target),
        }
    }

    // =========================================================================
    // Single-qubit gates
    // =========================================================================

    fn apply_matrix(&mut self, qubit: usize, m: &Matrix2) {
        let mask = 1 << qubit;
        for i in 0..self.amplitudes.len() {
            if i & mask == 0 {
                let j = i | mask;
                let a = self.amplitudes[i];
                let b = self.amplitudes[j];
                self.amplitudes[i] = m[0][0] * a + m[0][1] * b;
                self.amplitudes[j] = m[1][0] * a + m[1][1] * b;
            }
        }
    }

    pub fn apply_rx(&mut self, qubit: usize, theta: f64) {
        let c = Complex64::new((theta / 2.0).cos(), 0.0);
        let s = Complex64::new(0.0, -(theta / 2.0).sin());
        self.apply_matrix(qubit, &[[c, s], [s, c]]);
    }

    pub fn apply_ry(&mut self, qubit: usize, theta: f64) {
        let c = Complex64::new((theta / 2.0).cos(), 0.0);
        let s = Complex64::new((theta / 2.0).sin(), 0.0);
        self.apply_matrix(qubit, &[[c, -s], [s, c]]);
    }

    pub fn apply_rz(&mut self, qubit: usize, theta: f64) {
        let phase_0 = Complex64::from_polar(1.0, -theta / 2.0);
        let phase_1 = Complex64::from_polar(1.0, theta / 2.0);
        self.apply_matrix(qubit, &[[phase_0, ZERO], [ZERO, phase_1]]);
    }

    pub fn apply_h(&mut self, qubit: usize) {
        let h = Complex64::new(FRAC_1_SQRT_2, 0.0);
        self.apply_matrix(qubit, &[[h, h], [h, -h]]);
    }

    /// S† = diag(1, -i).
    pub fn apply_sdg(&mut self, qubit: usize) {
        self.apply_matrix(qubit, &[[ONE, ZERO], [ZERO, -I]]);
    }

    // =========================================================================
    // Two-qubit gates
    // =========================================================================

    pub fn apply_cx(&mut self, control: usize, target: usize) {
        let ctrl_mask = 1 << control;
        let tgt_mask = 1 << target;
        for i in 0..self.amplitudes.len() {
            if (i & ctrl_mask != 0) && (i & tgt_mask == 0) {
                self.amplitudes.swap(i, i | tgt_mask);
            }
        }
    }

    pub fn apply_cz(&mut self, control: usize, target: usize) {
        let both = (1 << control) | (1 << target);
        for (i, amp) in self.amplitudes.iter_mut().enumerate() {
            if i & both == both {
                *amp = -*amp;
            }
        }
    }

    // =========================================================================
    // Measurement
    // =========================================================================

    /// Exact ⟨ψ|P|ψ⟩.
    pub fn expectation(&self, pauli: &PauliString) -> f64 {
        let masks = PauliMasks::new(pauli);
        self.amplitudes
            .iter()
            .enumerate()
            .map(|(i, amp)| (self.amplitudes[i ^ masks.x].conj() * masks.phase(i) * amp).re)
            .sum()
    }

    /// Rotate every non-identity qubit of `pauli` into the Z basis.
    pub fn rotate_to_z_basis(&mut self, pauli: &PauliString) {
        for (qubit, op) in pauli.support() {
            match op {
                Pauli::X => self.apply_h(qubit),
                Pauli::Y => {
                    self.apply_sdg(qubit);
                    self.apply_h(qubit);
                }
                Pauli::Z | Pauli::I => {}
            }
        }
    }

    /// Born-rule probability of each basis state.
    pub fn probabilities(&self) -> Vec<f64> {
        self.amplitudes.iter().map(Complex64::norm_sqr).collect()
    }

    /// Sample `shots` outcomes of a Z-basis measurement.
    ///
    /// Returns `None` if the state has no finite, positive norm.
    pub fn sample<R: Rng + ?Sized>(&self, shots: u32, rng: &mut R) -> Option<Vec<usize>> {
        let mut cumulative = Vec::with_capacity(self.amplitudes.len());
        let mut total = 0.0;
        for p in self.probabilities() {
            total += p;
            cumulative.push(total);
        }
        if !(total.is_finite() && total > 0.0) {
            return None;
        }

        let last = self.amplitudes.len() - 1;
        let outcomes = (0..shots)
            .map(|_| {
                let r = rng.gen_range(0.0..total);
                cumulative.partition_point(|&c| c <= r).min(last)
            })
            .collect();
        Some(outcomes)
    }
}
