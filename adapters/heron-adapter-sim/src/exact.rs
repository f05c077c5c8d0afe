//! Exact reference energies by dense diagonalization.
//!
//! The Hamiltonian is expanded into its Hermitian matrix in the
//! computational basis and handed to nalgebra's symmetric eigensolver.

use nalgebra::DMatrix;
use num_complex::Complex64;

use heron_core::{Hamiltonian, VqeError, VqeResult};

use crate::statevector::PauliMasks;

/// Widest Hamiltonian accepted; the matrix is 2^n square.
pub const MAX_EXACT_QUBITS: usize = 8;

/// Dense matrix of `hamiltonian` in the computational basis.
pub fn hamiltonian_matrix(hamiltonian: &Hamiltonian) -> VqeResult<DMatrix<Complex64>> {
    let n = hamiltonian.num_qubits();
    if n > MAX_EXACT_QUBITS {
        return Err(VqeError::InvalidConfig(format!(
            "exact diagonalization supports at most {MAX_EXACT_QUBITS} qubits, got {n}"
        )));
    }

    let dim = 1 << n;
    let mut matrix = DMatrix::<Complex64>::zeros(dim, dim);
    for term in hamiltonian {
        let masks = PauliMasks::new(&term.pauli);
        for i in 0..dim {
            matrix[(i ^ masks.x, i)] += masks.phase(i) * term.coefficient;
        }
    }
    Ok(matrix)
}

/// All eigenvalues of `hamiltonian`, ascending.
pub fn eigenvalues(hamiltonian: &Hamiltonian) -> VqeResult<Vec<f64>> {
    let eigen = hamiltonian_matrix(hamiltonian)?.symmetric_eigen();
    let mut values: Vec<f64> = eigen.eigenvalues.iter().copied().collect();
    values.sort_by(f64::total_cmp);
    Ok(values)
}

/// Smallest eigenvalue of `hamiltonian`.
pub fn ground_state_energy(hamiltonian: &Hamiltonian) -> VqeResult<f64> {
    eigenvalues(hamiltonian)?
        .first()
        .copied()
        .ok_or_else(|| VqeError::MalformedHamiltonian("empty spectrum".into()))
}
