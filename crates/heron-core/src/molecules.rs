//! Molecular Hamiltonians for VQE.
//!
//! These Hamiltonians are pre-computed qubit operators (parity mapping with
//! two-qubit reduction, STO-3G basis). Generating them is out of scope; they
//! ship as literal data.

use crate::error::VqeResult;
use crate::hamiltonian::Hamiltonian;

/// Exact electronic ground-state energy of [`h2_hamiltonian`] in Hartree.
pub const H2_EXACT_ENERGY: f64 = -1.857_275_030_202_38;

/// Pauli terms of the H2 operator at 0.735 Å.
pub const H2_TERMS: [(&str, f64); 5] = [
    ("II", -1.052_373_245_772_859),
    ("IZ", 0.397_937_424_843_180_45),
    ("ZI", -0.397_937_424_843_180_45),
    ("ZZ", -0.011_280_104_256_235_38),
    ("XX", 0.180_931_199_784_231_56),
];

/// H2 molecule Hamiltonian at 0.735 Å on two qubits.
///
/// Ground state energy: -1.857275 Hartree (electronic part, no nuclear
/// repulsion). The ground state lives in the odd-parity block spanned by
/// |01⟩ and |10⟩, mixed by the XX term.
pub fn h2_hamiltonian() -> VqeResult<Hamiltonian> {
    Hamiltonian::from_labels(H2_TERMS)
}

/// Look up a bundled molecule by name.
pub fn by_name(name: &str) -> Option<VqeResult<Hamiltonian>> {
    match name.to_lowercase().as_str() {
        "h2" => Some(h2_hamiltonian()),
        _ => None,
    }
}

/// Known exact ground-state energy for a bundled molecule.
pub fn exact_ground_state_energy(name: &str) -> Option<f64> {
    match name.to_lowercase().as_str() {
        "h2" => Some(H2_EXACT_ENERGY),
        _ => None,
    }
}
