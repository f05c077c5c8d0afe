//! Pauli Hamiltonian representation.
//!
//! A Hamiltonian is a weighted sum of Pauli strings:
//!
//!   H = Σ_k  c_k · P_k
//!
//! where each P_k is a tensor product of single-qubit Pauli operators
//! (I, X, Y, Z) and c_k ∈ ℝ.
//!
//! Labels follow the Qiskit `SparsePauliOp` convention: the rightmost
//! character acts on qubit 0, so `"IZ"` is Z on qubit 0.
//!
//! # Example
//!
//! ```rust
//! use heron_core::hamiltonian::Hamiltonian;
//!
//! let h = Hamiltonian::from_labels([("II", 1.0), ("ZZ", -0.5), ("II", 2.0)]).unwrap();
//! assert_eq!(h.num_qubits(), 2);
//! assert_eq!(h.num_terms(), 3);
//! assert_eq!(h.merged().num_terms(), 2);
//! assert_eq!(h.effective_coefficient("II"), Some(3.0));
//! ```

use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{VqeError, VqeResult};

/// A single Pauli operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pauli {
    /// Identity operator.
    I,
    /// Pauli-X operator.
    X,
    /// Pauli-Y operator.
    Y,
    /// Pauli-Z operator.
    Z,
}

impl Pauli {
    /// Parse a single label character.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'I' => Some(Pauli::I),
            'X' => Some(Pauli::X),
            'Y' => Some(Pauli::Y),
            'Z' => Some(Pauli::Z),
            _ => None,
        }
    }

    /// Get the name of this Pauli operator.
    pub fn name(&self) -> &'static str {
        match self {
            Pauli::I => "I",
            Pauli::X => "X",
            Pauli::Y => "Y",
            Pauli::Z => "Z",
        }
    }
}

impl fmt::Display for Pauli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A dense tensor product of Pauli operators, one per qubit.
///
/// Index `q` of the inner vector is the operator acting on qubit `q`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PauliString {
    ops: Vec<Pauli>,
}

impl PauliString {
    /// Parse a label such as `"XZ"` (rightmost character is qubit 0).
    pub fn parse(label: &str) -> VqeResult<Self> {
        if label.is_empty() {
            return Err(VqeError::MalformedHamiltonian(
                "Pauli label must not be empty".into(),
            ));
        }
        let ops = label
            .chars()
            .rev()
            .map(|c| {
                Pauli::from_char(c).ok_or_else(|| {
                    VqeError::MalformedHamiltonian(format!(
                        "invalid character '{c}' in label '{label}' (expected I, X, Y or Z)"
                    ))
                })
            })
            .collect::<VqeResult<Vec<_>>>()?;
        Ok(Self { ops })
    }

    /// Number of qubits this string spans.
    pub fn num_qubits(&self) -> usize {
        self.ops.len()
    }

    /// The operator acting on `qubit`.
    pub fn get(&self, qubit: usize) -> Pauli {
        self.ops.get(qubit).copied().unwrap_or(Pauli::I)
    }

    /// Non-identity operators as `(qubit, pauli)`, ascending by qubit.
    pub fn support(&self) -> impl Iterator<Item = (usize, Pauli)> + '_ {
        self.ops
            .iter()
            .enumerate()
            .filter(|(_, p)| **p != Pauli::I)
            .map(|(q, p)| (q, *p))
    }

    /// True if every operator is the identity.
    pub fn is_identity(&self) -> bool {
        self.ops.iter().all(|p| *p == Pauli::I)
    }

    /// Render back to a label (rightmost character is qubit 0).
    pub fn label(&self) -> String {
        self.ops.iter().rev().map(Pauli::name).collect()
    }
}

impl fmt::Display for PauliString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A single weighted term: `coefficient · pauli`.
#[derive(Debug, Clone, PartialEq)]
pub struct PauliTerm {
    /// Real coefficient.
    pub coefficient: f64,
    /// The Pauli string.
    pub pauli: PauliString,
}

impl PauliTerm {
    /// Create a term from a label and coefficient.
    pub fn new(label: &str, coefficient: f64) -> VqeResult<Self> {
        if !coefficient.is_finite() {
            return Err(VqeError::MalformedHamiltonian(format!(
                "coefficient of '{label}' is not finite ({coefficient})"
            )));
        }
        Ok(Self {
            coefficient,
            pauli: PauliString::parse(label)?,
        })
    }

    /// Label of this term.
    pub fn label(&self) -> String {
        self.pauli.label()
    }
}

impl fmt::Display for PauliTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.coefficient >= 0.0 {
            write!(f, "+{:.6} {}", self.coefficient, self.pauli)
        } else {
            write!(f, "{:.6} {}", self.coefficient, self.pauli)
        }
    }
}

/// A Hamiltonian represented as an ordered sum of Pauli terms.
///
/// Immutable after construction; every term spans the same number of qubits.
#[derive(Debug, Clone, PartialEq)]
pub struct Hamiltonian {
    terms: Vec<PauliTerm>,
    num_qubits: usize,
}

impl Hamiltonian {
    /// Create a Hamiltonian from `(label, coefficient)` pairs.
    pub fn from_labels<I, S>(pairs: I) -> VqeResult<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let terms = pairs
            .into_iter()
            .map(|(label, coefficient)| PauliTerm::new(label.as_ref(), coefficient))
            .collect::<VqeResult<Vec<_>>>()?;
        Self::new(terms)
    }

    /// Create a Hamiltonian from already-parsed terms.
    pub fn new(terms: Vec<PauliTerm>) -> VqeResult<Self> {
        let Some(first) = terms.first() else {
            return Err(VqeError::MalformedHamiltonian(
                "Hamiltonian must contain at least one term".into(),
            ));
        };
        let num_qubits = first.pauli.num_qubits();
        if let Some(bad) = terms.iter().find(|t| t.pauli.num_qubits() != num_qubits) {
            return Err(VqeError::MalformedHamiltonian(format!(
                "label '{}' spans {} qubits but '{}' spans {}",
                bad.label(),
                bad.pauli.num_qubits(),
                first.label(),
                num_qubits
            )));
        }
        Ok(Self { terms, num_qubits })
    }

    /// Number of qubits (label length).
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// Number of terms as given, duplicates included.
    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    /// All terms in construction order.
    pub fn terms(&self) -> &[PauliTerm] {
        &self.terms
    }

    /// Iterate over the terms.
    pub fn iter(&self) -> std::slice::Iter<'_, PauliTerm> {
        self.terms.iter()
    }

    /// Return a new Hamiltonian with duplicate labels summed.
    ///
    /// Terms keep the order of their first occurrence.
    pub fn merged(&self) -> Hamiltonian {
        let mut index: FxHashMap<&PauliString, usize> = FxHashMap::default();
        let mut merged: Vec<PauliTerm> = Vec::with_capacity(self.terms.len());

        for term in &self.terms {
            match index.get(&term.pauli) {
                Some(&i) => merged[i].coefficient += term.coefficient,
                None => {
                    index.insert(&term.pauli, merged.len());
                    merged.push(term.clone());
                }
            }
        }

        Hamiltonian {
            terms: merged,
            num_qubits: self.num_qubits,
        }
    }

    /// Summed coefficient of every term carrying `label`, if any.
    pub fn effective_coefficient(&self, label: &str) -> Option<f64> {
        let pauli = PauliString::parse(label).ok()?;
        let mut matching = self.terms.iter().filter(|t| t.pauli == pauli).peekable();
        matching.peek()?;
        Some(matching.map(|t| t.coefficient).sum())
    }

    /// Summed coefficient of the all-identity terms.
    pub fn identity_coefficient(&self) -> f64 {
        self.terms
            .iter()
            .filter(|t| t.pauli.is_identity())
            .map(|t| t.coefficient)
            .sum()
    }
}

impl<'a> IntoIterator for &'a Hamiltonian {
    type Item = &'a PauliTerm;
    type IntoIter = std::slice::Iter<'a, PauliTerm>;

    fn into_iter(self) -> Self::IntoIter {
        self.terms.iter()
    }
}

impl fmt::Display for Hamiltonian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Hamiltonian ({} terms, {} qubits):",
            self.num_terms(),
            self.num_qubits()
        )?;
        for term in &self.terms {
            writeln!(f, "  {term}")?;
        }
        Ok(())
    }
}
