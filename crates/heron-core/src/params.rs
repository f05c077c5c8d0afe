//! Parameter vectors proposed by the optimizer.

use std::fmt;
use std::ops::Deref;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// An ordered set of circuit parameters.
///
/// Every trial point is a fresh value; optimizers never mutate a vector
/// after handing it to the objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterVector(Vec<f64>);

impl ParameterVector {
    /// Wrap raw values.
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    /// Vector of `len` zeros.
    pub fn zeros(len: usize) -> Self {
        Self(vec![0.0; len])
    }

    /// Independent uniform samples in `[0, 1)` drawn from `seed`.
    ///
    /// The same `(len, seed)` always yields the same vector.
    pub fn random_uniform(len: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self((0..len).map(|_| rng.gen_range(0.0..1.0)).collect())
    }

    /// Borrow the values.
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Exact bit patterns, usable as a hash key.
    pub fn bits(&self) -> Vec<u64> {
        self.0.iter().map(|v| v.to_bits()).collect()
    }
}

impl Deref for ParameterVector {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.0
    }
}

impl From<Vec<f64>> for ParameterVector {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

impl FromIterator<f64> for ParameterVector {
    fn from_iter<T: IntoIterator<Item = f64>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for ParameterVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v:.6}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_uniform_is_reproducible() {
        let a = ParameterVector::random_uniform(12, 7);
        let b = ParameterVector::random_uniform(12, 7);
        assert_eq!(a, b);
        assert_eq!(a.len(), 12);
        assert!(a.iter().all(|v| (0.0..1.0).contains(v)));

        let c = ParameterVector::random_uniform(12, 8);
        assert_ne!(a, c);
    }

    #[test]
    fn test_display() {
        let p = ParameterVector::new(vec![0.5, -1.0]);
        assert_eq!(p.to_string(), "[0.500000, -1.000000]");
    }
}
