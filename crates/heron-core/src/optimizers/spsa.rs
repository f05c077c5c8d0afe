//! SPSA (Simultaneous Perturbation Stochastic Approximation) optimizer.
//!
//! This is a gradient-free stochastic optimization algorithm that estimates
//! gradients using random perturbations: two evaluations per iteration,
//! independent of dimension. It tolerates shot noise better than COBYLA.

use std::collections::VecDeque;

use async_trait::async_trait;
use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::{EvaluationBudget, Objective, OptimizationResult, Optimizer, Termination};
use crate::error::{VqeError, VqeResult};
use crate::params::ParameterVector;

/// Number of recent steps averaged for the convergence test.
const STEP_WINDOW: usize = 10;

/// SPSA optimizer configuration.
#[derive(Debug, Clone)]
pub struct Spsa {
    /// Maximum number of objective evaluations.
    pub max_evaluations: usize,
    /// Mean step length over the last iterations that counts as converged.
    pub tolerance: f64,
    /// Initial step size for the update.
    pub a: f64,
    /// Perturbation size.
    pub c: f64,
    /// Stability constant added to the iteration count.
    pub stability: f64,
    /// Learning rate decay parameter.
    pub alpha: f64,
    /// Perturbation decay parameter.
    pub gamma: f64,
    /// Seed of the perturbation sequence.
    pub seed: u64,
}

impl Default for Spsa {
    fn default() -> Self {
        Self {
            max_evaluations: 1000,
            tolerance: 1e-6,
            a: 0.2,
            c: 0.1,
            stability: 10.0,
            alpha: 0.602,
            gamma: 0.101,
            seed: 0,
        }
    }
}

impl Spsa {
    /// Create a new SPSA optimizer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the evaluation budget.
    pub fn with_max_evaluations(mut self, max_evaluations: usize) -> Self {
        self.max_evaluations = max_evaluations;
        self
    }

    /// Set convergence tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set gain parameters `a` (update) and `c` (perturbation).
    pub fn with_gains(mut self, a: f64, c: f64) -> Self {
        self.a = a;
        self.c = c;
        self
    }

    /// Set the perturbation seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Reject settings the algorithm cannot run with.
    pub fn validate(&self) -> VqeResult<()> {
        if self.max_evaluations < 3 {
            return Err(VqeError::InvalidConfig(
                "SPSA needs at least 3 evaluations".into(),
            ));
        }
        for (name, value) in [("tolerance", self.tolerance), ("a", self.a), ("c", self.c)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(VqeError::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Optimizer for Spsa {
    fn name(&self) -> &'static str {
        "spsa"
    }

    fn max_evaluations(&self) -> usize {
        self.max_evaluations
    }

    async fn minimize(
        &self,
        objective: &mut dyn Objective,
        initial: ParameterVector,
    ) -> VqeResult<OptimizationResult> {
        self.validate()?;
        if initial.is_empty() {
            return Err(VqeError::InvalidConfig(
                "cannot optimize an empty parameter vector".into(),
            ));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut budget = EvaluationBudget::new(objective, self.max_evaluations);
        let mut steps: VecDeque<f64> = VecDeque::with_capacity(STEP_WINDOW);
        let mut x = initial;
        let mut k = 0usize;

        budget.evaluate(&x).await?;

        while budget.remaining() >= 2 {
            let a_k = self.a / (k as f64 + 1.0 + self.stability).powf(self.alpha);
            let c_k = self.c / (k as f64 + 1.0).powf(self.gamma);
            k += 1;

            // Random perturbation direction
            let delta: Vec<f64> = (0..x.len())
                .map(|_| if rng.gen_bool(0.5) { 1.0 } else { -1.0 })
                .collect();
            let x_plus: ParameterVector =
                x.iter().zip(&delta).map(|(xi, di)| xi + c_k * di).collect();
            let x_minus: ParameterVector =
                x.iter().zip(&delta).map(|(xi, di)| xi - c_k * di).collect();

            let (Some(f_plus), Some(f_minus)) =
                (budget.evaluate(&x_plus).await?, budget.evaluate(&x_minus).await?)
            else {
                break;
            };
            if !(f_plus.is_finite() && f_minus.is_finite()) {
                continue;
            }

            let step = DVector::from_iterator(
                delta.len(),
                delta
                    .iter()
                    .map(|di| a_k * (f_plus - f_minus) / (2.0 * c_k * di)),
            );
            x = x.iter().zip(step.iter()).map(|(xi, si)| xi - si).collect();

            if steps.len() == STEP_WINDOW {
                steps.pop_front();
            }
            steps.push_back(step.norm());
            if steps.len() == STEP_WINDOW
                && steps.iter().sum::<f64>() / (STEP_WINDOW as f64) < self.tolerance
            {
                debug!(
                    iterations = k,
                    evaluations = budget.evaluations(),
                    "SPSA converged"
                );
                return budget.finish(k, Termination::Converged);
            }
        }

        budget.finish(k, Termination::MaxIterReached)
    }
}
