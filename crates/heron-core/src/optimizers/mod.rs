//! Derivative-free optimizers.
//!
//! Optimizers drive an [`Objective`] from an initial [`ParameterVector`]
//! and return the best point they ever evaluated. They are oblivious to
//! quantum details: the objective may be an [`EnergyEvaluator`] or a plain
//! closure wrapped in [`FnObjective`].
//!
//! [`EnergyEvaluator`]: crate::evaluator::EnergyEvaluator

mod cobyla;
mod spsa;

pub use cobyla::Cobyla;
pub use spsa::Spsa;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{VqeError, VqeResult};
use crate::params::ParameterVector;

/// A scalar function to minimize.
///
/// Errors are fatal: the optimizer stops and propagates them. A non-finite
/// value is not an error; optimizers treat it as worse than any finite one.
#[async_trait]
pub trait Objective: Send {
    /// Evaluate the objective at `params`.
    async fn evaluate(&mut self, params: &ParameterVector) -> VqeResult<f64>;
}

/// Objective backed by a synchronous closure.
pub struct FnObjective<F> {
    f: F,
}

impl<F> FnObjective<F>
where
    F: FnMut(&[f64]) -> VqeResult<f64> + Send,
{
    /// Wrap a fallible closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

/// Wrap an infallible closure as an [`Objective`].
pub fn from_fn<G>(mut g: G) -> FnObjective<impl FnMut(&[f64]) -> VqeResult<f64> + Send>
where
    G: FnMut(&[f64]) -> f64 + Send,
{
    FnObjective::new(move |x: &[f64]| Ok(g(x)))
}

#[async_trait]
impl<F> Objective for FnObjective<F>
where
    F: FnMut(&[f64]) -> VqeResult<f64> + Send,
{
    async fn evaluate(&mut self, params: &ParameterVector) -> VqeResult<f64> {
        (self.f)(params.as_slice())
    }
}

/// Why an optimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Termination {
    /// Step size fell below tolerance.
    Converged,
    /// Evaluation budget exhausted first.
    MaxIterReached,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Converged => write!(f, "CONVERGED"),
            Termination::MaxIterReached => write!(f, "MAX_ITER_REACHED"),
        }
    }
}

/// Result of an optimization run.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationResult {
    /// Best parameters ever evaluated.
    pub optimal_params: ParameterVector,
    /// Objective value at `optimal_params`.
    pub optimal_value: f64,
    /// Optimizer iterations performed.
    pub iterations: usize,
    /// Objective evaluations performed.
    pub evaluations: usize,
    /// Why the optimizer stopped.
    pub termination: Termination,
    /// Best-so-far value after each improvement.
    pub history: Vec<f64>,
}

impl OptimizationResult {
    /// True if the optimizer met its tolerance.
    pub fn converged(&self) -> bool {
        self.termination == Termination::Converged
    }
}

/// A minimization strategy.
#[async_trait]
pub trait Optimizer: Send + Sync {
    /// Short name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Maximum number of objective evaluations.
    fn max_evaluations(&self) -> usize;

    /// Minimize `objective` starting from `initial`.
    ///
    /// Returns [`VqeError::ObjectiveAlwaysInvalid`] when no evaluated point
    /// produced a finite value, and propagates objective errors unchanged.
    async fn minimize(
        &self,
        objective: &mut dyn Objective,
        initial: ParameterVector,
    ) -> VqeResult<OptimizationResult>;
}

/// Counts evaluations against a budget and remembers the best point seen.
pub(crate) struct EvaluationBudget<'a> {
    objective: &'a mut dyn Objective,
    limit: usize,
    evaluations: usize,
    best: Option<(ParameterVector, f64)>,
    history: Vec<f64>,
}

impl<'a> EvaluationBudget<'a> {
    pub(crate) fn new(objective: &'a mut dyn Objective, limit: usize) -> Self {
        Self {
            objective,
            limit,
            evaluations: 0,
            best: None,
            history: Vec::new(),
        }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.evaluations)
    }

    pub(crate) fn evaluations(&self) -> usize {
        self.evaluations
    }

    /// Evaluate `params`, or `None` once the budget is spent.
    pub(crate) async fn evaluate(&mut self, params: &ParameterVector) -> VqeResult<Option<f64>> {
        if self.evaluations >= self.limit {
            return Ok(None);
        }
        let value = self.objective.evaluate(params).await?;
        self.evaluations += 1;

        if !value.is_finite() {
            trace!(evaluation = self.evaluations, "non-finite objective value");
        } else if self.best.as_ref().is_none_or(|(_, best)| value < *best) {
            self.best = Some((params.clone(), value));
            self.history.push(value);
        }
        Ok(Some(value))
    }

    pub(crate) fn finish(
        self,
        iterations: usize,
        termination: Termination,
    ) -> VqeResult<OptimizationResult> {
        let Some((optimal_params, optimal_value)) = self.best else {
            return Err(VqeError::ObjectiveAlwaysInvalid {
                evaluations: self.evaluations,
            });
        };
        Ok(OptimizationResult {
            optimal_params,
            optimal_value,
            iterations,
            evaluations: self.evaluations,
            termination,
            history: self.history,
        })
    }
}

/// Order values with every non-finite value ranked last.
pub(crate) fn rank(value: f64) -> f64 {
    if value.is_finite() { value } else { f64::INFINITY }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_budget_tracks_best_and_stops() {
        let mut objective = from_fn(|x| x[0]);
        let mut budget = EvaluationBudget::new(&mut objective, 3);

        for v in [3.0, 1.0, 2.0] {
            let got = budget.evaluate(&ParameterVector::new(vec![v])).await.unwrap();
            assert_eq!(got, Some(v));
        }
        assert_eq!(budget.remaining(), 0);
        assert_eq!(
            budget.evaluate(&ParameterVector::new(vec![0.0])).await.unwrap(),
            None
        );

        let result = budget.finish(1, Termination::MaxIterReached).unwrap();
        assert_eq!(result.optimal_value, 1.0);
        assert_eq!(result.optimal_params.as_slice(), &[1.0]);
        assert_eq!(result.evaluations, 3);
        assert_eq!(result.history, vec![3.0, 1.0]);
    }

    #[tokio::test]
    async fn test_budget_without_finite_value_fails() {
        let mut objective = from_fn(|_| f64::NAN);
        let mut budget = EvaluationBudget::new(&mut objective, 5);
        budget.evaluate(&ParameterVector::zeros(1)).await.unwrap();

        let err = budget.finish(0, Termination::Converged).unwrap_err();
        assert!(matches!(
            err,
            VqeError::ObjectiveAlwaysInvalid { evaluations: 1 }
        ));
    }

    #[test]
    fn test_termination_display() {
        assert_eq!(Termination::Converged.to_string(), "CONVERGED");
        assert_eq!(
            serde_json::to_string(&Termination::MaxIterReached).unwrap(),
            "\"MAX_ITER_REACHED\""
        );
    }
}
