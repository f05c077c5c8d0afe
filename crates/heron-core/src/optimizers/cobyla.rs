//! COBYLA (Constrained Optimization BY Linear Approximation) optimizer.
//!
//! Unconstrained variant of Powell's method: a linear model is interpolated
//! through `n + 1` simplex vertices, a step of length `rho` is taken down its
//! gradient, and `rho` shrinks whenever the model stops producing progress.
//! This is a derivative-free algorithm suited to variational quantum
//! algorithms where gradients are expensive.
//!
//! The search stops once `2 · rho · √n` drops below the tolerance, which
//! keeps the returned point within the tolerance of a quadratic minimum.

use async_trait::async_trait;
use nalgebra::{DMatrix, DVector};
use tracing::debug;

use super::{EvaluationBudget, Objective, OptimizationResult, Optimizer, Termination, rank};
use crate::error::{VqeError, VqeResult};
use crate::params::ParameterVector;

/// A simplex is rebuilt when a vertex drifts farther than this many radii
/// from the best one.
const STALE_FACTOR: f64 = 2.0;

/// Trust region reduction factor.
const SHRINK: f64 = 0.5;

/// Relative pivot threshold below which a model system is treated as singular.
const PIVOT_EPS: f64 = 1e-12;

#[derive(Debug, Clone)]
struct Vertex {
    x: ParameterVector,
    f: f64,
}

/// COBYLA optimizer configuration.
#[derive(Debug, Clone)]
pub struct Cobyla {
    /// Maximum number of objective evaluations.
    pub max_evaluations: usize,
    /// Distance to the minimum accepted as converged.
    pub tolerance: f64,
    /// Initial trust region radius.
    pub rhobeg: f64,
}

impl Default for Cobyla {
    fn default() -> Self {
        Self {
            max_evaluations: 1000,
            tolerance: 1e-6,
            rhobeg: 1.0,
        }
    }
}

impl Cobyla {
    /// Create a new COBYLA optimizer with default settings.
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

    /// Set initial trust region radius.
    pub fn with_rhobeg(mut self, rhobeg: f64) -> Self {
        self.rhobeg = rhobeg;
        self
    }

    /// Reject settings the algorithm cannot run with.
    pub fn validate(&self) -> VqeResult<()> {
        if self.max_evaluations == 0 {
            return Err(VqeError::InvalidConfig(
                "max_evaluations must be positive".into(),
            ));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(VqeError::InvalidConfig(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if !(self.rhobeg.is_finite() && self.rhobeg > 0.0) {
            return Err(VqeError::InvalidConfig(format!(
                "rhobeg must be positive, got {}",
                self.rhobeg
            )));
        }
        Ok(())
    }

    /// Evaluate the axis vertices `center + rho * e_i`.
    async fn build_simplex(
        &self,
        budget: &mut EvaluationBudget<'_>,
        center: Vertex,
        rho: f64,
    ) -> VqeResult<Option<Vec<Vertex>>> {
        let n = center.x.len();
        let mut simplex = Vec::with_capacity(n + 1);
        simplex.push(center);

        for i in 0..n {
            let mut x = simplex[0].x.to_vec();
            x[i] += rho;
            let x = ParameterVector::new(x);
            let Some(f) = budget.evaluate(&x).await? else {
                return Ok(None);
            };
            simplex.push(Vertex { x, f });
        }
        Ok(Some(simplex))
    }
}

/// Solve `a · x = b` through an LU factorization with partial pivoting.
///
/// Returns `None` for singular, nearly singular or non-finite systems.
fn solve(a: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    let scale = a.amax();
    if !scale.is_finite() || scale == 0.0 {
        return None;
    }
    let lu = a.clone().lu();
    if lu.u().diagonal().iter().any(|d| d.abs() <= PIVOT_EPS * scale) {
        return None;
    }
    lu.solve(b).filter(|x| x.iter().all(|v| v.is_finite()))
}

/// Linear interpolation through the simplex, anchored at the best vertex.
struct LinearModel {
    /// Simplex indices of the non-best vertices, row order of `offsets`.
    others: Vec<usize>,
    /// Row `k` is `x_i - x_best` for vertex `others[k]`.
    offsets: DMatrix<f64>,
    gradient: Option<DVector<f64>>,
    max_offset: f64,
}

impl LinearModel {
    fn fit(simplex: &[Vertex], best: usize, rho: f64) -> Self {
        let base = &simplex[best];
        // Non-finite vertices enter the model as worse than the worst finite one.
        let worst_finite = simplex
            .iter()
            .map(|v| v.f)
            .filter(|f| f.is_finite())
            .fold(f64::NEG_INFINITY, f64::max);

        let others: Vec<usize> = (0..simplex.len()).filter(|&i| i != best).collect();
        let offsets = DMatrix::from_fn(others.len(), base.x.len(), |row, col| {
            simplex[others[row]].x[col] - base.x[col]
        });
        let rise = DVector::from_iterator(
            others.len(),
            others.iter().map(|&i| {
                let f = simplex[i].f;
                let f = if f.is_finite() { f } else { worst_finite + rho };
                f - base.f
            }),
        );

        let gradient = solve(&offsets, &rise);
        let max_offset = offsets
            .row_iter()
            .map(|row| row.norm())
            .fold(0.0, f64::max);

        Self {
            others,
            offsets,
            gradient,
            max_offset,
        }
    }

    /// Steepest-descent step of length `rho`, if the model has a gradient.
    fn trust_region_step(&self, rho: f64) -> Option<DVector<f64>> {
        let gradient = self.gradient.as_ref()?;
        let length = gradient.norm();
        if length == 0.0 || !length.is_finite() {
            return None;
        }
        Some(gradient * (-rho / length))
    }

    fn is_stale(&self, rho: f64) -> bool {
        self.max_offset > STALE_FACTOR * rho
    }

    /// Pick the vertex whose replacement by `best + step` keeps the simplex
    /// best conditioned.
    fn replacement(
        &self,
        simplex: &[Vertex],
        best: usize,
        step: &DVector<f64>,
        rho: f64,
    ) -> usize {
        // Barycentric weights of the trial point relative to the simplex.
        let lambda = solve(&self.offsets.transpose(), step);

        let mut scores: Vec<(usize, f64)> = self
            .others
            .iter()
            .enumerate()
            .map(|(row, &i)| {
                if !simplex[i].f.is_finite() {
                    return (i, f64::INFINITY);
                }
                let weight = lambda.as_ref().map_or(1.0, |l| l[row].abs());
                let distance = self.offsets.row(row).norm() / rho;
                (i, weight * distance.max(1.0).powi(2))
            })
            .collect();
        let best_weight = lambda
            .as_ref()
            .map_or(0.0, |l| (1.0 - l.sum()).abs());
        scores.push((best, best_weight));

        scores
            .into_iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map_or(best, |(i, _)| i)
    }
}

fn best_vertex(simplex: &[Vertex]) -> usize {
    simplex
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| rank(a.f).total_cmp(&rank(b.f)))
        .map_or(0, |(i, _)| i)
}

#[async_trait]
impl Optimizer for Cobyla {
    fn name(&self) -> &'static str {
        "cobyla"
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

        let mut budget = EvaluationBudget::new(objective, self.max_evaluations);
        let stop_radius = self.tolerance / (2.0 * (initial.len() as f64).sqrt());
        let mut rho = self.rhobeg;
        let mut iterations = 0;

        let Some(f0) = budget.evaluate(&initial).await? else {
            return budget.finish(iterations, Termination::MaxIterReached);
        };
        let start = Vertex { x: initial, f: f0 };
        let Some(mut simplex) = self.build_simplex(&mut budget, start, rho).await? else {
            return budget.finish(iterations, Termination::MaxIterReached);
        };

        loop {
            iterations += 1;
            let best = best_vertex(&simplex);
            if !simplex[best].f.is_finite() {
                return Err(VqeError::ObjectiveAlwaysInvalid {
                    evaluations: budget.evaluations(),
                });
            }

            let model = LinearModel::fit(&simplex, best, rho);
            if let Some(step) = model.trust_region_step(rho) {
                let trial: ParameterVector = simplex[best]
                    .x
                    .iter()
                    .zip(step.iter())
                    .map(|(x, s)| x + s)
                    .collect();
                let Some(f_trial) = budget.evaluate(&trial).await? else {
                    return budget.finish(iterations, Termination::MaxIterReached);
                };
                if f_trial < simplex[best].f {
                    let replaced = model.replacement(&simplex, best, &step, rho);
                    simplex[replaced] = Vertex {
                        x: trial,
                        f: f_trial,
                    };
                    continue;
                }
            }

            // No progress at this radius: refresh a stale simplex first,
            // otherwise shrink.
            if !model.is_stale(rho) {
                rho *= SHRINK;
                if rho < stop_radius {
                    debug!(
                        iterations,
                        evaluations = budget.evaluations(),
                        value = simplex[best].f,
                        "COBYLA converged"
                    );
                    return budget.finish(iterations, Termination::Converged);
                }
                debug!(rho, value = simplex[best].f, "trust region reduced");
            }

            let center = simplex.swap_remove(best);
            match self.build_simplex(&mut budget, center, rho).await? {
                Some(rebuilt) => simplex = rebuilt,
                None => return budget.finish(iterations, Termination::MaxIterReached),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use crate::backend::BackendError;
    use crate::optimizers::{FnObjective, from_fn};

    async fn minimize_fn<F>(cobyla: &Cobyla, f: F, x0: Vec<f64>) -> VqeResult<OptimizationResult>
    where
        F: FnMut(&[f64]) -> f64 + Send,
    {
        let mut objective = from_fn(f);
        cobyla
            .minimize(&mut objective, ParameterVector::new(x0))
            .await
    }

    #[test]
    fn test_solve_needs_pivoting() {
        let a = DMatrix::from_row_slice(2, 2, &[0.0, 2.0, 3.0, 1.0]);
        let x = solve(&a, &DVector::from_vec(vec![4.0, 5.0])).unwrap();
        assert_abs_diff_eq!(x[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(x[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_solve_singular() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        assert!(solve(&a, &DVector::from_vec(vec![1.0, 2.0])).is_none());
        let nearly = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 1.0, 2.0 + 1e-14]);
        assert!(solve(&nearly, &DVector::from_vec(vec![1.0, 2.0])).is_none());
        assert!(solve(&DMatrix::zeros(1, 1), &DVector::from_vec(vec![1.0])).is_none());
    }

    #[tokio::test]
    async fn test_cobyla_simple() {
        // Minimize (x-1)^2 + (y-2)^2
        let result = minimize_fn(
            &Cobyla::new(),
            |p| (p[0] - 1.0).powi(2) + (p[1] - 2.0).powi(2),
            vec![0.0, 0.0],
        )
        .await
        .unwrap();

        assert_eq!(result.termination, Termination::Converged);
        assert!(result.optimal_value < 1e-9);
        assert!((result.optimal_params[0] - 1.0).abs() < 1e-5);
        assert!((result.optimal_params[1] - 2.0).abs() < 1e-5);
        assert!(result.evaluations <= 1000);
    }

    #[tokio::test]
    async fn test_cobyla_five_dimensions() {
        let target = [0.5, -1.5, 2.0, 0.25, -0.75];
        let result = minimize_fn(
            &Cobyla::new(),
            move |p| p.iter().zip(&target).map(|(x, t)| (x - t).powi(2)).sum(),
            vec![0.0; 5],
        )
        .await
        .unwrap();

        assert!(result.converged());
        for (x, t) in result.optimal_params.iter().zip(&target) {
            assert!((x - t).abs() <= 1e-6, "{x} vs {t}");
        }
    }

    #[tokio::test]
    async fn test_twelve_parameters_within_tolerance() {
        let target: Vec<f64> = (0..12).map(|i| 2.0 * (0.7 * i as f64).sin()).collect();
        for sign in [1.0, -1.0] {
            let start: Vec<f64> = target
                .iter()
                .enumerate()
                .map(|(i, t)| t + 3.0 * sign * if i % 2 == 0 { 1.0 } else { -0.6 })
                .collect();
            let t = target.clone();
            let result = minimize_fn(
                &Cobyla::new(),
                move |p| p.iter().zip(&t).map(|(x, t)| (x - t).powi(2)).sum(),
                start,
            )
            .await
            .unwrap();

            assert_eq!(result.termination, Termination::Converged);
            assert!(result.evaluations <= 1000);
            let error = result
                .optimal_params
                .iter()
                .zip(&target)
                .map(|(x, t)| (x - t).abs())
                .fold(0.0, f64::max);
            assert!(error <= 1e-6, "max error {error:e}");
        }
    }

    #[tokio::test]
    async fn test_cobyla_rosenbrock() {
        // Rosenbrock function (minimum at (1, 1))
        let result = minimize_fn(
            &Cobyla::new().with_max_evaluations(2000),
            |p| (1.0 - p[0]).powi(2) + 100.0 * (p[1] - p[0].powi(2)).powi(2),
            vec![0.0, 0.0],
        )
        .await
        .unwrap();

        // Rosenbrock is hard, just check we improved
        assert!(result.optimal_value < 1.0);
        assert!(result.evaluations <= 2000);
    }

    #[tokio::test]
    async fn test_budget_is_respected() {
        let mut calls = 0usize;
        let result = minimize_fn(
            &Cobyla::new().with_max_evaluations(30),
            |p| {
                calls += 1;
                (p[0] - 1.0).powi(2) + (p[1] - 2.0).powi(2)
            },
            vec![0.0, 0.0],
        )
        .await
        .unwrap();

        assert_eq!(result.termination, Termination::MaxIterReached);
        assert_eq!(result.evaluations, 30);
        assert_eq!(calls, 30);
        assert!(result.optimal_value < 5.0);
    }

    #[tokio::test]
    async fn test_history_is_decreasing() {
        let result = minimize_fn(
            &Cobyla::new(),
            |p| p[0].powi(2) + 3.0 * p[1].powi(2),
            vec![2.0, -1.0],
        )
        .await
        .unwrap();

        assert_eq!(result.history.first(), Some(&7.0));
        assert!(result.history.windows(2).all(|w| w[1] < w[0]));
        assert_eq!(result.history.last(), Some(&result.optimal_value));
    }

    #[tokio::test]
    async fn test_non_finite_region_is_avoided() {
        let result = minimize_fn(
            &Cobyla::new(),
            |p| {
                if p[0] > 0.5 {
                    f64::NAN
                } else {
                    (p[0] - 0.2).powi(2) + (p[1] + 0.3).powi(2)
                }
            },
            vec![0.0, 0.0],
        )
        .await
        .unwrap();

        assert!(result.optimal_value.is_finite());
        assert!((result.optimal_params[0] - 0.2).abs() < 1e-4);
        assert!((result.optimal_params[1] + 0.3).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_always_non_finite_fails() {
        let err = minimize_fn(&Cobyla::new(), |_| f64::NAN, vec![0.0, 0.0])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VqeError::ObjectiveAlwaysInvalid { evaluations: 3 }
        ));
    }

    #[tokio::test]
    async fn test_objective_error_propagates() {
        let mut calls = 0;
        let mut objective = FnObjective::new(|p: &[f64]| {
            calls += 1;
            if calls > 4 {
                Err(VqeError::from(BackendError::BackendUnavailable(
                    "connection reset".into(),
                )))
            } else {
                Ok(p[0].powi(2))
            }
        });

        let err = Cobyla::new()
            .minimize(&mut objective, ParameterVector::new(vec![1.0, 1.0]))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "BackendUnavailable");
    }

    #[tokio::test]
    async fn test_invalid_settings() {
        let err = minimize_fn(&Cobyla::new().with_tolerance(0.0), |p| p[0], vec![0.0])
            .await
            .unwrap_err();
        assert!(matches!(err, VqeError::InvalidConfig(_)));

        let err = minimize_fn(&Cobyla::new(), |_| 0.0, vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, VqeError::InvalidConfig(_)));
    }
}
