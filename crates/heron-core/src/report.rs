//! Run outcomes, reports and observers.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::VqeError;
use crate::optimizers::{OptimizationResult, Termination};
use crate::params::ParameterVector;

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Trust region fell below tolerance.
    Converged,
    /// Evaluation budget exhausted.
    MaxIterReached,
    /// The run stopped on an error.
    Failed,
}

impl RunStatus {
    /// Process exit code for this status.
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Converged | RunStatus::MaxIterReached => 0,
            RunStatus::Failed => 2,
        }
    }
}

impl From<Termination> for RunStatus {
    fn from(termination: Termination) -> Self {
        match termination {
            Termination::Converged => RunStatus::Converged,
            Termination::MaxIterReached => RunStatus::MaxIterReached,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Converged => write!(f, "CONVERGED"),
            RunStatus::MaxIterReached => write!(f, "MAX_ITER_REACHED"),
            RunStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// What a run produced.
#[derive(Debug)]
pub enum RunOutcome {
    /// The optimizer terminated normally.
    Completed(OptimizationResult),
    /// The run stopped on an error.
    Failed(VqeError),
}

/// Everything known about one finished run.
#[derive(Debug)]
pub struct RunReport {
    /// Unique id of the run.
    pub run_id: Uuid,
    /// Seed of the random start point, if one was drawn.
    pub seed: Option<u64>,
    /// Start point handed to the optimizer.
    pub initial_params: ParameterVector,
    /// Result or failure.
    pub outcome: RunOutcome,
    /// Backend round-trips made by the run.
    pub backend_calls: usize,
    /// Wall-clock duration.
    pub elapsed: Duration,
}

impl RunReport {
    /// Terminal state.
    pub fn status(&self) -> RunStatus {
        match &self.outcome {
            RunOutcome::Completed(result) => result.termination.into(),
            RunOutcome::Failed(_) => RunStatus::Failed,
        }
    }

    /// Optimizer result, absent for failed runs.
    pub fn result(&self) -> Option<&OptimizationResult> {
        match &self.outcome {
            RunOutcome::Completed(result) => Some(result),
            RunOutcome::Failed(_) => None,
        }
    }

    /// Best energy found. Failed runs never expose one.
    pub fn energy(&self) -> Option<f64> {
        self.result().map(|r| r.optimal_value)
    }

    /// Failure cause.
    pub fn error(&self) -> Option<&VqeError> {
        match &self.outcome {
            RunOutcome::Completed(_) => None,
            RunOutcome::Failed(err) => Some(err),
        }
    }

    /// True unless the run failed.
    pub fn is_success(&self) -> bool {
        self.status() != RunStatus::Failed
    }

    /// Process exit code for this run.
    pub fn exit_code(&self) -> i32 {
        self.status().exit_code()
    }

    /// Serializable view of the report.
    pub fn summary(&self) -> RunSummary {
        let result = self.result();
        RunSummary {
            run_id: self.run_id,
            seed: self.seed,
            status: self.status(),
            energy: result.map(|r| r.optimal_value),
            optimal_params: result.map(|r| r.optimal_params.clone()),
            iterations: result.map(|r| r.iterations),
            evaluations: result.map(|r| r.evaluations),
            failure: self.error().map(|e| FailureSummary {
                reason: e.reason(),
                message: e.to_string(),
            }),
            initial_params: self.initial_params.clone(),
            backend_calls: self.backend_calls,
            elapsed_ms: elapsed_ms(self.elapsed),
            finished_at: Utc::now(),
        }
    }
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn elapsed_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Why a run failed, in serializable form.
#[derive(Debug, Clone, Serialize)]
pub struct FailureSummary {
    /// Machine-readable error name.
    pub reason: &'static str,
    /// Human-readable message.
    pub message: String,
}

/// JSON-friendly snapshot of a [`RunReport`].
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub seed: Option<u64>,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimal_params: Option<ParameterVector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluations: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureSummary>,
    pub initial_params: ParameterVector,
    pub backend_calls: usize,
    pub elapsed_ms: u64,
    pub finished_at: DateTime<Utc>,
}

/// Reports from a multi-start search, in seed order.
#[derive(Debug)]
pub struct MultiStartReport {
    /// One report per seed.
    pub reports: Vec<RunReport>,
}

impl MultiStartReport {
    /// Successful run with the lowest energy.
    pub fn best(&self) -> Option<&RunReport> {
        self.reports
            .iter()
            .filter_map(|r| r.energy().map(|e| (r, e)))
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(r, _)| r)
    }

    /// Exit code: the best run's, or FAILED if every run failed.
    pub fn exit_code(&self) -> i32 {
        self.best()
            .map_or(RunStatus::Failed.exit_code(), RunReport::exit_code)
    }
}

/// Hooks into the lifecycle of a run.
///
/// Observers see what happens; they cannot influence the algorithm.
pub trait RunObserver: Send + Sync {
    /// Called once before the first evaluation.
    fn on_start(&self, _run_id: Uuid, _initial: &ParameterVector, _max_evaluations: usize) {}

    /// Called after every objective evaluation.
    fn on_evaluation(&self, _run_id: Uuid, _evaluation: usize, _energy: f64) {}

    /// Called once with the final report.
    fn on_complete(&self, _report: &RunReport) {}
}

/// Logs run lifecycle events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RunObserver for TracingObserver {
    fn on_start(&self, run_id: Uuid, initial: &ParameterVector, max_evaluations: usize) {
        info!(%run_id, parameters = initial.len(), max_evaluations, "run started");
    }

    fn on_complete(&self, report: &RunReport) {
        match &report.outcome {
            RunOutcome::Completed(result) => info!(
                run_id = %report.run_id,
                status = %report.status(),
                energy = result.optimal_value,
                iterations = result.iterations,
                evaluations = result.evaluations,
                elapsed_ms = elapsed_ms(report.elapsed),
                "run finished"
            ),
            RunOutcome::Failed(err) => warn!(
                run_id = %report.run_id,
                reason = err.reason(),
                error = %err,
                "run failed"
            ),
        }
    }
}
