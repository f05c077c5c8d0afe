//! Run controller: seeded start points, optimizer invocation, reports.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{Instrument, info_span};
use uuid::Uuid;

use crate::ansatz::TwoLocal;
use crate::backend::Backend;
use crate::error::{VqeError, VqeResult};
use crate::evaluator::EnergyEvaluator;
use crate::hamiltonian::Hamiltonian;
use crate::optimizers::{Objective, Optimizer};
use crate::params::ParameterVector;
use crate::report::{MultiStartReport, RunObserver, RunOutcome, RunReport};

/// Owns the pieces of a variational run and executes it.
///
/// All collaborators are shared read-only, so a controller is cheap to
/// clone and concurrent runs never share mutable state.
#[derive(Clone)]
pub struct RunController {
    hamiltonian: Arc<Hamiltonian>,
    ansatz: Arc<TwoLocal>,
    backend: Arc<dyn Backend>,
    optimizer: Arc<dyn Optimizer>,
    observers: Vec<Arc<dyn RunObserver>>,
    cache: bool,
}

impl RunController {
    /// Create a controller, checking the ansatz fits the Hamiltonian.
    pub fn new(
        hamiltonian: Arc<Hamiltonian>,
        ansatz: TwoLocal,
        backend: Arc<dyn Backend>,
        optimizer: Arc<dyn Optimizer>,
    ) -> VqeResult<Self> {
        ansatz.validate()?;
        if ansatz.num_qubits != hamiltonian.num_qubits() {
            return Err(VqeError::InvalidConfig(format!(
                "ansatz acts on {} qubits but the Hamiltonian on {}",
                ansatz.num_qubits,
                hamiltonian.num_qubits()
            )));
        }
        Ok(Self {
            hamiltonian,
            ansatz: Arc::new(ansatz),
            backend,
            optimizer,
            observers: Vec::new(),
            cache: false,
        })
    }

    /// Attach an observer.
    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Reuse energies for repeated parameter vectors within a run.
    pub fn with_evaluation_cache(mut self, enabled: bool) -> Self {
        self.cache = enabled;
        self
    }

    /// Free parameters of the ansatz.
    pub fn num_parameters(&self) -> usize {
        self.ansatz.num_parameters()
    }

    pub fn hamiltonian(&self) -> &Hamiltonian {
        &self.hamiltonian
    }

    pub fn ansatz(&self) -> &TwoLocal {
        &self.ansatz
    }

    pub fn optimizer(&self) -> &dyn Optimizer {
        self.optimizer.as_ref()
    }

    /// Start point for `seed`: uniform samples in `[0, 1)`.
    pub fn initial_parameters(&self, seed: u64) -> ParameterVector {
        ParameterVector::random_uniform(self.num_parameters(), seed)
    }

    /// Run once from the start point drawn with `seed`.
    pub async fn run(&self, seed: u64) -> VqeResult<RunReport> {
        self.execute(Some(seed), self.initial_parameters(seed)).await
    }

    /// Run once from an explicit start point.
    pub async fn run_from(&self, initial: ParameterVector) -> VqeResult<RunReport> {
        self.execute(None, initial).await
    }

    /// Run once per seed, concurrently.
    ///
    /// Reports come back in seed order. Dropping the returned future aborts
    /// every run still in flight.
    pub async fn run_multi_start(&self, seeds: &[u64]) -> VqeResult<MultiStartReport> {
        if seeds.is_empty() {
            return Err(VqeError::InvalidConfig(
                "multi-start needs at least one seed".into(),
            ));
        }

        let mut tasks = JoinSet::new();
        for (index, &seed) in seeds.iter().enumerate() {
            let controller = self.clone();
            tasks.spawn(async move { (index, controller.run(seed).await) });
        }

        let mut slots: Vec<Option<RunReport>> = seeds.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            let (index, report) = joined.map_err(|e| VqeError::TaskFailed(e.to_string()))?;
            slots[index] = Some(report?);
        }

        Ok(MultiStartReport {
            reports: slots.into_iter().flatten().collect(),
        })
    }

    async fn execute(&self, seed: Option<u64>, initial: ParameterVector) -> VqeResult<RunReport> {
        let expected = self.num_parameters();
        if initial.len() != expected {
            return Err(VqeError::DimensionMismatch {
                expected,
                actual: initial.len(),
            });
        }

        let mut evaluator =
            EnergyEvaluator::new(&self.hamiltonian, self.ansatz.clone(), self.backend.clone())?
                .with_cache(self.cache);
        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id, optimizer = self.optimizer.name());

        for observer in &self.observers {
            observer.on_start(run_id, &initial, self.optimizer.max_evaluations());
        }

        let started = Instant::now();
        let outcome = {
            let mut objective = ObservedObjective {
                inner: &mut evaluator,
                observers: &self.observers,
                run_id,
                evaluations: 0,
            };
            match self
                .optimizer
                .minimize(&mut objective, initial.clone())
                .instrument(span)
                .await
            {
                Ok(result) => RunOutcome::Completed(result),
                Err(err) => RunOutcome::Failed(err),
            }
        };

        let report = RunReport {
            run_id,
            seed,
            initial_params: initial,
            outcome,
            backend_calls: evaluator.backend_calls(),
            elapsed: started.elapsed(),
        };
        for observer in &self.observers {
            observer.on_complete(&report);
        }
        Ok(report)
    }
}

/// Forwards evaluations to observers.
struct ObservedObjective<'a> {
    inner: &'a mut EnergyEvaluator,
    observers: &'a [Arc<dyn RunObserver>],
    run_id: Uuid,
    evaluations: usize,
}

#[async_trait]
impl Objective for ObservedObjective<'_> {
    async fn evaluate(&mut self, params: &ParameterVector) -> VqeResult<f64> {
        let energy = self.inner.evaluate(params).await?;
        self.evaluations += 1;
        for observer in self.observers {
            observer.on_evaluation(self.run_id, self.evaluations, energy);
        }
        Ok(energy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, BackendResult, TermEstimate};
    use crate::hamiltonian::PauliString;
    use crate::optimizers::Cobyla;
    use crate::report::RunStatus;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::timeout;

    /// ⟨Z_q⟩ = cos(θ) of the first rotation on qubit q; good enough to
    /// give the optimizer a smooth landscape.
    struct CosineBackend;

    #[async_trait]
    impl Backend for CosineBackend {
        fn name(&self) -> &str {
            "cosine"
        }

        async fn estimate(
            &self,
            ansatz: &TwoLocal,
            params: &ParameterVector,
            observables: &[PauliString],
        ) -> BackendResult<Vec<TermEstimate>> {
            let per_qubit = ansatz.rotations.len();
            Ok(observables
                .iter()
                .map(|p| {
                    let value = p
                        .support()
                        .map(|(q, _)| params[q * per_qubit].cos())
                        .product();
                    TermEstimate::exact(value)
                })
                .collect())
        }
    }

    struct OfflineBackend;

    #[async_trait]
    impl Backend for OfflineBackend {
        fn name(&self) -> &str {
            "offline"
        }

        async fn estimate(
            &self,
            _ansatz: &TwoLocal,
            _params: &ParameterVector,
            _observables: &[PauliString],
        ) -> BackendResult<Vec<TermEstimate>> {
            Err(BackendError::BackendUnavailable("no route to host".into()))
        }
    }

    /// Answers the first `ready` calls like [`CosineBackend`], then never
    /// returns.
    struct StallingBackend {
        ready: usize,
        calls: AtomicUsize,
        in_flight: Arc<AtomicUsize>,
    }

    impl StallingBackend {
        fn new(ready: usize) -> Self {
            Self {
                ready,
                calls: AtomicUsize::new(0),
                in_flight: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    /// Counts evaluations suspended inside the backend.
    struct InFlight(Arc<AtomicUsize>);

    impl InFlight {
        fn enter(counter: &Arc<AtomicUsize>) -> Self {
            counter.fetch_add(1, Ordering::SeqCst);
            Self(counter.clone())
        }
    }

    impl Drop for InFlight {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Backend for StallingBackend {
        fn name(&self) -> &str {
            "stalling"
        }

        async fn estimate(
            &self,
            ansatz: &TwoLocal,
            params: &ParameterVector,
            observables: &[PauliString],
        ) -> BackendResult<Vec<TermEstimate>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.ready {
                return CosineBackend.estimate(ansatz, params, observables).await;
            }
            let _guard = InFlight::enter(&self.in_flight);
            std::future::pending::<BackendResult<Vec<TermEstimate>>>().await
        }
    }

    #[derive(Default)]
    struct CountingObserver {
        started: AtomicUsize,
        evaluations: AtomicUsize,
        completed: Mutex<Vec<RunStatus>>,
    }

    impl RunObserver for CountingObserver {
        fn on_start(&self, _run_id: Uuid, _initial: &ParameterVector, _max: usize) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }

        fn on_evaluation(&self, _run_id: Uuid, _evaluation: usize, _energy: f64) {
            self.evaluations.fetch_add(1, Ordering::SeqCst);
        }

        fn on_complete(&self, report: &RunReport) {
            self.completed.lock().unwrap().push(report.status());
        }
    }

    fn controller(backend: Arc<dyn Backend>) -> RunController {
        let h = Hamiltonian::from_labels([("IZ", 1.0), ("ZI", 1.0)]).unwrap();
        RunController::new(
            Arc::new(h),
            TwoLocal::new(2, 1),
            backend,
            Arc::new(Cobyla::new().with_max_evaluations(300)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_run_reaches_minimum() {
        let observer = Arc::new(CountingObserver::default());
        let ctl = controller(Arc::new(CosineBackend)).with_observer(observer.clone());

        let report = ctl.run(7).await.unwrap();
        assert!(report.is_success());
        assert_eq!(report.seed, Some(7));
        assert_eq!(report.initial_params, ctl.initial_parameters(7));
        assert!((report.energy().unwrap() + 2.0).abs() < 1e-6);

        let result = report.result().unwrap();
        assert_eq!(observer.started.load(Ordering::SeqCst), 1);
        assert_eq!(
            observer.evaluations.load(Ordering::SeqCst),
            result.evaluations
        );
        assert_eq!(report.backend_calls, result.evaluations);
        assert_eq!(observer.completed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_backend_failure_becomes_failed_outcome() {
        let observer = Arc::new(CountingObserver::default());
        let ctl = controller(Arc::new(OfflineBackend)).with_observer(observer.clone());

        let report = ctl.run(1).await.unwrap();
        assert_eq!(report.status(), RunStatus::Failed);
        assert_eq!(report.exit_code(), 2);
        assert_eq!(report.energy(), None);
        assert_eq!(report.error().map(VqeError::reason), Some("BackendUnavailable"));
        assert_eq!(report.backend_calls, 1);
        assert_eq!(
            observer.completed.lock().unwrap().as_slice(),
            &[RunStatus::Failed]
        );
    }

    #[tokio::test]
    async fn test_preflight_dimension_check() {
        let ctl = controller(Arc::new(CosineBackend));
        let err = ctl.run_from(ParameterVector::zeros(3)).await.unwrap_err();
        assert!(matches!(
            err,
            VqeError::DimensionMismatch {
                expected: 4,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_qubit_count_mismatch() {
        let h = Hamiltonian::from_labels([("ZZZ", 1.0)]).unwrap();
        let err = RunController::new(
            Arc::new(h),
            TwoLocal::new(2, 1),
            Arc::new(CosineBackend),
            Arc::new(Cobyla::new()),
        )
        .err();
        assert!(matches!(err, Some(VqeError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_multi_start_keeps_seed_order() {
        let ctl = controller(Arc::new(CosineBackend));
        let seeds = [11, 3, 42];

        let multi = ctl.run_multi_start(&seeds).await.unwrap();
        let got: Vec<_> = multi.reports.iter().map(|r| r.seed).collect();
        assert_eq!(got, vec![Some(11), Some(3), Some(42)]);

        let best = multi.best().unwrap();
        assert!((best.energy().unwrap() + 2.0).abs() < 1e-6);
        assert_eq!(multi.exit_code(), 0);

        let ids: Vec<_> = multi.reports.iter().map(|r| r.run_id).collect();
        assert!(ids[0] != ids[1] && ids[1] != ids[2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_run_releases_pending_evaluation() {
        let backend = Arc::new(StallingBackend::new(5));
        let observer = Arc::new(CountingObserver::default());
        let ctl = controller(backend.clone()).with_observer(observer.clone());

        let outcome = timeout(Duration::from_secs(60), ctl.run(3)).await;
        assert!(outcome.is_err());

        // Five answered evaluations, the sixth was suspended and dropped.
        assert_eq!(backend.calls.load(Ordering::SeqCst), 6);
        assert_eq!(backend.in_flight.load(Ordering::SeqCst), 0);
        assert_eq!(observer.evaluations.load(Ordering::SeqCst), 5);
        assert!(observer.completed.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(backend.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_multi_start_aborts_every_run() {
        let backend = Arc::new(StallingBackend::new(0));
        let ctl = controller(backend.clone());

        let outcome = timeout(Duration::from_secs(60), ctl.run_multi_start(&[1, 2, 3])).await;
        assert!(outcome.is_err());

        // Aborted tasks are torn down the next time the scheduler runs.
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
        assert_eq!(backend.in_flight.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_multi_start_needs_seeds() {
        let ctl = controller(Arc::new(CosineBackend));
        assert!(matches!(
            ctl.run_multi_start(&[]).await,
            Err(VqeError::InvalidConfig(_))
        ));
    }
}
