//! Heron variational eigensolver core
//!
//! This crate runs the hybrid quantum-classical loop of the Variational
//! Quantum Eigensolver: a parameterized circuit is evaluated against a Pauli
//! Hamiltonian and a derivative-free optimizer drives the parameters toward
//! the minimum energy.
//!
//! # Overview
//!
//! ```text
//!   RunController ──→ Optimizer (COBYLA / SPSA)
//!                        │  ⇅ ParameterVector / f64
//!                     EnergyEvaluator ──→ Hamiltonian (read-only)
//!                        │
//!                        └──→ dyn Backend (external: simulator, hardware)
//! ```
//!
//! - [`Hamiltonian`]: weighted sum of Pauli strings, rightmost label
//!   character on qubit 0
//! - [`TwoLocal`]: the ansatz descriptor handed to backends
//! - [`EnergyEvaluator`]: E(θ) = Σ c_k ⟨P_k⟩ with variance bookkeeping
//! - [`Cobyla`] and [`Spsa`]: implementations of [`Optimizer`]
//! - [`RunController`]: seeded start points, multi-start, [`RunReport`]s
//!
//! The core never executes circuits; see `heron-adapter-sim` for a local
//! statevector [`Backend`].
//!
//! # Example: H2 ground state
//!
//! ```ignore
//! use std::sync::Arc;
//! use heron_core::{Cobyla, RunController, TwoLocal, molecules};
//! use heron_adapter_sim::StatevectorBackend;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let h = Arc::new(molecules::h2_hamiltonian()?);
//!     let controller = RunController::new(
//!         h,
//!         TwoLocal::new(2, 3),
//!         Arc::new(StatevectorBackend::exact()),
//!         Arc::new(Cobyla::new()),
//!     )?;
//!
//!     let report = controller.run(42).await?;
//!     println!("E = {:.6} ({})", report.energy().unwrap_or(f64::NAN), report.status());
//!     Ok(())
//! }
//! ```

pub mod ansatz;
pub mod backend;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod hamiltonian;
pub mod molecules;
pub mod optimizers;
pub mod params;
pub mod report;
pub mod runner;

pub use ansatz::{EntanglingGate, Entanglement, Gate, RotationGate, TwoLocal};
pub use backend::{Backend, BackendError, BackendResult, TermEstimate};
pub use config::{OptimizerKind, VqeConfig};
pub use error::{VqeError, VqeResult};
pub use evaluator::{EnergyEvaluator, EvaluationResult};
pub use hamiltonian::{Hamiltonian, Pauli, PauliString, PauliTerm};
pub use optimizers::{
    Cobyla, FnObjective, Objective, OptimizationResult, Optimizer, Spsa, Termination, from_fn,
};
pub use params::ParameterVector;
pub use report::{
    MultiStartReport, RunObserver, RunOutcome, RunReport, RunStatus, RunSummary, TracingObserver,
};
pub use runner::RunController;
