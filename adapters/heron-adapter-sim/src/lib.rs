//! Heron Local Statevector Backend
//!
//! This crate provides a local [`Backend`](heron_core::Backend) for the Heron
//! VQE loop. Every call prepares the ansatz state from |0...0⟩ and measures
//! the requested Pauli observables.
//!
//! # Modes
//!
//! - **Exact**: ⟨ψ|P|ψ⟩ straight from the amplitudes, no sampling noise
//! - **Shots**: seeded sampling in each observable's eigenbasis, with the
//!   variance of the sample mean reported per term
//!
//! The [`exact`] module diagonalizes small Hamiltonians for reference
//! energies.
//!
//! # Performance
//!
//! | Qubits | Memory | Simulation Speed |
//! |--------|--------|------------------|
//! | 10 | ~16 KB | Instant |
//! | 15 | ~512 KB | Fast |
//! | 20 | ~16 MB | Moderate |
//!
//! # Example
//!
//! ```ignore
//! use heron_adapter_sim::StatevectorBackend;
//! use heron_core::{Backend, ParameterVector, PauliString, TwoLocal};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = StatevectorBackend::with_shots(1000, 7);
//!     let ansatz = TwoLocal::new(2, 1);
//!     let params = ParameterVector::zeros(ansatz.num_parameters());
//!
//!     let zz = PauliString::parse("ZZ")?;
//!     let estimates = backend.estimate(&ansatz, &params, &[zz]).await?;
//!     println!("<ZZ> = {}", estimates[0].value);
//!     Ok(())
//! }
//! ```

pub mod exact;
mod simulator;
mod statevector;

pub use simulator::{DEFAULT_MAX_QUBITS, EstimationMode, StatevectorBackend};
pub use statevector::Statevector;
