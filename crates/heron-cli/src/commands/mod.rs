//! CLI command implementations.

pub mod common;
pub mod hamiltonian;
pub mod run;
pub mod version;
