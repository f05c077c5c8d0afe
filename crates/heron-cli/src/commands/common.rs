//! Shared helpers for CLI commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;
use uuid::Uuid;

use heron_adapter_sim::StatevectorBackend;
use heron_adapter_sim::exact::{self, MAX_EXACT_QUBITS};
use heron_core::{Backend, Hamiltonian, RunObserver, RunReport, RunStatus, VqeConfig};

/// Load a configuration file, or the defaults when no path is given.
pub fn load_config(path: Option<&str>) -> Result<VqeConfig> {
    let Some(path) = path else {
        return Ok(VqeConfig::default());
    };
    if !Path::new(path).exists() {
        anyhow::bail!("File not found: {path}");
    }
    VqeConfig::from_file(path).with_context(|| format!("Failed to load config: {path}"))
}

/// Statevector backend in exact or shot mode, as configured.
pub fn build_backend(config: &VqeConfig) -> Arc<dyn Backend> {
    match config.backend.shots {
        Some(shots) => Arc::new(StatevectorBackend::with_shots(shots, config.backend.seed)),
        None => Arc::new(StatevectorBackend::exact()),
    }
}

/// Exact ground energy, skipped for Hamiltonians too wide to diagonalize.
pub fn exact_energy(hamiltonian: &Hamiltonian) -> Option<f64> {
    if hamiltonian.num_qubits() > MAX_EXACT_QUBITS {
        debug!(
            "Skipping exact diagonalization of {} qubits",
            hamiltonian.num_qubits()
        );
        return None;
    }
    exact::ground_state_energy(hamiltonian).ok()
}

/// Progress bar advanced on every objective evaluation.
pub struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    pub fn new(total_evaluations: usize) -> Self {
        let bar = ProgressBar::new(total_evaluations as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} evaluations {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        bar.set_style(style);
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl RunObserver for ProgressObserver {
    fn on_evaluation(&self, _run_id: Uuid, _evaluation: usize, energy: f64) {
        self.bar.inc(1);
        if energy.is_finite() {
            self.bar.set_message(format!("E = {energy:.6}"));
        }
    }
}

/// Print one run report.
pub fn print_report(report: &RunReport, exact: Option<f64>) {
    let status = report.status();
    let marker = match status {
        RunStatus::Converged => style("✓").green().bold(),
        RunStatus::MaxIterReached => style("!").yellow().bold(),
        RunStatus::Failed => style("✗").red().bold(),
    };
    println!("\n{marker} {status}");

    match report.result() {
        Some(result) => {
            println!("  Energy:       {:.6} Ha", result.optimal_value);
            if let Some(exact) = exact {
                println!(
                    "  Exact:        {exact:.6} Ha (error {:.2e})",
                    result.optimal_value - exact
                );
            }
            println!("  Parameters:   {}", result.optimal_params);
            println!("  Iterations:   {}", result.iterations);
            println!("  Evaluations:  {}", result.evaluations);
            println!("  Termination:  {}", result.termination);
        }
        None => {
            if let Some(err) = report.error() {
                println!("  Reason:       {}", err.reason());
                println!("  Error:        {err}");
            }
            if let Some(exact) = exact {
                println!("  Exact:        {exact:.6} Ha");
            }
        }
    }

    println!(
        "  Run:          {} ({} backend calls, {:.2?})",
        style(report.run_id).dim(),
        report.backend_calls,
        report.elapsed
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_missing_file() {
        let err = load_config(Some("/nonexistent/heron.yaml")).unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }

    #[test]
    fn test_load_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "starts: 3\nbackend:\n  shots: 500").unwrap();

        let config = load_config(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(config.starts, 3);
        assert_eq!(config.backend.shots, Some(500));
        assert_eq!(build_backend(&config).name(), "statevector-shots");
        assert_eq!(build_backend(&VqeConfig::default()).name(), "statevector");
    }

    #[test]
    fn test_load_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "optimizer:\n  kind: adam").unwrap();

        let err = load_config(Some(file.path().to_str().unwrap())).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to load config"));
    }

    #[test]
    fn test_exact_energy_h2() {
        let h = VqeConfig::default().build_hamiltonian().unwrap();
        let energy = exact_energy(&h).unwrap();
        assert!((energy - heron_core::molecules::H2_EXACT_ENERGY).abs() < 1e-10);

        let wide = Hamiltonian::from_labels([("Z".repeat(MAX_EXACT_QUBITS + 1), 1.0)]).unwrap();
        assert!(exact_energy(&wide).is_none());
    }
}
