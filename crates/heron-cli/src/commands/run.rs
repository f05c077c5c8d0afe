//! Run command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use console::style;
use serde::Serialize;

use heron_core::{
    MultiStartReport, OptimizerKind, RunController, RunStatus, RunSummary, TracingObserver,
    VqeConfig,
};

use super::common::{ProgressObserver, build_backend, exact_energy, load_config, print_report};

/// Arguments of `heron run`. Flags override the configuration file.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// YAML configuration file (defaults to H2 at 0.735 Å)
    #[arg(short, long, env = "HERON_CONFIG")]
    pub config: Option<String>,

    /// Optimizer (cobyla, spsa)
    #[arg(short, long, env = "HERON_OPTIMIZER", value_parser = parse_optimizer)]
    pub optimizer: Option<OptimizerKind>,

    /// Objective evaluation budget per start
    #[arg(long, env = "HERON_MAX_EVALUATIONS")]
    pub max_evaluations: Option<usize>,

    /// Convergence tolerance
    #[arg(long, env = "HERON_TOLERANCE")]
    pub tolerance: Option<f64>,

    /// Seed of the first start point
    #[arg(long, env = "HERON_SEED")]
    pub seed: Option<u64>,

    /// Number of seeded starts, run concurrently
    #[arg(long, env = "HERON_STARTS")]
    pub starts: Option<usize>,

    /// Shots per term (exact expectation values if unset)
    #[arg(long, env = "HERON_SHOTS")]
    pub shots: Option<u32>,

    /// Ansatz repetitions
    #[arg(long)]
    pub reps: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

/// How the final report is printed.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

fn parse_optimizer(name: &str) -> Result<OptimizerKind, String> {
    match name.to_lowercase().as_str() {
        "cobyla" => Ok(OptimizerKind::Cobyla),
        "spsa" => Ok(OptimizerKind::Spsa),
        other => Err(format!("unknown optimizer '{other}'. Available: cobyla, spsa")),
    }
}

impl RunArgs {
    /// Load the configuration file and apply flag overrides.
    pub fn resolve(&self) -> Result<VqeConfig> {
        let mut config = load_config(self.config.as_deref())?;

        if let Some(kind) = self.optimizer {
            config.optimizer.kind = kind;
        }
        if let Some(max_evaluations) = self.max_evaluations {
            config.optimizer.max_evaluations = max_evaluations;
        }
        if let Some(tolerance) = self.tolerance {
            config.optimizer.tolerance = tolerance;
        }
        if let Some(seed) = self.seed {
            config.optimizer.seed = seed;
        }
        if let Some(starts) = self.starts {
            config.starts = starts;
        }
        if let Some(shots) = self.shots {
            config.backend.shots = Some(shots);
        }
        if let Some(reps) = self.reps {
            config.ansatz.reps = reps;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

/// JSON document printed by `--format json`.
#[derive(Serialize)]
struct JsonReport {
    status: RunStatus,
    /// Index into `runs` of the lowest-energy successful run.
    best: Option<usize>,
    exact_energy: Option<f64>,
    runs: Vec<RunSummary>,
}

/// Execute the run command, returning the process exit code.
pub async fn execute(args: RunArgs) -> Result<i32> {
    let config = args.resolve()?;
    let text = args.format == OutputFormat::Text;

    let hamiltonian = Arc::new(config.build_hamiltonian()?);
    let ansatz = config.build_ansatz(hamiltonian.num_qubits());
    let optimizer = config.build_optimizer()?;
    let exact = exact_energy(&hamiltonian);
    let seeds = config.seeds();

    if text {
        println!(
            "{} Running VQE: {} qubits, {} terms, {} parameters, {} ({} evaluations, {} start{})",
            style("→").cyan().bold(),
            hamiltonian.num_qubits(),
            hamiltonian.num_terms(),
            ansatz.num_parameters(),
            style(optimizer.name()).yellow(),
            optimizer.max_evaluations(),
            seeds.len(),
            if seeds.len() == 1 { "" } else { "s" }
        );
        match config.backend.shots {
            Some(shots) => println!("  Backend: statevector, {shots} shots per term"),
            None => println!("  Backend: statevector, exact expectation values"),
        }
    }

    let mut controller = RunController::new(
        hamiltonian,
        ansatz,
        build_backend(&config),
        optimizer,
    )?
    .with_observer(Arc::new(TracingObserver));

    let progress = (text && !args.no_progress).then(|| {
        Arc::new(ProgressObserver::new(
            controller.optimizer().max_evaluations() * seeds.len(),
        ))
    });
    if let Some(progress) = &progress {
        controller = controller.with_observer(progress.clone());
    }

    let multi = match seeds.as_slice() {
        [seed] => MultiStartReport {
            reports: vec![controller.run(*seed).await?],
        },
        _ => controller.run_multi_start(&seeds).await?,
    };
    if let Some(progress) = &progress {
        progress.finish();
    }

    if text {
        print_text(&multi, exact);
    } else {
        print_json(&multi, exact)?;
    }
    Ok(multi.exit_code())
}

fn print_text(multi: &MultiStartReport, exact: Option<f64>) {
    if multi.reports.len() > 1 {
        println!("\n{} Starts:", style("→").cyan().bold());
        for report in &multi.reports {
            let seed = report.seed.map_or_else(|| "-".to_string(), |s| s.to_string());
            match (report.energy(), report.error()) {
                (Some(energy), _) => {
                    println!("  seed {seed:>6}  {energy:>12.6}  {}", report.status());
                }
                (None, Some(err)) => {
                    println!("  seed {seed:>6}  {:>12}  {}", style("FAILED").red(), err);
                }
                (None, None) => {}
            }
        }
    }

    // Every run failed: show the first failure.
    if let Some(report) = multi.best().or_else(|| multi.reports.first()) {
        print_report(report, exact);
    }
}

fn print_json(multi: &MultiStartReport, exact: Option<f64>) -> Result<()> {
    let best = multi.best();
    let output = JsonReport {
        status: best.map_or(RunStatus::Failed, |r| r.status()),
        best: best.and_then(|b| multi.reports.iter().position(|r| r.run_id == b.run_id)),
        exact_energy: exact,
        runs: multi.reports.iter().map(|r| r.summary()).collect(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: RunArgs,
    }

    fn args(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["heron-run"];
        argv.extend_from_slice(extra);
        TestCli::try_parse_from(argv).unwrap().args
    }

    #[test]
    fn test_parse_optimizer() {
        assert_eq!(parse_optimizer("COBYLA"), Ok(OptimizerKind::Cobyla));
        assert_eq!(parse_optimizer("spsa"), Ok(OptimizerKind::Spsa));
        assert!(parse_optimizer("nelder-mead").unwrap_err().contains("cobyla"));
    }

    #[test]
    fn test_resolve_defaults_to_h2() {
        let config = args(&[]).resolve().unwrap();
        assert_eq!(config, VqeConfig::default());
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = args(&[
            "--optimizer",
            "spsa",
            "--max-evaluations",
            "50",
            "--seed",
            "3",
            "--starts",
            "2",
            "--shots",
            "100",
            "--reps",
            "1",
        ])
        .resolve()
        .unwrap();
        assert_eq!(config.optimizer.kind, OptimizerKind::Spsa);
        assert_eq!(config.optimizer.max_evaluations, 50);
        assert_eq!(config.seeds(), vec![3, 4]);
        assert_eq!(config.backend.shots, Some(100));
        assert_eq!(config.build_ansatz(2).num_parameters(), 4);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let err = args(&["--max-evaluations", "0"]).resolve().unwrap_err();
        assert!(err.to_string().contains("Invalid configuration"));

        assert!(args(&["--starts", "0"]).resolve().is_err());
        assert!(args(&["--tolerance=-1"]).resolve().is_err());
    }

    #[tokio::test]
    async fn test_execute_exact_h2() {
        let code = execute(args(&["--format", "json", "--max-evaluations", "200"]))
            .await
            .unwrap();
        assert_eq!(code, 0);
    }
}
