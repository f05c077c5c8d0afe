//! Heron Command-Line Interface
//!
//! The main entry point for the `heron` tool.
//!
//! ```text
//!   heron run [--config vqe.yaml] [--optimizer cobyla|spsa] [--starts N] ...
//!   heron hamiltonian [--config vqe.yaml | --molecule h2]
//!   heron version
//! ```
//!
//! Exit codes: 0 when the run converged or spent its budget, 2 when it
//! failed, 1 on configuration or usage errors, 130 on Ctrl-C.

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{hamiltonian, run, version};

/// Exit code after Ctrl-C (128 + SIGINT).
const EXIT_INTERRUPTED: i32 = 130;

/// Exit code for configuration and usage errors.
const EXIT_CONFIG_ERROR: i32 = 1;

/// Heron - variational quantum eigensolver
#[derive(Parser)]
#[command(name = "heron")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Minimize the energy of a Hamiltonian
    Run(run::RunArgs),

    /// Show a Hamiltonian, its merged form and its exact ground energy
    Hamiltonian {
        /// YAML configuration file
        #[arg(short, long, env = "HERON_CONFIG", conflicts_with = "molecule")]
        config: Option<String>,

        /// Bundled molecule (h2)
        #[arg(short, long)]
        molecule: Option<String>,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version are not errors
            let code = if e.use_stderr() { EXIT_CONFIG_ERROR } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    // Setup logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let command = async move {
        match cli.command {
            Commands::Run(args) => run::execute(args).await,
            Commands::Hamiltonian { config, molecule } => {
                hamiltonian::execute(config.as_deref(), molecule.as_deref()).map(|()| 0)
            }
            Commands::Version => {
                version::execute();
                Ok(0)
            }
        }
    };

    // Dropping the command future cancels any run still in flight.
    let result = tokio::select! {
        result = command => result,
        Ok(()) = tokio::signal::ctrl_c() => {
            eprintln!("\n{} interrupted", style("✗").red().bold());
            std::process::exit(EXIT_INTERRUPTED);
        }
    };

    // Handle errors
    match result {
        Ok(0) => Ok(()),
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {:#}", style("Error:").red().bold(), e);
            std::process::exit(EXIT_CONFIG_ERROR);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["heron", "run"]).unwrap();
        assert_eq!(cli.verbose, 0);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.config.is_none());
        assert!(args.optimizer.is_none());
        assert_eq!(args.format, run::OutputFormat::Text);
        assert!(!args.no_progress);
    }

    #[test]
    fn test_run_overrides() {
        let cli = Cli::try_parse_from([
            "heron",
            "-vv",
            "run",
            "--config",
            "vqe.yaml",
            "--optimizer",
            "spsa",
            "--max-evaluations",
            "200",
            "--tolerance",
            "1e-4",
            "--seed",
            "9",
            "--starts",
            "4",
            "--shots",
            "1000",
            "--reps",
            "2",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.config.as_deref(), Some("vqe.yaml"));
        assert_eq!(args.optimizer, Some(heron_core::OptimizerKind::Spsa));
        assert_eq!(args.max_evaluations, Some(200));
        assert_eq!(args.tolerance, Some(1e-4));
        assert_eq!(args.seed, Some(9));
        assert_eq!(args.starts, Some(4));
        assert_eq!(args.shots, Some(1000));
        assert_eq!(args.reps, Some(2));
        assert_eq!(args.format, run::OutputFormat::Json);
    }

    #[test]
    fn test_unknown_optimizer_rejected() {
        assert!(Cli::try_parse_from(["heron", "run", "--optimizer", "adam"]).is_err());
    }

    #[test]
    fn test_hamiltonian_sources_conflict() {
        let cli = Cli::try_parse_from(["heron", "hamiltonian", "-m", "h2"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Hamiltonian { molecule: Some(_), config: None }
        ));
        assert!(
            Cli::try_parse_from(["heron", "hamiltonian", "-m", "h2", "-c", "x.yaml"]).is_err()
        );
    }

    #[test]
    fn test_missing_subcommand() {
        assert!(Cli::try_parse_from(["heron"]).is_err());
        assert!(Cli::try_parse_from(["heron", "foobar"]).is_err());
    }
}
