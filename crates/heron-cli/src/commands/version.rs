//! Version command implementation.

use console::style;

/// Execute the version command.
pub fn execute() {
    let version = env!("CARGO_PKG_VERSION");

    println!(
        "{} {} - variational quantum eigensolver",
        style("Heron").cyan().bold(),
        style(format!("v{version}")).yellow()
    );
    println!();
    println!("Components:");
    println!("  heron-core         Hamiltonians, ansatz, optimizers, run controller");
    println!("  heron-adapter-sim  Local statevector backend");
    println!("  heron-cli          Command-line interface");
    println!();
    println!("Optimizers: cobyla, spsa");
    println!("License:    {}", style("Apache-2.0").dim());
}
