//! Hamiltonian command implementation.

use anyhow::{Context, Result};
use console::style;

use heron_core::{Hamiltonian, molecules};

use super::common::{exact_energy, load_config};

/// Resolve the Hamiltonian from a molecule name or a configuration file.
fn resolve(config: Option<&str>, molecule: Option<&str>) -> Result<(String, Hamiltonian)> {
    if let Some(name) = molecule {
        let hamiltonian = molecules::by_name(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown molecule: '{name}'. Available: h2"))?
            .with_context(|| format!("Failed to build molecule: {name}"))?;
        return Ok((name.to_lowercase(), hamiltonian));
    }

    let label = config.map_or_else(|| "default (H2 at 0.735 Å)".to_string(), str::to_string);
    let hamiltonian = load_config(config)?.build_hamiltonian()?;
    Ok((label, hamiltonian))
}

/// Execute the hamiltonian command.
pub fn execute(config: Option<&str>, molecule: Option<&str>) -> Result<()> {
    let (label, hamiltonian) = resolve(config, molecule)?;

    println!("{} {}", style("→").cyan().bold(), style(&label).green());
    print!("{hamiltonian}");

    let merged = hamiltonian.merged();
    if merged.num_terms() < hamiltonian.num_terms() {
        println!("\nMerged:");
        print!("{merged}");
    } else {
        println!("  (no repeated labels)");
    }

    println!();
    println!(
        "  Identity offset:     {:.6} Ha",
        hamiltonian.identity_coefficient()
    );
    match exact_energy(&hamiltonian) {
        Some(energy) => println!(
            "  Exact ground energy: {} Ha",
            style(format!("{energy:.6}")).yellow()
        ),
        None => println!(
            "  Exact ground energy: {}",
            style("skipped (too many qubits)").dim()
        ),
    }
    if let Some(reference) = molecule.and_then(molecules::exact_ground_state_energy) {
        println!("  Reference:           {reference:.6} Ha");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_molecule() {
        let (label, h) = resolve(None, Some("H2")).unwrap();
        assert_eq!(label, "h2");
        assert_eq!(h.num_qubits(), 2);
    }

    #[test]
    fn test_resolve_default() {
        let (label, h) = resolve(None, None).unwrap();
        assert!(label.starts_with("default"));
        assert_eq!(h, molecules::h2_hamiltonian().unwrap());
    }

    #[test]
    fn test_unknown_molecule() {
        let err = resolve(None, Some("benzene")).unwrap_err();
        assert!(err.to_string().contains("Unknown molecule"));
    }

    #[test]
    fn test_execute_prints_h2() {
        assert!(execute(None, Some("h2")).is_ok());
    }
}
