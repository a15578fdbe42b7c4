//! Attacks command implementation.

use aiproof_core::AttackCatalog;
use anyhow::{Context, Result};
use colored::Colorize;

use crate::utils::ServiceOptions;

/// Execute the attacks command.
pub async fn execute(options: &ServiceOptions, json: bool, quiet: bool) -> Result<()> {
    let service = options.connect()?;
    // Unlike a pipeline run, listing fails loudly when the catalog is unreachable
    let attacks = service
        .list_attacks()
        .await
        .context("Failed to fetch attack catalog")?;
    let catalog = AttackCatalog::new(attacks);

    if json {
        let out = serde_json::to_string_pretty(catalog.attacks())
            .context("Failed to serialize attack catalog")?;
        println!("{out}");
        return Ok(());
    }

    if quiet {
        return Ok(());
    }

    println!();
    println!(
        "{} {}",
        "Attack catalog:".bold(),
        format!("{} attacks", catalog.len()).dimmed()
    );
    for attack_type in catalog.attack_types() {
        println!();
        println!("   {}", attack_type.to_uppercase().cyan().bold());
        for attack in catalog.attacks().iter().filter(|a| a.attack_type == attack_type) {
            println!(
                "     {:<20} {} {:.2}",
                attack.name,
                "severity".dimmed(),
                attack.severity
            );
        }
    }

    Ok(())
}
