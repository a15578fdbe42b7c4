//! Health command implementation.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use tracing::info;

use crate::utils::ServiceOptions;

/// Execute the health command.
pub async fn execute(options: &ServiceOptions, quiet: bool) -> Result<()> {
    let service = options.connect()?;
    let health = service
        .health()
        .await
        .context("Failed to reach watermark service")?;

    info!(status = %health.status, service = %health.service, "Health check");

    if !health.is_healthy() {
        bail!("Watermark service is unhealthy (status: {})", health.status);
    }

    if !quiet {
        println!("{} {}", "●".green(), "Watermark service is up".green().bold());
        if !health.service.is_empty() {
            println!("   {} {}", "Service:".dimmed(), health.service);
        }
        println!("   {} {}", "Status:".dimmed(), health.status);
    }

    Ok(())
}
