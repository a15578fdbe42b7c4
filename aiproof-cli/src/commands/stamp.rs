//! Stamp command implementation.

use std::path::PathBuf;

use aiproof_core::{ImagePayload, Settings, StrengthTier};
use anyhow::{Context, Result};
use colored::Colorize;
use tracing::info;

use crate::utils::{self, ServiceOptions};

/// Execute the stamp command.
pub async fn execute(
    options: &ServiceOptions,
    file: PathBuf,
    output: Option<PathBuf>,
    settings: Settings,
    quiet: bool,
) -> Result<()> {
    let (bytes, file_name) = utils::read_image(&file)?;
    let image = ImagePayload::from_bytes(bytes, file_name)?;

    let service = options.connect()?;
    let stamped = service
        .stamp(&image, &settings)
        .await
        .context("Failed to stamp image")?;

    let output = output.unwrap_or_else(|| utils::stamped_path(&file));
    utils::write_file(&output, stamped.as_png(), "stamped image")?;

    info!(
        input = %file.display(),
        output = %output.display(),
        strength = settings.strength(),
        adaptive = settings.adaptive_masking(),
        "Image stamped"
    );

    if !quiet {
        println!();
        println!("{}", "Image stamped with an invisible watermark".green().bold());
        println!();
        println!("   {} {}", "Saved:".dimmed(), output.display());
        println!("   {} {}", "Settings:".dimmed(), settings);
        println!(
            "   {} {}",
            "Profile:".dimmed(),
            StrengthTier::from_strength(settings.strength()).label()
        );
        println!(
            "   {} {} bytes",
            "Size:".dimmed(),
            stamped.as_png().len()
        );
    }

    Ok(())
}
