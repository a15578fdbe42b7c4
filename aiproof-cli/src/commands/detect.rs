//! Detect command implementation.

use std::path::PathBuf;

use aiproof_core::{DetectionVerdict, ImagePayload};
use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::json;
use tracing::{info, warn};

use crate::utils::{self, ServiceOptions};

/// Execute the detect command.
pub async fn execute(
    options: &ServiceOptions,
    file: PathBuf,
    heatmap_path: Option<PathBuf>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let (bytes, file_name) = utils::read_image(&file)?;
    let image = ImagePayload::from_bytes(bytes, file_name)?;

    let service = options.connect()?;
    let report = service
        .detect(&image)
        .await
        .context("Failed to run watermark detection")?;
    let verdict = DetectionVerdict::from_confidence(report.confidence);

    info!(
        detected = report.detected,
        confidence = report.confidence,
        verdict = %verdict,
        "Detection completed"
    );

    let heatmap_saved = match (heatmap_path, &report.heatmap) {
        (Some(path), Some(png)) => {
            utils::write_file(&path, png, "heatmap")?;
            Some(path)
        }
        (Some(path), None) => {
            warn!(path = %path.display(), "Service returned no heatmap");
            None
        }
        (None, _) => None,
    };

    if json {
        let out = serde_json::to_string_pretty(&json!({
            "detected": report.detected,
            "confidence": report.confidence,
            "verdict": verdict.label(),
            "payload": report.payload,
            "ai_generated": report.ai_generated,
            "message": report.message,
            "heatmap": heatmap_saved.as_ref().map(|p| p.display().to_string()),
        }))
        .context("Failed to serialize detection result")?;
        println!("{out}");
        return Ok(());
    }

    if quiet {
        return Ok(());
    }

    match verdict {
        DetectionVerdict::Detected => utils::banner(verdict.label(), |s| s.green()),
        DetectionVerdict::Uncertain => utils::banner(verdict.label(), |s| s.yellow()),
        DetectionVerdict::Authentic => utils::banner(verdict.label(), |s| s.blue()),
    }
    println!("   {}", verdict.description());
    println!();
    println!(
        "   {} {}",
        "Confidence:".dimmed(),
        utils::percent(report.confidence)
    );
    if let Some(payload) = &report.payload {
        println!("   {} {}", "Payload:".dimmed(), payload);
    }
    if report.ai_generated {
        println!("   {} {}", "Origin:".dimmed(), "AI-generated".yellow());
    }
    if !report.message.is_empty() {
        println!("   {} {}", "Message:".dimmed(), report.message);
    }
    if let Some(path) = &heatmap_saved {
        println!("   {} {}", "Heatmap:".dimmed(), path.display());
    }

    Ok(())
}
