//! Common utility functions shared across CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use aiproof_core::{
    AttackDefinition, MockWatermarkService, RemoteWatermarkService, ServiceConfig, Settings,
    WatermarkService,
};
use anyhow::{bail, Context, Result};
use colored::{ColoredString, Colorize};
use tracing::{debug, info, warn};

/// Service connection flags shared by every command.
#[derive(Debug, Clone, Default)]
pub struct ServiceOptions {
    pub api_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub retries: Option<u32>,
    pub mock: bool,
}

impl ServiceOptions {
    /// Environment defaults with command-line overrides applied.
    pub fn config(&self) -> ServiceConfig {
        let mut config = ServiceConfig::default();
        if let Some(url) = &self.api_url {
            config.api_url = url.clone();
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = self.retries {
            config.max_retries = retries;
        }
        config
    }

    /// Build the service client.
    ///
    /// `--mock` swaps in an offline service that accepts every upload and
    /// reports the watermark lost only under the harshest attacks.
    pub fn connect(&self) -> Result<Arc<dyn WatermarkService>> {
        if self.mock {
            warn!("Using MOCK watermark service (results are simulated)");
            return Ok(Arc::new(demo_service()));
        }

        let config = self.config();
        if !config.api_url.starts_with("http://") && !config.api_url.starts_with("https://") {
            bail!(
                "Invalid argument --api-url: expected an http:// or https:// URL, got {}",
                config.api_url
            );
        }
        info!(api_url = %config.api_url, "Using remote watermark service");

        let service = RemoteWatermarkService::with_config(config)
            .context("Failed to create watermark service client")?;
        Ok(Arc::new(service))
    }
}

/// A representative subset of the service's predefined attacks.
pub fn demo_catalog() -> Vec<AttackDefinition> {
    vec![
        AttackDefinition::new("JPEG 90", "jpeg", 0.1),
        AttackDefinition::new("JPEG 50", "jpeg", 0.5),
        AttackDefinition::new("JPEG 25", "jpeg", 0.8),
        AttackDefinition::new("Resize 50%", "resize", 0.5),
        AttackDefinition::new("Crop 85%", "crop", 0.3),
        AttackDefinition::new("Blur (σ=1.0)", "blur", 0.33),
        AttackDefinition::new("Noise (σ=30)", "noise", 1.0),
        AttackDefinition::new("Rotate ±10°", "rotate", 0.67),
    ]
}

/// Simulated per-call latency of the offline service.
const DEMO_LATENCY: Duration = Duration::from_millis(25);

fn demo_service() -> MockWatermarkService {
    MockWatermarkService::new()
        .with_delay(DEMO_LATENCY)
        .with_catalog(demo_catalog())
        .with_verdict("JPEG 25", false, 0.42)
        .with_verdict("Noise (σ=30)", false, 0.18)
        .with_verdict("Rotate ±10°", true, 0.61)
}

/// Read an input image from disk.
pub fn read_image(path: &Path) -> Result<(Vec<u8>, String)> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read image: {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();
    debug!(path = %path.display(), bytes = bytes.len(), "Read image");
    Ok((bytes, file_name))
}

/// Write bytes to `path`, with a readable error.
pub fn write_file(path: &Path, bytes: &[u8], what: &str) -> Result<()> {
    std::fs::write(path, bytes)
        .with_context(|| format!("Failed to write {what}: {}", path.display()))?;
    info!(path = %path.display(), bytes = bytes.len(), "Wrote {what}");
    Ok(())
}

/// Default output path for a stamped image: `photo.jpg` becomes `photo.stamped.png`.
pub fn stamped_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    input.with_file_name(format!("{stem}.stamped.png"))
}

/// Build settings from flags, noting when strength had to be clamped.
pub fn settings(strength: f64, adaptive: bool) -> Settings {
    let settings = Settings::new(strength, adaptive);
    if settings.strength() != strength {
        warn!(
            requested = strength,
            applied = settings.strength(),
            "Strength out of range, clamped"
        );
    }
    settings
}

/// Format a 0..=1 confidence as a percentage.
pub fn percent(confidence: f64) -> String {
    format!("{:.1}%", confidence * 100.0)
}

/// Colour a survival percentage: green from 80%, yellow from 50%, red below.
pub fn score_color(pct: f64, text: &str) -> ColoredString {
    if pct >= 80.0 {
        text.green()
    } else if pct >= 50.0 {
        text.yellow()
    } else {
        text.red()
    }
}

/// A fixed-width text bar for a 0..=100 percentage.
pub fn bar(pct: f64, width: usize) -> String {
    let filled = ((pct.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

/// Print a boxed banner in the given colour.
pub fn banner(title: &str, color: fn(&str) -> ColoredString) {
    const WIDTH: usize = 40;
    let title_len = title.chars().count();
    let left = WIDTH.saturating_sub(title_len) / 2;
    let right = WIDTH.saturating_sub(title_len + left);
    println!();
    println!("{}", color(&format!("╔{}╗", "═".repeat(WIDTH))));
    println!(
        "{}",
        color(&format!("║{}{}{}║", " ".repeat(left), title, " ".repeat(right))).bold()
    );
    println!("{}", color(&format!("╚{}╝", "═".repeat(WIDTH))));
    println!();
}
