//! Pipeline command implementation.
//!
//! Stamps the image, runs every catalog attack against the stamped result and
//! prints how the watermark held up. Progress goes to stderr so `--json`
//! output on stdout stays parseable.

use std::path::PathBuf;

use aiproof_core::{
    AttackCatalog, FailureReason, PipelineOrchestrator, PipelineReport, PipelineRun, RunStatus,
    Settings, WatermarkError,
};
use anyhow::{bail, Context, Result};
use colored::Colorize;
use tracing::{info, warn};

use crate::exit_codes::BELOW_THRESHOLD_MARKER;
use crate::utils::{self, ServiceOptions};

/// Width of the per-type survival bars.
const BAR_WIDTH: usize = 20;

pub struct PipelineArgs {
    pub file: PathBuf,
    pub settings: Settings,
    pub output: Option<PathBuf>,
    pub catalog: Option<PathBuf>,
    pub json: bool,
    pub min_robustness: Option<f64>,
}

/// Execute the pipeline command.
pub async fn execute(options: &ServiceOptions, args: PipelineArgs, quiet: bool) -> Result<()> {
    if let Some(min) = args.min_robustness {
        if !(0.0..=100.0).contains(&min) {
            bail!("Invalid argument --min-robustness: expected 0 to 100, got {min}");
        }
    }

    let (bytes, file_name) = utils::read_image(&args.file)?;
    let service = options.connect()?;

    let orchestrator = match &args.catalog {
        Some(path) => {
            let catalog = AttackCatalog::from_file(path)
                .map_err(|e| match e {
                    WatermarkError::DecodeError(msg) => WatermarkError::InvalidInput(msg),
                    other => other,
                })
                .context("Failed to load attack catalog")?;
            info!(path = %path.display(), count = catalog.len(), "Loaded attack catalog from file");
            PipelineOrchestrator::new(service, catalog)
        }
        None => PipelineOrchestrator::connect(service).await,
    };

    if orchestrator.catalog().is_empty() {
        warn!("Attack catalog is empty, the image will only be stamped");
    }

    let show_progress = !quiet && !args.json;
    if show_progress {
        eprintln!(
            "{} {} against {} attacks",
            "Testing".bold(),
            file_name,
            orchestrator.catalog().len()
        );
    }

    let mut progress = orchestrator.subscribe();
    let run = orchestrator.run(bytes, &file_name, args.settings);
    tokio::pin!(run);

    let mut last_line: Option<String> = None;
    let run = loop {
        tokio::select! {
            run = &mut run => break run,
            changed = progress.changed() => {
                if changed.is_err() {
                    break (&mut run).await;
                }
                let line = progress.borrow_and_update().status().progress();
                if let Some(line) = line {
                    if show_progress && last_line.as_ref() != Some(&line) {
                        eprintln!("   {}", line.dimmed());
                    }
                    last_line = Some(line);
                }
            }
            _ = tokio::signal::ctrl_c() => bail!("Interrupted while the pipeline was running"),
        }
    };

    let report = PipelineReport::from_run(&run);

    match run.status() {
        RunStatus::Complete => {}
        RunStatus::Failed(reason) => {
            if args.json {
                print_json(&report)?;
            } else if !quiet {
                render_failure(&run, reason);
            }
            let err = match reason {
                FailureReason::InvalidInput(msg) => WatermarkError::InvalidInput(msg.clone()),
                FailureReason::StampError(msg) => WatermarkError::StampError(msg.clone()),
            };
            return Err(err.into());
        }
        other => bail!("Pipeline ended unexpectedly ({})", other.label()),
    }

    if let (Some(path), Some(stamped)) = (&args.output, run.stamped_image()) {
        utils::write_file(path, stamped.as_png(), "stamped image")?;
    }

    if args.json {
        print_json(&report)?;
    } else if !quiet {
        render_report(&report, args.output.as_ref());
    }

    if let Some(min) = args.min_robustness {
        if report.summary.robustness < min {
            bail!(
                "Robustness {:.1}% is {BELOW_THRESHOLD_MARKER} {:.1}%",
                report.summary.robustness,
                min
            );
        }
    }

    Ok(())
}

fn print_json(report: &PipelineReport) -> Result<()> {
    let out = serde_json::to_string_pretty(report).context("Failed to serialize pipeline report")?;
    println!("{out}");
    Ok(())
}

/// Failed runs get their own banner so they are never mistaken for a 0% score.
fn render_failure(run: &PipelineRun, reason: &FailureReason) {
    utils::banner("PIPELINE FAILED", |s| s.red());
    println!("   {} {}", "Reason:".dimmed(), reason.to_string().red());
    println!("   {} {}", "Settings:".dimmed(), run.settings());
    if matches!(reason, FailureReason::StampError(_)) {
        println!("   {} {}", "Attacks:".dimmed(), "none run".dimmed());
    }
}

fn render_report(report: &PipelineReport, saved: Option<&PathBuf>) {
    let summary = &report.summary;
    let title = format!("ROBUSTNESS: {:.1}%", summary.robustness);
    if summary.robustness >= 80.0 {
        utils::banner(&title, |s| s.green());
    } else if summary.robustness >= 50.0 {
        utils::banner(&title, |s| s.yellow());
    } else {
        utils::banner(&title, |s| s.red());
    }

    let settings = Settings::new(report.strength, report.adaptive_masking);
    println!("   {} {}", "Test Settings:".dimmed(), settings);
    println!("   {} {}", "Profile:".dimmed(), report.strength_tier.label());
    println!(
        "   {} {}/{}",
        "Attacks Survived:".dimmed(),
        summary.survived_count,
        summary.total
    );
    println!(
        "   {} {}",
        "Mean Confidence:".dimmed(),
        utils::percent(summary.mean_confidence)
    );
    if let Some(path) = saved {
        println!("   {} {}", "Stamped image:".dimmed(), path.display());
    }

    if report.outcomes.is_empty() {
        println!();
        println!("   {}", "No attacks were run (empty catalog).".yellow());
        return;
    }

    println!();
    println!("{}", "Attack Results".bold());
    let name_width = report
        .outcomes
        .iter()
        .map(|o| o.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("Attack".len());
    println!(
        "   {}  {}  {}  {}",
        pad("Attack", name_width).dimmed(),
        pad("Detected", 8).dimmed(),
        "Confidence".dimmed(),
        "Status".dimmed()
    );
    for outcome in &report.outcomes {
        let (detected, status) = if outcome.detected {
            (pad("✓ Yes", 8).green(), "Survived ✓".green())
        } else {
            (pad("✗ No", 8).red(), "Broken ✗".red())
        };
        println!(
            "   {}  {}  {:>10}  {}",
            pad(&outcome.name, name_width),
            detected,
            utils::percent(outcome.confidence),
            status
        );
    }

    println!();
    println!("{}", "Robustness by Attack Type".bold());
    let type_width = report
        .by_type
        .iter()
        .map(|t| t.attack_type.chars().count())
        .max()
        .unwrap_or(0);
    for breakdown in &report.by_type {
        let pct = breakdown.robustness;
        println!(
            "   {}  {}  {:>5.1}%  {}",
            pad(&breakdown.attack_type, type_width),
            utils::score_color(pct, &utils::bar(pct, BAR_WIDTH)),
            pct,
            format!("({}/{})", breakdown.survived_count, breakdown.total).dimmed()
        );
    }
}

/// Pad before colouring: escape codes would otherwise count towards the width.
fn pad(text: &str, width: usize) -> String {
    let len = text.chars().count();
    format!("{text}{}", " ".repeat(width.saturating_sub(len)))
}
