//! AI-PROOF CLI - invisible watermark stamping and robustness testing.

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;
use utils::ServiceOptions;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  64  Invalid argument
  65  Robustness below --min-robustness
  66  Input file missing or not a supported image
  69  Watermark service unavailable or failing
  74  Cannot write output file";

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

#[derive(Parser)]
#[command(name = "aiproof")]
#[command(author, version, about = "Invisible watermark stamping and robustness testing", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Watermark service base URL [env: AIPROOF_API_URL]
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,

    /// Per-request timeout in seconds [env: AIPROOF_TIMEOUT_SECS]
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    /// Retries for catalog and health requests [env: AIPROOF_MAX_RETRIES]
    #[arg(long, global = true, value_name = "N")]
    retries: Option<u32>,

    /// Use a simulated offline service instead of the remote API
    #[arg(long, global = true)]
    mock: bool,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// When to use colors
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the watermark service is up
    Health,

    /// List the service's predefined attacks
    Attacks {
        /// Print the catalog as JSON
        #[arg(long)]
        json: bool,
    },

    /// Embed an invisible watermark into an image
    Stamp {
        /// Image to stamp (PNG, JPEG, GIF or WebP)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Where to write the stamped PNG (defaults to <FILE>.stamped.png)
        #[arg(short, long, value_name = "OUT")]
        output: Option<PathBuf>,

        /// Watermark strength, 0.1 to 1.0
        #[arg(short, long, default_value_t = aiproof_core::types::DEFAULT_STRENGTH)]
        strength: f64,

        /// Enable content-adaptive masking
        #[arg(long)]
        adaptive: bool,
    },

    /// Check an image for a watermark
    Detect {
        /// Image to check
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Write the frequency-domain heatmap PNG here
        #[arg(long, value_name = "PATH")]
        heatmap: Option<PathBuf>,

        /// Print the detection result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Stamp an image, then run every attack and report how the watermark held up
    Pipeline {
        /// Image to test
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Watermark strength, 0.1 to 1.0
        #[arg(short, long, default_value_t = aiproof_core::types::DEFAULT_STRENGTH)]
        strength: f64,

        /// Enable content-adaptive masking
        #[arg(long)]
        adaptive: bool,

        /// Save the stamped image here
        #[arg(short, long, value_name = "OUT")]
        output: Option<PathBuf>,

        /// Load the attack catalog from a JSON file instead of the service
        #[arg(long, value_name = "FILE")]
        catalog: Option<PathBuf>,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,

        /// Exit with status 65 if robustness (percent) is lower than this
        #[arg(long, value_name = "PCT")]
        min_robustness: Option<f64>,
    },
}

fn init_tracing(verbose: bool, quiet: bool, ansi: bool) {
    let default_filter = if verbose {
        "aiproof=debug,aiproof_core=debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(ansi)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let options = ServiceOptions {
        api_url: cli.api_url,
        timeout_secs: cli.timeout,
        retries: cli.retries,
        mock: cli.mock,
    };
    let quiet = cli.quiet;

    match cli.command {
        Commands::Health => commands::health::execute(&options, quiet).await,
        Commands::Attacks { json } => commands::attacks::execute(&options, json, quiet).await,
        Commands::Stamp {
            file,
            output,
            strength,
            adaptive,
        } => {
            let settings = utils::settings(strength, adaptive);
            commands::stamp::execute(&options, file, output, settings, quiet).await
        }
        Commands::Detect {
            file,
            heatmap,
            json,
        } => commands::detect::execute(&options, file, heatmap, json, quiet).await,
        Commands::Pipeline {
            file,
            strength,
            adaptive,
            output,
            catalog,
            json,
            min_robustness,
        } => {
            let args = commands::pipeline::PipelineArgs {
                file,
                settings: utils::settings(strength, adaptive),
                output,
                catalog,
                json,
                min_robustness,
            };
            commands::pipeline::execute(&options, args, quiet).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let ansi = match cli.color {
        ColorChoice::Always => {
            colored::control::set_override(true);
            true
        }
        ColorChoice::Never => {
            colored::control::set_override(false);
            false
        }
        ColorChoice::Auto => std::io::stderr().is_terminal(),
    };
    init_tracing(cli.verbose, cli.quiet, ansi);

    let exit = match run(cli).await {
        Ok(()) => ExitCode::success(),
        Err(err) => ExitCode::from_anyhow(&err),
    };

    if let Some(message) = &exit.message {
        eprintln!("{} {}", "Error:".red().bold(), message);
    }
    std::process::exit(exit.code);
}
