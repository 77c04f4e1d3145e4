//! vsr - Video super-resolution inspection tool
//!
//! Shows how frame sizes are negotiated and drives the CPU reference
//! backend over synthetic frames.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use vsr_core::Size;

mod commands;

#[derive(Parser)]
#[command(name = "vsr")]
#[command(author, version, about = "Video super-resolution inspection tool")]
#[command(long_about = "
Inspects scale negotiation and runs the upscaling chain on synthetic frames.

Examples:
  vsr negotiate 1920x1080 1.5          # Sizes for a single frame
  vsr negotiate 1000x700 4/3           # Scale may be given as a fraction
  vsr table                            # Common resolutions at every scale
  vsr table -s 2 -s 3                  # Only selected scales
  vsr run 1280x720 -n 120 -x 2         # Upscale 120 gradient frames
  vsr run 640x360 --alternate 1920x1080 --strength 0
  vsr -v run 160x90 --budget-mb 64     # Debug logging, capped memory
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Number of threads (0 = auto)
    #[arg(short = 'j', long, global = true, default_value = "0")]
    threads: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Negotiate kernel input and output sizes for a frame
    #[command(visible_alias = "n")]
    Negotiate(NegotiateArgs),

    /// Print negotiated sizes for common resolutions
    #[command(visible_alias = "t")]
    Table(TableArgs),

    /// Upscale synthetic frames through the full chain
    #[command(visible_alias = "r")]
    Run(RunArgs),
}

#[derive(Args)]
pub struct NegotiateArgs {
    /// Frame size (WxH)
    size: Size,

    /// Requested scale (1.5 or 3/2)
    #[arg(default_value = "1.5")]
    scale: String,
}

#[derive(Args)]
pub struct TableArgs {
    /// Scales to list (default: all supported)
    #[arg(short, long = "scale")]
    scales: Vec<String>,

    /// Additional frame sizes (WxH)
    #[arg(short = 'a', long = "add")]
    extra: Vec<Size>,
}

#[derive(Args)]
pub struct RunArgs {
    /// Frame size (WxH)
    size: Size,

    /// Number of frames
    #[arg(short = 'n', long, default_value = "30")]
    frames: u32,

    /// Requested scale (1.5 or 3/2)
    #[arg(short = 'x', long, default_value = "1.5")]
    scale: String,

    /// Enhancement strength (>= 0.5 enables sharpening)
    #[arg(long, default_value = "1.0")]
    strength: f32,

    /// Switch to this size every other frame
    #[arg(long)]
    alternate: Option<Size>,

    /// Device memory budget in MB (0 = unlimited, default: from environment)
    #[arg(long)]
    budget_mb: Option<u64>,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    match cli.command {
        Commands::Negotiate(args) => commands::negotiate::run(args, cli.verbose),
        Commands::Table(args) => commands::table::run(args),
        Commands::Run(args) => commands::run::run(args, cli.verbose),
    }
}
