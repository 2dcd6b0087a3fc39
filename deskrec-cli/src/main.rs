//! deskrec CLI
//!
//! Capture a desktop region and report what the decoder delivers.
//!
//! # Usage
//!
//! ```bash
//! # Record the top-left 1280x720 at 30 fps until Ctrl+C
//! deskrec record --region 0,0,1280,720 --fps 30
//!
//! # Ten seconds from a second monitor through FFmpeg
//! deskrec record --size 1920x1080 --offset 1920,0 --duration 10 --backend ffmpeg
//!
//! # List capture devices
//! deskrec devices
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// deskrec - desktop region capture
#[derive(Parser)]
#[command(name = "deskrec")]
#[command(version)]
#[command(about = "Capture a desktop region and decode it on a background thread", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture a screen region until interrupted
    #[command(alias = "rec")]
    Record(commands::RecordArgs),

    /// List capture input devices
    Devices,

    /// Manage the configuration file
    Config(commands::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(format!("deskrec={}", level).parse()?))
        .with_target(false)
        .init();

    match cli.command {
        Commands::Record(args) => commands::record(args).await?,
        Commands::Devices => commands::devices().await?,
        Commands::Config(args) => commands::config(args).await?,
    }

    Ok(())
}
