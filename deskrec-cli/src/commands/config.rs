//! Config command - manage configuration files

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use deskrec_core::config::{sample_config, ConfigFile};

/// Arguments for the config command
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the path to the config file
    Path,

    /// Show the effective configuration
    Show,

    /// Generate a default config file
    Init {
        /// Force overwrite if file exists
        #[arg(short, long)]
        force: bool,
    },

    /// Print a sample configuration to stdout
    Sample,
}

/// Run config subcommand
pub async fn config(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommand::Path => {
            let path = ConfigFile::default_path();
            println!("{}", path.display());
            if path.exists() {
                println!("(file exists)");
            } else {
                println!("(file does not exist)");
            }
        }
        ConfigCommand::Show => {
            let path = ConfigFile::default_path();
            let config = ConfigFile::load_from(&path).context("Failed to load config file")?;

            if path.exists() {
                println!("Configuration file: {}\n", path.display());
            } else {
                println!("No configuration file at {}; showing defaults.", path.display());
                println!("Create one with: deskrec config init\n");
            }

            println!("[capture]");
            match config.capture.region {
                Some(region) => println!(
                    "  region:  {},{},{},{} ({})",
                    region.left(),
                    region.top(),
                    region.right(),
                    region.bottom(),
                    region
                ),
                None => println!("  region:  (none, pass --region or --size)"),
            }
            println!("  fps:     {}", config.capture.fps.get());
            println!("[device]");
            println!("  backend: {}", config.device.backend);
            println!("  format:  {}", config.device.format.as_deref().unwrap_or("(platform default)"));
            println!("  url:     {}", config.device.url.as_deref().unwrap_or("(platform default)"));
        }
        ConfigCommand::Init { force } => {
            let path = ConfigFile::default_path();

            if path.exists() && !force {
                println!("Configuration file already exists: {}", path.display());
                println!();
                println!("Use --force to overwrite, or edit the existing file.");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                if !parent.exists() {
                    std::fs::create_dir_all(parent).context("Failed to create config directory")?;
                }
            }

            std::fs::write(&path, sample_config()).context("Failed to write config file")?;

            println!("Created configuration file: {}", path.display());
        }
        ConfigCommand::Sample => {
            print!("{}", sample_config());
        }
    }

    Ok(())
}
