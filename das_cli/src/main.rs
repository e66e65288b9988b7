use std::path::Path;

use clap::Parser;
use das_config::Config;
use eyre::Result;
use tracing::info;

mod cli;
mod commands;
mod logging;
mod report;

use cli::{Cli, Commands};

/// Config path tried when `--config` is not given.
const DEFAULT_CONFIG_PATH: &str = "etc/das_config.toml";

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => {
            let fallback = Path::new(DEFAULT_CONFIG_PATH);
            if fallback.exists() {
                Config::load(fallback)?
            } else {
                Config::default()
            }
        }
    };
    logging::init(&config.logging)?;

    if !(1..=2).contains(&args.units) {
        eyre::bail!("an assembly has one or two interrogator units, got {}", args.units);
    }
    info!(units = args.units, "using the simulated assembly");

    match args.cmd {
        Commands::Calibrate { report, iq_correction } => {
            commands::run_calibrate(&config, args.units, &report, iq_correction)
        }
        Commands::Diagnose { report, procedure } => {
            commands::run_diagnose(&config, args.units, &report, procedure)
        }
        Commands::Record { output, duration } => {
            commands::run_record(&config, args.units, output, duration)
        }
    }
}
