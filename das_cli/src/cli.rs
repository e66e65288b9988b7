//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use das_core::session::NoiseProcedure;
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "das_cli", version, about = "DAS interrogator calibration and diagnostics")]
pub struct Cli {
    /// Path to config TOML; the built-in defaults apply when omitted and
    /// `etc/das_config.toml` does not exist
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Interrogator units in the simulated assembly (1 or 2)
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub units: usize,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full amplifier and fiber calibration
    Calibrate {
        /// JSONL report document to create
        #[arg(long, value_name = "FILE", default_value = "calibration_report.jsonl")]
        report: PathBuf,

        /// Also estimate the per-laser I/Q imbalance
        #[arg(long, action = ArgAction::SetTrue)]
        iq_correction: bool,
    },

    /// Measure the acoustic noise floor
    Diagnose {
        /// JSONL report document to create
        #[arg(long, value_name = "FILE", default_value = "diagnostics_report.jsonl")]
        report: PathBuf,

        /// Noise floor procedure
        #[arg(long, value_enum, default_value_t = Procedure::Internal)]
        procedure: Procedure,
    },

    /// Capture raw I/Q to disk with a recording-info sidecar
    Record {
        /// Output directory (default from config)
        #[arg(long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Capture length in seconds (default from config)
        #[arg(long, value_name = "SECONDS")]
        duration: Option<usize>,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Procedure {
    /// Fixed channel window, internal reporting format
    Internal,
    /// SEAFOM MSP-02 measurement over the configured channel windows
    Seafom,
}

impl From<Procedure> for NoiseProcedure {
    fn from(p: Procedure) -> Self {
        match p {
            Procedure::Internal => NoiseProcedure::Internal,
            Procedure::Seafom => NoiseProcedure::Seafom,
        }
    }
}
