//! Subcommand bodies: calibrate, diagnose, record.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use das_config::Config;
use das_core::config::SessionCfg;
use das_core::recinfo::RecordingInfo;
use das_core::session::CalibrationSession;
use das_hardware::align_channel_range;
use das_hardware::sim::{SimAcquisition, SimControl, SimFiberModel, sim_pair};
use das_traits::{AcquisitionProvider, LaserSelector, RatePoint, ReportSink};
use eyre::{Context, Result, bail};
use tracing::{info, warn};

use crate::cli::Procedure;
use crate::report::{ConsoleProgress, JsonlReport};

/// Channel window used when the configured range does not parse.
const DEFAULT_CHANNEL_RANGE: (u32, u32) = (1, 512);

fn sim_assembly(cfg: &Config, units: usize) -> Result<(SimAcquisition, SimControl)> {
    let mut model = SimFiberModel::default();
    if let Some(path) = &cfg.rate_table {
        model.rate_table = das_config::load_rate_table_csv(path)?
            .into_iter()
            .map(|(min_period, sampling_hz)| RatePoint { min_period, sampling_hz })
            .collect();
    }
    Ok(sim_pair(model, units))
}

fn new_session(
    cfg: &Config,
    units: usize,
    report: &Path,
) -> Result<CalibrationSession<SimAcquisition, SimControl, JsonlReport, ConsoleProgress>> {
    let (acquisition, control) = sim_assembly(cfg, units)?;
    let sink = JsonlReport::create(report)?;
    Ok(CalibrationSession::new(
        acquisition,
        control,
        sink,
        ConsoleProgress::default(),
        SessionCfg::from(cfg),
    ))
}

pub fn run_calibrate(cfg: &Config, units: usize, report: &Path, iq_correction: bool) -> Result<()> {
    let mut session = new_session(cfg, units, report)?;
    for unit in 0..units {
        session.run_amplifier_setup(unit)?;
    }
    session.run_fiber_end_detection()?;
    if iq_correction {
        for unit in 0..units {
            let correction = session.run_iq_imbalance_correction(unit)?;
            info!(unit, ?correction, "I/Q imbalance estimated");
        }
    }
    let mut sink = session.into_report();
    sink.close().map_err(|e| eyre::eyre!(e))?;
    Ok(())
}

pub fn run_diagnose(cfg: &Config, units: usize, report: &Path, procedure: Procedure) -> Result<()> {
    let mut session = new_session(cfg, units, report)?;
    session.run_noise_diagnostics(procedure.into())?;
    let mut sink = session.into_report();
    sink.close().map_err(|e| eyre::eyre!(e))?;
    Ok(())
}

pub fn run_record(
    cfg: &Config,
    units: usize,
    output: Option<PathBuf>,
    duration: Option<usize>,
) -> Result<()> {
    let directory = output.unwrap_or_else(|| cfg.recording.directory.clone());
    let seconds = duration.unwrap_or(cfg.recording.duration_s);
    if seconds == 0 {
        bail!("recording duration must be at least one second");
    }

    let (requested_first, requested_last) =
        das_config::parse_channel_range(&cfg.diagnostics.channel_range).unwrap_or_else(|err| {
            warn!(error = %err, "falling back to the default channel range");
            DEFAULT_CHANNEL_RANGE
        });
    // widen up front so the sidecar matches the captured data exactly
    let (first, last) = align_channel_range(requested_first, requested_last)?;

    let (mut acquisition, control) = sim_assembly(cfg, units)?;
    fs::create_dir_all(&directory)
        .wrap_err_with(|| format!("creating {}", directory.display()))?;
    let info = RecordingInfo::from_system(&control, first, last);
    fs::write(directory.join("recInfo.txt"), info.render())?;

    for second in 0..seconds {
        let capture = acquisition
            .acquire(first, last, 1.0, LaserSelector::Both)
            .map_err(|e| eyre::eyre!(e))?;
        let path = directory.join(format!("data{second:04}.bin"));
        let mut writer = BufWriter::new(fs::File::create(&path)?);
        for block in &capture.blocks {
            for sample in &block.samples {
                writer.write_all(&sample.to_le_bytes())?;
            }
        }
        writer.flush()?;
        info!(second = second + 1, total = seconds, "captured one second");
    }
    info!(path = %directory.display(), "recording complete");
    Ok(())
}
