//! Calibration session: orchestrates the amplifier setup, fiber-end
//! detection, I/Q imbalance correction, and noise diagnostics against the
//! injected collaborators, narrating progress to the report sink.

use das_traits::{
    AcquisitionProvider, Figure, Interrogator, LaserSelector, ProgressSink, ReportSink,
};
use tracing::{info, warn};

use crate::amplifier;
use crate::config::SessionCfg;
use crate::error::{DasError, Result};
use crate::fiber::{self, FiberMap};
use crate::hw_error::map_hw_error;
use crate::iq::channel_lanes;
use crate::noise::{self, InternalNoiseOutcome, SeafomWindowOutcome};
use crate::rate;
use crate::transform::{boxcar_decimate, median};

/// Sampling frequency the amplifier setup runs at before the rate
/// optimization picks the real one.
const SETUP_SAMPLING_HZ: u32 = 1600;

/// Dither amplitude used by the I/Q imbalance estimate.
const IQ_CORRECTION_DITHER_V: f64 = 2.5;

/// Target decimation rate of the I/Q imbalance estimate.
const IQ_CORRECTION_RATE_HZ: u32 = 1000;

/// What the session has established so far. Any external change to gauge
/// length, pulse width, or sampling frequency invalidates all of it.
#[derive(Debug, Clone, Default)]
pub struct CalibrationState {
    pub amplifier_setup_done: bool,
    pub fiber_end_detected: bool,
    pub iq_correction_done: bool,
    pub fiber_end_channel: Option<u32>,
    pub launch_current_ma: Option<u32>,
    pub receive_current_ma: Option<u32>,
}

impl CalibrationState {
    pub fn invalidate(&mut self) {
        *self = Self::default();
    }
}

/// Per-laser I/Q imbalance estimate of one interrogator unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IqCorrection {
    pub i_offset: [f64; 2],
    pub q_offset: [f64; 2],
    pub iq_gain: [f64; 2],
}

/// Outcome of a noise diagnostics run.
#[derive(Debug)]
pub enum NoiseReport {
    Internal(InternalNoiseOutcome),
    Seafom(Vec<SeafomWindowOutcome>),
}

/// Which noise floor procedure to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseProcedure {
    Internal,
    Seafom,
}

pub struct CalibrationSession<A, I, R, P> {
    acquisition: A,
    control: I,
    report: R,
    progress: P,
    cfg: SessionCfg,
    state: CalibrationState,
    fiber_map: Option<FiberMap>,
}

impl<A, I, R, P> CalibrationSession<A, I, R, P>
where
    A: AcquisitionProvider,
    I: Interrogator,
    R: ReportSink,
    P: ProgressSink,
{
    pub fn new(acquisition: A, control: I, report: R, progress: P, cfg: SessionCfg) -> Self {
        Self {
            acquisition,
            control,
            report,
            progress,
            cfg,
            state: CalibrationState::default(),
            fiber_map: None,
        }
    }

    pub fn state(&self) -> &CalibrationState {
        &self.state
    }

    pub fn fiber_map(&self) -> Option<&FiberMap> {
        self.fiber_map.as_ref()
    }

    pub fn into_report(self) -> R {
        self.report
    }

    /// Change the sampling frequency; discards all calibration results.
    pub fn set_sampling_frequency(&mut self, hz: u32) -> Result<()> {
        self.control.set_sampling_frequency(hz).map_err(map_hw_error)?;
        self.state.invalidate();
        self.fiber_map = None;
        Ok(())
    }

    /// Change the pulse width; discards all calibration results.
    pub fn set_pulse_width(&mut self, ns: u32) -> Result<()> {
        self.control.set_pulse_width_ns(ns).map_err(map_hw_error)?;
        self.state.invalidate();
        self.fiber_map = None;
        Ok(())
    }

    /// Change a unit's gauge length; discards all calibration results.
    pub fn set_gauge_length(&mut self, unit: usize, m: u32) -> Result<()> {
        self.control.set_gauge_length_m(unit, m).map_err(map_hw_error)?;
        self.state.invalidate();
        self.fiber_map = None;
        Ok(())
    }

    /// Full EDFA setup of one interrogator unit: seed search, fiber region
    /// detection, rate optimization, launch sweep, receive descent.
    pub fn run_amplifier_setup(&mut self, unit: usize) -> Result<()> {
        let name = self.control.unit_name(unit);
        self.log(&format!("Starting Amplifier Setup for DAS interrogator {name}"));
        self.progress.update(0.0);

        let dither = self.cfg.dither.clone();
        self.control
            .enable_dither(unit, dither.amplitude_v, dither.frequency_hz)
            .map_err(map_hw_error)?;
        let outcome = self.amplifier_setup_inner(unit);
        if let Err(e) = self.control.disable_dither(unit) {
            warn!(unit, error = %e, "failed to disable dither after amplifier setup");
        }
        outcome?;

        self.state.amplifier_setup_done = true;
        self.progress.update(1.0);
        self.log("Amplifier Setup complete");
        Ok(())
    }

    fn amplifier_setup_inner(&mut self, unit: usize) -> Result<()> {
        if self.control.sampling_frequency() != SETUP_SAMPLING_HZ {
            self.control
                .set_sampling_frequency(SETUP_SAMPLING_HZ)
                .map_err(map_hw_error)?;
        }

        let (launch, _seed_receive) = amplifier::initialize_launch(
            &mut self.acquisition,
            &mut self.control,
            unit,
            &self.cfg.amplifier,
        )?;
        self.log(&format!("Optical activity detected at {launch} mA launch current"));
        self.progress.update(0.2);

        self.detect_regions(unit)?;
        self.progress.update(0.4);

        let map = self.require_map()?;
        let hz = rate::optimize(&map, self.control.rate_table())?;
        if hz != self.control.sampling_frequency() {
            self.log(&format!("Pulse repetition rate set to {hz} Hz"));
            self.control.set_sampling_frequency(hz).map_err(map_hw_error)?;
            // capacity changed, the map may extend further now
            self.detect_regions(unit)?;
        }
        self.progress.update(0.55);

        let receive_default =
            amplifier::default_receive_current(self.control.pulse_width_ns());
        self.control
            .set_receive_current(unit, receive_default)
            .map_err(map_hw_error)?;

        let map = self.require_map()?;
        let (first, last) = match (map.first(), map.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => {
                return Err(DasError::HardwareFault(
                    "no sensing regions detected; check the fiber connection".into(),
                )
                .into());
            }
        };

        let (launch_opt, launch_fig) = amplifier::optimize_launch(
            &mut self.acquisition,
            &mut self.control,
            unit,
            launch,
            first.start,
            last.end,
            &self.cfg.amplifier,
        )?;
        self.control
            .set_launch_current(unit, launch_opt)
            .map_err(map_hw_error)?;
        self.state.launch_current_ma = Some(launch_opt);
        self.log(&format!("Optimal Launch EDFA Current: {launch_opt} mA"));
        self.append_figure(&launch_fig)?;
        self.progress.update(0.75);

        let (receive_opt, receive_fig) = amplifier::optimize_receive(
            &mut self.acquisition,
            &mut self.control,
            unit,
            first.start,
            first.end,
            &self.cfg.amplifier,
        )?;
        self.state.receive_current_ma = Some(receive_opt);
        self.log(&format!("Optimal Receive EDFA Current: {receive_opt} mA"));
        self.append_figure(&receive_fig)?;
        self.progress.update(0.9);

        // full fiber extent, dead zones between regions included
        let span = fiber::FiberSensingRegion { start: first.start, end: last.end };
        for laser in [LaserSelector::Laser1, LaserSelector::Laser2] {
            let fig = self.oscilloscope_figure(unit, span, laser)?;
            self.append_figure(&fig)?;
        }
        Ok(())
    }

    /// Probe the fiber and refresh the sensing-region map without running
    /// the full amplifier setup.
    pub fn run_region_detection(&mut self, unit: usize) -> Result<()> {
        self.detect_regions(unit)
    }

    fn detect_regions(&mut self, unit: usize) -> Result<()> {
        let (map, figure) = fiber::detect_sensing_regions(
            &mut self.acquisition,
            &self.control,
            unit,
            &self.cfg.fiber,
        )?;
        for region in map.regions() {
            self.log(&format!(
                "Sensing fiber region: channels {} to {}",
                region.start, region.end
            ));
        }
        self.append_figure(&figure)?;
        self.fiber_map = Some(map);
        Ok(())
    }

    fn require_map(&self) -> Result<FiberMap> {
        self.fiber_map
            .clone()
            .ok_or_else(|| DasError::State("no fiber map; run region detection first".into()).into())
    }

    /// One-row I/Q snapshot over the full sensing span.
    fn oscilloscope_figure(
        &mut self,
        unit: usize,
        span: fiber::FiberSensingRegion,
        laser: LaserSelector,
    ) -> Result<Figure> {
        let acq = self
            .acquisition
            .acquire(span.start, span.end, self.cfg.fiber.probe_duration_s, laser)
            .map_err(map_hw_error)?;
        let block = acq.blocks.get(unit).ok_or_else(|| {
            DasError::Consistency(format!("no sample block for digitizer board {unit}"))
        })?;
        let channels: Vec<f64> = (0..block.channels)
            .map(|k| (acq.first_channel + k as u32) as f64)
            .collect();
        let i_row: Vec<f64> = (0..block.channels).map(|ch| block.value(0, ch, 0)).collect();
        let q_row: Vec<f64> = (0..block.channels).map(|ch| block.value(0, ch, 1)).collect();
        let laser_label = match laser {
            LaserSelector::Laser1 => "Laser 1",
            LaserSelector::Laser2 => "Laser 2",
            LaserSelector::Both => "Laser 1+2",
        };
        Ok(Figure::line(
            format!("{} Oscilloscope: {laser_label}", self.control.unit_name(unit)),
            "Channel",
            "Normalized amplitude",
        )
        .with_series("I", channels.clone(), i_row)
        .with_series("Q", channels, q_row))
    }

    /// Locate the physical fiber end with the dither probe. Non-convergence
    /// is reported and falls back to the last sensing-region end.
    pub fn run_fiber_end_detection(&mut self) -> Result<()> {
        let map = self.require_map()?;
        self.log("Starting Fiber End Detection");
        let (end, figure) = fiber::detect_fiber_end(
            &mut self.acquisition,
            &mut self.control,
            &map,
            &self.cfg.fiber,
            &self.cfg.dither,
        )?;
        self.append_figure(&figure)?;
        let channel = match end {
            Some(ch) => {
                self.log(&format!("Fiber end detected at channel {ch}"));
                ch
            }
            None => {
                let fallback = map.last().map(|r| r.end).unwrap_or(0);
                self.log(&format!(
                    "Fiber end detection failed; using last sensing region end {fallback}"
                ));
                fallback
            }
        };
        self.state.fiber_end_channel = Some(channel);
        self.state.fiber_end_detected = true;
        Ok(())
    }

    /// Estimate per-laser I/Q offsets and gain imbalance of one unit from
    /// the dithered backscatter, decimated toward 1 kHz.
    pub fn run_iq_imbalance_correction(&mut self, unit: usize) -> Result<IqCorrection> {
        let map = self.require_map()?;
        let (first, last) = match (map.first(), map.last()) {
            (Some(f), Some(l)) => (f.start, l.end),
            _ => return Err(DasError::State("fiber map is empty".into()).into()),
        };
        self.log(&format!(
            "Starting I/Q Imbalance Correction for DAS interrogator {}",
            self.control.unit_name(unit)
        ));

        self.control
            .enable_dither(unit, IQ_CORRECTION_DITHER_V, self.cfg.dither.frequency_hz)
            .map_err(map_hw_error)?;
        let outcome = self.iq_imbalance_inner(unit, first, last);
        if let Err(e) = self.control.disable_dither(unit) {
            warn!(unit, error = %e, "failed to disable dither after I/Q correction");
        }
        let correction = outcome?;

        self.state.iq_correction_done = true;
        for laser in 0..2 {
            self.log(&format!(
                "Laser {}: I offset {:.2}, Q offset {:.2}, I/Q gain {:.2}",
                laser + 1,
                correction.i_offset[laser],
                correction.q_offset[laser],
                correction.iq_gain[laser]
            ));
        }
        Ok(correction)
    }

    fn iq_imbalance_inner(&mut self, unit: usize, first: u32, last: u32) -> Result<IqCorrection> {
        let fs = self.control.sampling_frequency();
        let factor = (fs / IQ_CORRECTION_RATE_HZ) as usize;
        let mut correction = IqCorrection {
            i_offset: [0.0; 2],
            q_offset: [0.0; 2],
            iq_gain: [0.0; 2],
        };
        for (laser_idx, laser) in [LaserSelector::Laser1, LaserSelector::Laser2]
            .into_iter()
            .enumerate()
        {
            let acq = self
                .acquisition
                .acquire(first, last, 1.0, laser)
                .map_err(map_hw_error)?;
            let channels = acq
                .blocks
                .get(unit)
                .map(|b| b.channels)
                .ok_or_else(|| {
                    DasError::Consistency(format!("no sample block for digitizer board {unit}"))
                })?;

            let mut i_offsets = Vec::with_capacity(channels);
            let mut q_offsets = Vec::with_capacity(channels);
            let mut gains = Vec::with_capacity(channels);
            for ch in 0..channels {
                let lanes = channel_lanes(&acq, ch);
                let lane = &lanes[unit];
                let i = boxcar_decimate(&lane.i, factor);
                let q = boxcar_decimate(&lane.q, factor);
                let (i_min, i_max) = min_max(&i);
                let (q_min, q_max) = min_max(&q);
                i_offsets.push((i_max + i_min) / 2.0);
                q_offsets.push((q_max + q_min) / 2.0);
                if q_max > q_min {
                    gains.push((i_max - i_min) / (q_max - q_min));
                }
            }
            correction.i_offset[laser_idx] = round2(median(&mut i_offsets));
            correction.q_offset[laser_idx] = round2(median(&mut q_offsets));
            if gains.is_empty() {
                return Err(DasError::HardwareFault(
                    "no usable Q swing for the I/Q gain estimate".into(),
                )
                .into());
            }
            correction.iq_gain[laser_idx] = round2(median(&mut gains));
        }
        Ok(correction)
    }

    /// Run the selected acoustic noise floor procedure and narrate the
    /// per-lane medians.
    pub fn run_noise_diagnostics(&mut self, procedure: NoiseProcedure) -> Result<NoiseReport> {
        self.log("Starting Acoustic Noise Floor Test");
        let report = match procedure {
            NoiseProcedure::Internal => {
                self.log("Internal Test Procedure");
                let outcome = noise::internal_noise_floor(
                    &mut self.acquisition,
                    &self.control,
                    &mut self.progress,
                    &self.cfg.noise,
                )?;
                for (label, m) in outcome.lane_labels.iter().zip(&outcome.lane_medians_db) {
                    self.log(&format!("Acoustic Noise Floor - {label}: {m:.2} dB"));
                }
                for figure in &outcome.figures {
                    self.append_figure(figure)?;
                }
                NoiseReport::Internal(outcome)
            }
            NoiseProcedure::Seafom => {
                self.log("SEAFOM Test Procedure");
                let outcomes = noise::seafom_noise_floor(
                    &mut self.acquisition,
                    &self.control,
                    &mut self.progress,
                    &self.cfg.noise,
                )?;
                for outcome in &outcomes {
                    self.log(&format!(
                        "Channel Range: {}:{}",
                        outcome.window.0, outcome.window.1
                    ));
                    for (label, m) in ["Laser 1", "Laser 2", "Laser 1+2"]
                        .iter()
                        .zip(&outcome.lane_medians_db)
                    {
                        self.log(&format!("Acoustic Noise Floor - {label}: {m:.2} dB"));
                    }
                    self.append_figure(&outcome.figure)?;
                }
                NoiseReport::Seafom(outcomes)
            }
        };
        Ok(report)
    }

    fn log(&mut self, line: &str) {
        info!("{line}");
        self.report.log_line(line);
    }

    fn append_figure(&mut self, figure: &Figure) -> Result<()> {
        self.report
            .append_figure(figure)
            .map_err(|e| DasError::ReportBusy(e.to_string()))?;
        Ok(())
    }
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values.iter().fold((f64::MAX, f64::MIN), |(lo, hi), &v| {
        (lo.min(v), hi.max(v))
    })
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
