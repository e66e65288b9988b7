//! Acoustic noise floor diagnostics: the internal procedure and the SEAFOM
//! measurement.

use das_traits::{AcquisitionProvider, Figure, Interrogator, LaserSelector, ProgressSink};
use tracing::{debug, info};

use crate::config::NoiseCfg;
use crate::error::{DasError, Result};
use crate::hw_error::map_hw_error;
use crate::iq::{ChannelIq, channel_lanes};
use crate::transform::{
    amplitude_db, median, periodogram, phase_to_strain, power_db, standard_fft,
    unwrapped_phase, weighted_phase_stack,
};

/// Evaluation frequency band derived from the sampling frequency, inclusive
/// in Hz: a 1 kHz window pushed as close to Nyquist as the guard bands
/// allow.
pub fn frequency_band(fs: u32) -> (u32, u32) {
    let end = 500.max((fs / 2).saturating_sub(500));
    let start = 200.max(end.saturating_sub(1000));
    (start, end)
}

/// Indices spanning `[start, end)` of the band on a frequency grid, matched
/// by integer truncation of the grid values.
fn band_indices(f: &[f64], band: (u32, u32)) -> Option<(usize, usize)> {
    let lo = f.iter().position(|&v| v.floor() as u32 == band.0)?;
    let hi = f.iter().position(|&v| v.floor() as u32 == band.1)?;
    (lo < hi).then_some((lo, hi))
}

fn median_band_db_power(p: &[f64], lo: usize, hi: usize) -> f64 {
    let mut db: Vec<f64> = p[lo..hi].iter().map(|&v| power_db(v)).collect();
    median(&mut db)
}

/// Result of the internal procedure: one median noise floor per lane, with
/// a histogram figure each.
#[derive(Debug)]
pub struct InternalNoiseOutcome {
    pub lane_labels: Vec<String>,
    pub lane_medians_db: Vec<f64>,
    pub figures: Vec<Figure>,
}

fn internal_lane_labels<I: Interrogator>(control: &I) -> Vec<String> {
    let mut labels = Vec::new();
    for unit in 0..control.unit_count() {
        let name = control.unit_name(unit);
        labels.push(format!("{name} Laser 1"));
        labels.push(format!("{name} Laser 2"));
    }
    for unit in 0..control.unit_count() {
        labels.push(format!("{} Laser 1+2", control.unit_name(unit)));
    }
    if control.unit_count() == 2 {
        labels.push("Laser 1+2+3+4".into());
    }
    labels
}

/// Internal acoustic noise floor procedure.
///
/// For every second of the test and every channel in the window, takes the
/// median periodogram level over the evaluation band for each laser lane,
/// each assembly's weighted two-laser stack, and (dual assembly) the
/// combined four-laser stack, then reduces each lane to its global median.
pub fn internal_noise_floor<A, I, P>(
    acquisition: &mut A,
    control: &I,
    progress: &mut P,
    cfg: &NoiseCfg,
) -> Result<InternalNoiseOutcome>
where
    A: AcquisitionProvider,
    I: Interrogator,
    P: ProgressSink,
{
    let fs = f64::from(control.sampling_frequency());
    let band = frequency_band(control.sampling_frequency());
    let units = control.unit_count();
    let lane_count = if units == 1 { 3 } else { 7 };
    let channels = (cfg.last_channel - cfg.first_channel + 1) as usize;
    info!(band_start = band.0, band_end = band.1, channels, "internal noise floor test");

    let mut matrix: Vec<Vec<f64>> = vec![Vec::with_capacity(cfg.test_duration_s * channels); lane_count];

    for second in 0..cfg.test_duration_s {
        debug!(second = second + 1, total = cfg.test_duration_s, "acquiring");
        let acq = acquisition
            .acquire(cfg.first_channel, cfg.last_channel, 1.0, LaserSelector::Both)
            .map_err(map_hw_error)?;
        let offset = (cfg.first_channel - acq.first_channel) as usize;

        for ch in 0..channels {
            let lanes = channel_lanes(&acq, offset + ch);
            let mut lane_idx = 0;
            for lane in &lanes {
                let phase = unwrapped_phase(&lane.i, &lane.q);
                let (p, f) = periodogram(&phase, fs);
                let (lo, hi) = band_indices(&f, band).ok_or_else(|| band_outside(band))?;
                matrix[lane_idx].push(median_band_db_power(&p, lo, hi));
                lane_idx += 1;
            }
            for unit in 0..units {
                let pair = &lanes[2 * unit..2 * unit + 2];
                let stack = weighted_phase_stack(pair);
                let (p, f) = periodogram(&stack, fs);
                let (lo, hi) = band_indices(&f, band).ok_or_else(|| band_outside(band))?;
                matrix[lane_idx].push(median_band_db_power(&p, lo, hi));
                lane_idx += 1;
            }
            if units == 2 {
                let stack = weighted_phase_stack(&lanes);
                let (p, f) = periodogram(&stack, fs);
                let (lo, hi) = band_indices(&f, band).ok_or_else(|| band_outside(band))?;
                matrix[lane_idx].push(median_band_db_power(&p, lo, hi));
            }
        }
        progress.update((second + 1) as f64 / cfg.test_duration_s as f64);
    }

    let lane_labels = internal_lane_labels(control);
    let mut lane_medians_db = Vec::with_capacity(lane_count);
    let mut figures = Vec::with_capacity(lane_count);
    for (label, values) in lane_labels.iter().zip(&matrix) {
        let mut scratch = values.clone();
        let m = median(&mut scratch);
        lane_medians_db.push(m);
        figures.push(
            Figure::histogram(format!("Noise Floor: {label}"), "Noise Floor [dB]")
                .with_series(label.clone(), Vec::new(), values.clone())
                .annotate(format!("Median Acoustic Noise Floor: {m:.2} dB"), m, 0.0),
        );
    }
    Ok(InternalNoiseOutcome {
        lane_labels,
        lane_medians_db,
        figures,
    })
}

/// Result of one SEAFOM channel window: median picostrain noise floor for
/// laser 1, laser 2, and the combined stack, plus the spectrum figure.
#[derive(Debug)]
pub struct SeafomWindowOutcome {
    pub window: (u32, u32),
    pub lane_medians_db: [f64; 3],
    pub figure: Figure,
}

/// SEAFOM acoustic noise floor measurement over the configured channel
/// windows.
///
/// Accumulates the standard amplitude spectrum of each channel's phase
/// converted to picostrain, averaged over seconds and channels, and takes
/// the median over the evaluation band per lane. The combined lane stacks
/// every laser of the assembly and converts with the master unit's laser-1
/// wavelength.
pub fn seafom_noise_floor<A, I, P>(
    acquisition: &mut A,
    control: &I,
    progress: &mut P,
    cfg: &NoiseCfg,
) -> Result<Vec<SeafomWindowOutcome>>
where
    A: AcquisitionProvider,
    I: Interrogator,
    P: ProgressSink,
{
    let mut outcomes = Vec::with_capacity(cfg.seafom_windows.len());
    let total = cfg.seafom_windows.len() * cfg.test_duration_s;
    for (w, &window) in cfg.seafom_windows.iter().enumerate() {
        let done = w * cfg.test_duration_s;
        outcomes.push(seafom_window(
            acquisition,
            control,
            progress,
            cfg,
            window,
            done,
            total,
        )?);
    }
    Ok(outcomes)
}

fn seafom_window<A, I, P>(
    acquisition: &mut A,
    control: &I,
    progress: &mut P,
    cfg: &NoiseCfg,
    window: (u32, u32),
    progress_done: usize,
    progress_total: usize,
) -> Result<SeafomWindowOutcome>
where
    A: AcquisitionProvider,
    I: Interrogator,
    P: ProgressSink,
{
    let fs = f64::from(control.sampling_frequency());
    let band = frequency_band(control.sampling_frequency());
    let itu = control.laser_itu_channels(0);
    let gauge = f64::from(control.gauge_length_m(0));
    let channels = (window.1 - window.0 + 1) as usize;
    info!(window_start = window.0, window_end = window.1, "SEAFOM noise floor window");

    let mut sums: [Vec<f64>; 3] = Default::default();
    let mut grid: Vec<f64> = Vec::new();

    for second in 0..cfg.test_duration_s {
        debug!(second = second + 1, total = cfg.test_duration_s, "acquiring");
        let acq = acquisition
            .acquire(window.0, window.1, 1.0, LaserSelector::Both)
            .map_err(map_hw_error)?;
        let offset = (window.0 - acq.first_channel) as usize;

        for ch in 0..channels {
            let lanes = channel_lanes(&acq, offset + ch);
            let accumulate = |sum: &mut Vec<f64>,
                              grid: &mut Vec<f64>,
                              phase: &[f64],
                              itu_channel: u16|
             -> Result<()> {
                let (mag, f) = standard_fft(phase, fs);
                let strain = phase_to_strain(&mag, cfg.refractive_index, itu_channel, gauge)?;
                if sum.is_empty() {
                    *sum = strain;
                    if grid.is_empty() {
                        *grid = f;
                    }
                } else {
                    for (s, v) in sum.iter_mut().zip(strain) {
                        *s += v;
                    }
                }
                Ok(())
            };

            let lane_phase = |lane: &ChannelIq| unwrapped_phase(&lane.i, &lane.q);
            accumulate(&mut sums[0], &mut grid, &lane_phase(&lanes[0]), itu[0])?;
            accumulate(&mut sums[1], &mut grid, &lane_phase(&lanes[1]), itu[1])?;
            accumulate(&mut sums[2], &mut grid, &weighted_phase_stack(&lanes), itu[0])?;
        }
        progress.update((progress_done + second + 1) as f64 / progress_total as f64);
    }

    let norm = (channels * cfg.test_duration_s) as f64;
    let spectra_db: Vec<Vec<f64>> = sums
        .iter()
        .map(|sum| sum.iter().map(|&v| amplitude_db(v / norm)).collect())
        .collect();

    let (lo, hi) = band_indices(&grid, band).ok_or_else(|| band_outside(band))?;
    let mut lane_medians_db = [0.0; 3];
    for (out, spectrum) in lane_medians_db.iter_mut().zip(&spectra_db) {
        let mut scratch = spectrum[lo..hi].to_vec();
        *out = median(&mut scratch);
    }

    let mut figure = Figure::line(
        format!(
            "DAS Acoustic Noise Floor: Gauge Length = {gauge} m (Channels {}-{})",
            window.0, window.1
        ),
        "Frequency [Hz]",
        "Picostrain/sqrt(Hz) [dB]",
    );
    for (label, spectrum) in ["Laser 1", "Laser 2", "Laser 1+2"].iter().zip(&spectra_db) {
        figure = figure.with_series(*label, grid.clone(), spectrum.clone());
    }
    for (label, &m) in ["Laser 1", "Laser 2", "Laser 1+2"].iter().zip(&lane_medians_db) {
        figure = figure.annotate(format!("{label} median: {m:.2} dB"), 0.0, m);
    }

    Ok(SeafomWindowOutcome {
        window,
        lane_medians_db,
        figure,
    })
}

fn band_outside(band: (u32, u32)) -> DasError {
    DasError::Config(format!(
        "evaluation band {}-{} Hz lies outside the measured spectrum",
        band.0, band.1
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_tracks_nyquist_with_guard() {
        assert_eq!(frequency_band(20000), (8500, 9500));
        assert_eq!(frequency_band(1600), (200, 500));
    }

    #[test]
    fn band_indices_use_integer_truncation() {
        let f: Vec<f64> = (0..1000).map(|k| k as f64 * 0.5).collect();
        let (lo, hi) = band_indices(&f, (200, 300)).unwrap();
        assert_eq!(f[lo].floor() as u32, 200);
        assert_eq!(f[hi].floor() as u32, 300);
        assert!(lo < hi);
    }
}
