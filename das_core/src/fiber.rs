//! Sensing-fiber topology: region segmentation and fiber-end localization.
//!
//! The pure kernels (`regions_from_radius`, `fiber_end_from_amplitudes`)
//! operate on plain arrays; the `detect_*` wrappers drive the hardware
//! through the collaborator traits and feed the kernels.

use das_traits::{AcquisitionProvider, Figure, Interrogator, LaserSelector};
use tracing::{debug, warn};

use crate::config::{DitherCfg, FiberCfg};
use crate::error::{DasError, Result};
use crate::hw_error::map_hw_error;
use crate::iq::{channel_lanes, combined_columns, median_radius};
use crate::rate;
use crate::transform::{median_filter, psd, weighted_phase_stack};

/// Inclusive run of channels with live backscatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiberSensingRegion {
    pub start: u32,
    pub end: u32,
}

/// Ordered, non-overlapping sensing regions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FiberMap {
    regions: Vec<FiberSensingRegion>,
}

impl FiberMap {
    pub fn new(regions: Vec<FiberSensingRegion>) -> Self {
        debug_assert!(regions.windows(2).all(|w| w[0].end < w[1].start));
        Self { regions }
    }

    pub fn regions(&self) -> &[FiberSensingRegion] {
        &self.regions
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn first(&self) -> Option<FiberSensingRegion> {
        self.regions.first().copied()
    }

    pub fn last(&self) -> Option<FiberSensingRegion> {
        self.regions.last().copied()
    }

    /// Merge regions separated by gaps of at most `gap` channels.
    /// Idempotent: merging an already-merged map changes nothing.
    pub fn merged(&self, gap: u32) -> FiberMap {
        let mut merged: Vec<FiberSensingRegion> = Vec::with_capacity(self.regions.len());
        for &region in &self.regions {
            match merged.last_mut() {
                Some(prev) if region.start - prev.end <= gap => prev.end = region.end,
                _ => merged.push(region),
            }
        }
        FiberMap { regions: merged }
    }
}

/// Segment a per-channel backscatter radius profile into sensing regions.
///
/// The DC level estimated from the leading reference channels is removed,
/// the detection threshold is set from the trailing known-inactive margin,
/// and threshold crossings delimit the raw regions before gap merging.
pub fn regions_from_radius(radius: &[f64], first_channel: u32, cfg: &FiberCfg) -> FiberMap {
    let n = radius.len();
    if n <= cfg.inactive_margin as usize {
        return FiberMap::default();
    }
    let dc_count = cfg.dc_reference_channels.min(n);
    let dc = radius[..dc_count].iter().sum::<f64>() / dc_count as f64;
    let centered: Vec<f64> = radius.iter().map(|&r| r - dc).collect();

    let tail = &centered[n - cfg.inactive_margin as usize..];
    let noise_peak = tail.iter().fold(0.0_f64, |m, &v| m.max(v.abs()));
    let threshold = cfg.threshold_factor * noise_peak;

    let mut regions = Vec::new();
    let mut open: Option<u32> = None;
    for (idx, &r) in centered.iter().take(n - 1).enumerate() {
        let channel = first_channel + idx as u32;
        match open {
            None if r > threshold => open = Some(channel),
            Some(start) if r < threshold => {
                regions.push(FiberSensingRegion {
                    start,
                    end: channel - 1,
                });
                open = None;
            }
            _ => {}
        }
    }
    FiberMap::new(regions).merged(cfg.region_gap)
}

/// Probe the full supported channel range and segment it into sensing
/// regions. Returns the map plus the backscatter profile figure.
pub fn detect_sensing_regions<A, I>(
    acquisition: &mut A,
    control: &I,
    board: usize,
    cfg: &FiberCfg,
) -> Result<(FiberMap, Figure)>
where
    A: AcquisitionProvider,
    I: Interrogator,
{
    let fs = control.sampling_frequency();
    let capacity = rate::capacity_for_frequency(control.rate_table(), fs).ok_or_else(|| {
        DasError::Config(format!("sampling frequency {fs} Hz is not in the rate table"))
    })?;
    let last = capacity + cfg.inactive_margin;
    let acq = acquisition
        .acquire(1, last, cfg.probe_duration_s, LaserSelector::Both)
        .map_err(map_hw_error)?;
    let block = acq.blocks.get(board).ok_or_else(|| {
        DasError::Consistency(format!("no sample block for digitizer board {board}"))
    })?;
    let (i_cols, q_cols) = combined_columns(block);
    let radius = median_radius(&i_cols, &q_cols);
    let map = regions_from_radius(&radius, acq.first_channel, cfg);
    debug!(regions = map.regions().len(), "fiber region scan complete");

    let channels: Vec<f64> = (0..radius.len())
        .map(|k| (acq.first_channel + k as u32) as f64)
        .collect();
    let mut figure = Figure::line("Backscatter Profile", "Channel", "I/Q radius")
        .with_series("median radius", channels, radius);
    for region in map.regions() {
        figure = figure
            .annotate(format!("region start {}", region.start), region.start as f64, 0.0)
            .annotate(format!("region end {}", region.end), region.end as f64, 0.0);
    }
    Ok((map, figure))
}

/// Locate the fiber end in a per-channel dither amplitude profile.
///
/// Looks for the first run of consecutive channels whose median-filtered
/// amplitude stays below the detection fraction of the injected amplitude
/// and backs off by the pulse width. `None` when no such run exists.
pub fn fiber_end_from_amplitudes(
    amplitudes: &[f64],
    first_channel: u32,
    pulse_width_channels: u32,
    cfg: &DitherCfg,
) -> Option<u32> {
    let filtered = median_filter(amplitudes, 3);
    let threshold = cfg.end_threshold_fraction * cfg.amplitude_v;
    if filtered.len() < cfg.run_length {
        return None;
    }
    for n in 0..=filtered.len() - cfg.run_length {
        if filtered[n..n + cfg.run_length].iter().all(|&a| a < threshold) {
            let end =
                i64::from(first_channel) + n as i64 - i64::from(pulse_width_channels) - 1;
            return Some(end.max(1) as u32);
        }
    }
    None
}

/// Dither-probe the tail of the last sensing region for the fiber end.
///
/// Injects the stretcher dither on every assembly, demodulates the dither
/// tone per channel from a long acquisition, and scans the amplitude
/// profile. The dither is switched off on every exit path. A `None` result
/// is not an error; callers fall back to the last region end.
pub fn detect_fiber_end<A, I>(
    acquisition: &mut A,
    control: &mut I,
    map: &FiberMap,
    fiber_cfg: &FiberCfg,
    cfg: &DitherCfg,
) -> Result<(Option<u32>, Figure)>
where
    A: AcquisitionProvider,
    I: Interrogator,
{
    let last_region = map
        .last()
        .ok_or_else(|| DasError::State("fiber-end detection requires a fiber map".into()))?;
    let fs = control.sampling_frequency();
    let capacity = rate::capacity_for_frequency(control.rate_table(), fs).ok_or_else(|| {
        DasError::Config(format!("sampling frequency {fs} Hz is not in the rate table"))
    })?;
    let first = last_region.end.saturating_sub(100).max(1);
    let last = (last_region.end + 100).min(capacity + fiber_cfg.inactive_margin);

    for unit in 0..control.unit_count() {
        control
            .enable_dither(unit, cfg.amplitude_v, cfg.frequency_hz)
            .map_err(map_hw_error)?;
    }
    let outcome = probe_dither_amplitudes(acquisition, control, first, last, cfg);
    for unit in 0..control.unit_count() {
        if let Err(e) = control.disable_dither(unit) {
            warn!(unit, error = %e, "failed to disable dither after fiber-end probe");
        }
    }
    let (amplitudes, first_channel) = outcome?;

    let pulse_width_channels = control.pulse_width_ns() / 10;
    let end = fiber_end_from_amplitudes(&amplitudes, first_channel, pulse_width_channels, cfg);

    let channels: Vec<f64> = (0..amplitudes.len())
        .map(|k| (first_channel + k as u32) as f64)
        .collect();
    let mut figure = Figure::line("Dither Amplitude Profile", "Channel", "Amplitude [V]")
        .with_series("dither amplitude", channels, amplitudes);
    if let Some(ch) = end {
        figure = figure.annotate(format!("fiber end {ch}"), ch as f64, 0.0);
    }
    Ok((end, figure))
}

fn probe_dither_amplitudes<A, I>(
    acquisition: &mut A,
    control: &I,
    first: u32,
    last: u32,
    cfg: &DitherCfg,
) -> Result<(Vec<f64>, u32)>
where
    A: AcquisitionProvider,
    I: Interrogator,
{
    let acq = acquisition
        .acquire(first, last, cfg.probe_duration_s, LaserSelector::Both)
        .map_err(map_hw_error)?;
    let fs = f64::from(control.sampling_frequency());
    let rad_per_v = if control.unit_count() > 1 {
        cfg.dual_assembly_rad_per_v
    } else {
        cfg.single_assembly_rad_per_v
    };
    let channels = acq
        .blocks
        .first()
        .map(|b| b.channels)
        .ok_or_else(|| DasError::Consistency("acquisition returned no sample blocks".into()))?;

    let mut amplitudes = Vec::with_capacity(channels);
    for ch in 0..channels {
        let lanes = channel_lanes(&acq, ch);
        let stack = weighted_phase_stack(&lanes);
        let (p, _f) = psd(&stack, fs);
        let bin = (cfg.frequency_hz * stack.len() as f64 / fs).round() as usize;
        let power = p.get(bin).copied().unwrap_or(0.0);
        amplitudes.push((2.0 * power).sqrt() / rad_per_v);
    }
    Ok((amplitudes, acq.first_channel))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_bridges_small_gaps_only() {
        let map = FiberMap::new(vec![
            FiberSensingRegion { start: 50, end: 100 },
            FiberSensingRegion { start: 150, end: 400 },
            FiberSensingRegion { start: 900, end: 1200 },
        ]);
        let merged = map.merged(200);
        assert_eq!(
            merged.regions(),
            &[
                FiberSensingRegion { start: 50, end: 400 },
                FiberSensingRegion { start: 900, end: 1200 },
            ]
        );
    }

    #[test]
    fn end_scan_backs_off_by_pulse_width() {
        let mut amps = vec![2.0; 30];
        amps.extend(vec![0.1; 20]);
        let end = fiber_end_from_amplitudes(&amps, 1, 5, &DitherCfg::default());
        assert_eq!(end, Some(1 + 30 - 5 - 1));
    }
}
