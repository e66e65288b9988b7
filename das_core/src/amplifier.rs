//! EDFA gain calibration: seed search, launch optimization, receive
//! optimization.

use das_traits::{AcquisitionProvider, Figure, Interrogator, LaserSelector};
use tracing::{debug, info};

use crate::config::AmplifierCfg;
use crate::error::{DasError, Result};
use crate::hw_error::map_hw_error;
use crate::iq::{combined_columns, median_radius, rms};

/// Factory receive-current default by pulse width.
pub fn default_receive_current(pulse_width_ns: u32) -> u32 {
    if pulse_width_ns <= 20 {
        100
    } else if pulse_width_ns <= 70 {
        95
    } else {
        92
    }
}

/// Worst per-block fraction of channels whose peak I or Q magnitude
/// exceeds the saturation threshold.
pub fn saturated_channel_ratio(
    i_cols: &[Vec<f64>],
    q_cols: &[Vec<f64>],
    cfg: &AmplifierCfg,
) -> f64 {
    let peaks: Vec<f64> = i_cols
        .iter()
        .zip(q_cols)
        .map(|(i, q)| {
            i.iter()
                .chain(q)
                .fold(0.0_f64, |m, &v| m.max(v.abs()))
        })
        .collect();
    let mut worst = 0.0_f64;
    for block in peaks.chunks(cfg.saturation_block) {
        let saturated = block.iter().filter(|&&p| p > cfg.saturation_threshold).count();
        worst = worst.max(saturated as f64 / block.len() as f64);
    }
    worst
}

/// Stage A: step the launch current up from the seed until backscatter
/// activity appears in the probe window. Returns the launch current where
/// activity was seen and the fixed starting receive current.
pub fn initialize_launch<A, I>(
    acquisition: &mut A,
    control: &mut I,
    unit: usize,
    cfg: &AmplifierCfg,
) -> Result<(u32, u32)>
where
    A: AcquisitionProvider,
    I: Interrogator,
{
    control
        .set_launch_current(unit, cfg.seed_launch_ma)
        .map_err(map_hw_error)?;
    control
        .set_receive_current(unit, cfg.receive_seed_ma)
        .map_err(map_hw_error)?;
    let mut launch = cfg.seed_launch_ma;
    let mut previous: Option<f64> = None;
    loop {
        // the seed itself is never probed; the first reading is one step up
        launch += cfg.current_step_ma;
        control
            .set_launch_current(unit, launch)
            .map_err(map_hw_error)?;
        let acq = acquisition
            .acquire(
                cfg.probe_first_channel,
                cfg.probe_last_channel,
                cfg.probe_duration_s,
                LaserSelector::Both,
            )
            .map_err(map_hw_error)?;
        let block = acq.blocks.get(unit).ok_or_else(|| {
            DasError::Consistency(format!("no sample block for digitizer board {unit}"))
        })?;
        let (i_cols, q_cols) = combined_columns(block);
        let level = rms(&median_radius(&i_cols, &q_cols));
        debug!(launch, level, "launch seed probe");
        if let Some(prev) = previous
            && level - prev > cfg.activity_threshold
        {
            info!(launch, "optical activity detected");
            return Ok((launch, cfg.receive_seed_ma));
        }
        if launch >= cfg.launch_ceiling_ma {
            return Err(DasError::HardwareFault(format!(
                "no optical activity up to {} mA launch current; fiber may be dark or disconnected",
                cfg.launch_ceiling_ma
            ))
            .into());
        }
        previous = Some(level);
    }
}

/// Stage B: sweep the launch current upward and pick the setting that
/// maximizes backscatter RMS over the tail of the active map. The sweep
/// stops once the level has decayed against the lookback window or the
/// ceiling is reached.
pub fn optimize_launch<A, I>(
    acquisition: &mut A,
    control: &mut I,
    unit: usize,
    start_ma: u32,
    first_channel: u32,
    last_channel: u32,
    cfg: &AmplifierCfg,
) -> Result<(u32, Figure)>
where
    A: AcquisitionProvider,
    I: Interrogator,
{
    let mut current = start_ma;
    let mut currents: Vec<u32> = Vec::new();
    let mut levels: Vec<f64> = Vec::new();
    loop {
        control
            .set_launch_current(unit, current)
            .map_err(map_hw_error)?;
        let acq = acquisition
            .acquire(
                first_channel,
                last_channel,
                cfg.probe_duration_s,
                LaserSelector::Both,
            )
            .map_err(map_hw_error)?;
        let block = acq.blocks.get(unit).ok_or_else(|| {
            DasError::Consistency(format!("no sample block for digitizer board {unit}"))
        })?;
        let (i_cols, q_cols) = combined_columns(block);
        let radius = median_radius(&i_cols, &q_cols);
        // tail of the active span, final sample excluded
        let tail_start = radius.len().saturating_sub(cfg.tail_channels);
        let tail_end = radius.len().saturating_sub(1);
        let level = rms(&radius[tail_start..tail_end]);
        debug!(current, level, "launch sweep probe");
        currents.push(current);
        levels.push(level);

        let n = levels.len();
        let rolled_off =
            n > cfg.rolloff_lookback && levels[n - 1] < levels[n - 1 - cfg.rolloff_lookback];
        if rolled_off || current == cfg.launch_ceiling_ma {
            break;
        }
        current = (current + cfg.current_step_ma).min(cfg.launch_ceiling_ma);
    }

    let best = levels
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(idx, _)| idx)
        .ok_or_else(|| DasError::HardwareFault("launch sweep produced no samples".into()))?;
    let optimum = currents[best];
    info!(optimum, "launch current optimized");

    let figure = Figure::line(
        "Launch EDFA Current Sweep",
        "Launch current [mA]",
        "Backscatter RMS",
    )
    .with_series(
        "backscatter",
        currents.iter().map(|&c| f64::from(c)).collect(),
        levels.clone(),
    )
    .annotate(
        format!("Optimal Launch EDFA Current: {optimum} mA"),
        f64::from(optimum),
        levels[best],
    );
    Ok((optimum, figure))
}

/// Stage C: walk the receive current down until the worst-block saturation
/// ratio drops below the configured target.
pub fn optimize_receive<A, I>(
    acquisition: &mut A,
    control: &mut I,
    unit: usize,
    first_channel: u32,
    last_channel: u32,
    cfg: &AmplifierCfg,
) -> Result<(u32, Figure)>
where
    A: AcquisitionProvider,
    I: Interrogator,
{
    let mut current = cfg.receive_seed_ma;
    let mut currents: Vec<u32> = Vec::new();
    let mut ratios: Vec<f64> = Vec::new();
    loop {
        control
            .set_receive_current(unit, current)
            .map_err(map_hw_error)?;
        let acq = acquisition
            .acquire(
                first_channel,
                last_channel,
                cfg.probe_duration_s,
                LaserSelector::Both,
            )
            .map_err(map_hw_error)?;
        let block = acq.blocks.get(unit).ok_or_else(|| {
            DasError::Consistency(format!("no sample block for digitizer board {unit}"))
        })?;
        let (i_cols, q_cols) = combined_columns(block);
        let ratio = saturated_channel_ratio(&i_cols, &q_cols, cfg);
        debug!(current, ratio, "receive descent probe");
        currents.push(current);
        ratios.push(ratio);

        if ratio < cfg.saturated_ratio_threshold {
            break;
        }
        let decrement = 1.0_f64.max((cfg.receive_learning_rate * ratio).floor()) as u32;
        if decrement >= current {
            return Err(DasError::HardwareFault(
                "receive current hit the gain floor while channels stayed saturated".into(),
            )
            .into());
        }
        current -= decrement;
    }
    info!(current, "receive current optimized");

    let figure = Figure::line(
        "Receive EDFA Current Descent",
        "Receive current [mA]",
        "Saturated channel ratio",
    )
    .with_series(
        "saturation ratio",
        currents.iter().map(|&c| f64::from(c)).collect(),
        ratios.clone(),
    )
    .annotate(
        format!("Optimal Receive EDFA Current: {current} mA"),
        f64::from(current),
        *ratios.last().unwrap_or(&0.0),
    );
    Ok((current, figure))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receive_default_follows_pulse_width_bands() {
        assert_eq!(default_receive_current(10), 100);
        assert_eq!(default_receive_current(20), 100);
        assert_eq!(default_receive_current(50), 95);
        assert_eq!(default_receive_current(100), 92);
        assert_eq!(default_receive_current(200), 92);
    }

    #[test]
    fn worst_block_ratio_is_reported() {
        let cfg = AmplifierCfg {
            saturation_block: 2,
            saturation_threshold: 0.8,
            ..AmplifierCfg::default()
        };
        // blocks: [0.9, 0.1] -> 0.5, [0.9, 0.9] -> 1.0
        let i = vec![vec![0.9], vec![0.1], vec![0.9], vec![0.9]];
        let q = vec![vec![0.0]; 4];
        assert!((saturated_channel_ratio(&i, &q, &cfg) - 1.0).abs() < 1e-12);
    }
}
