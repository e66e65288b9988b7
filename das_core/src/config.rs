//! Runtime configuration for the calibration and diagnostics stages.
//!
//! These are plain structs with hardware-appropriate defaults; the TOML
//! schema in `das_config` converts into them (see [`crate::conversions`]).

/// Fiber sensing-region detection parameters.
#[derive(Debug, Clone)]
pub struct FiberCfg {
    /// Channels past the supported capacity that are known inactive and
    /// establish the noise reference for the detection threshold.
    pub inactive_margin: u32,
    /// Leading channels averaged for DC removal.
    pub dc_reference_channels: usize,
    /// Threshold factor over the inactive-tail peak.
    pub threshold_factor: f64,
    /// Regions closer than this many channels are merged.
    pub region_gap: u32,
    /// Probe acquisition length.
    pub probe_duration_s: f64,
}

impl Default for FiberCfg {
    fn default() -> Self {
        Self {
            inactive_margin: 50,
            dc_reference_channels: 10,
            threshold_factor: 5.0,
            region_gap: 200,
            probe_duration_s: 0.1,
        }
    }
}

/// Dither-probe parameters for fiber-end localization.
#[derive(Debug, Clone)]
pub struct DitherCfg {
    pub amplitude_v: f64,
    pub frequency_hz: f64,
    /// A channel counts as "past the end" below this fraction of the
    /// injected amplitude.
    pub end_threshold_fraction: f64,
    /// Consecutive below-threshold channels required.
    pub run_length: usize,
    pub probe_duration_s: f64,
    /// Fiber-stretcher sensitivity in rad/V.
    pub single_assembly_rad_per_v: f64,
    pub dual_assembly_rad_per_v: f64,
}

impl Default for DitherCfg {
    fn default() -> Self {
        Self {
            amplitude_v: 2.0,
            frequency_hz: 10.0,
            end_threshold_fraction: 0.75,
            run_length: 5,
            probe_duration_s: 5.0,
            single_assembly_rad_per_v: 1.3,
            dual_assembly_rad_per_v: 0.8,
        }
    }
}

/// EDFA gain-search parameters.
#[derive(Debug, Clone)]
pub struct AmplifierCfg {
    pub seed_launch_ma: u32,
    pub current_step_ma: u32,
    /// RMS backscatter increase marking the onset of optical activity.
    pub activity_threshold: f64,
    /// Probe window for the seed search.
    pub probe_first_channel: u32,
    pub probe_last_channel: u32,
    pub probe_duration_s: f64,
    /// Hard launch-current ceiling; hitting it in the seed search means the
    /// fiber is dark.
    pub launch_ceiling_ma: u32,
    /// Steps of lookback for the roll-off stop in the launch optimization.
    pub rolloff_lookback: usize,
    /// Backscatter tail evaluated during launch optimization.
    pub tail_channels: usize,
    /// Receive current the seed search hands back before optimization.
    pub receive_seed_ma: u32,
    /// Normalized magnitude above which a sample counts as saturated.
    pub saturation_threshold: f64,
    /// Channels per block when computing the worst saturation ratio.
    pub saturation_block: usize,
    /// Decrement scale in the receive-current descent.
    pub receive_learning_rate: f64,
    /// Target worst-block saturation ratio.
    pub saturated_ratio_threshold: f64,
}

impl Default for AmplifierCfg {
    fn default() -> Self {
        Self {
            seed_launch_ma: 100,
            current_step_ma: 10,
            activity_threshold: 0.005,
            probe_first_channel: 65,
            probe_last_channel: 96,
            probe_duration_s: 0.1,
            launch_ceiling_ma: 1300,
            rolloff_lookback: 15,
            tail_channels: 200,
            receive_seed_ma: 200,
            saturation_threshold: 0.82,
            saturation_block: 500,
            receive_learning_rate: 20.0,
            saturated_ratio_threshold: 0.02,
        }
    }
}

/// Noise-floor diagnostics parameters.
#[derive(Debug, Clone)]
pub struct NoiseCfg {
    /// Seconds of data, acquired one second at a time.
    pub test_duration_s: usize,
    /// Channel window for the internal procedure (inclusive).
    pub first_channel: u32,
    pub last_channel: u32,
    /// SEAFOM measurement channel windows (inclusive).
    pub seafom_windows: Vec<(u32, u32)>,
    pub refractive_index: f64,
}

impl Default for NoiseCfg {
    fn default() -> Self {
        Self {
            test_duration_s: 30,
            first_channel: 1,
            last_channel: 512,
            seafom_windows: vec![(401, 700), (2301, 2600), (4201, 4500)],
            refractive_index: 1.4682,
        }
    }
}

/// Everything a calibration session needs.
#[derive(Debug, Clone, Default)]
pub struct SessionCfg {
    pub fiber: FiberCfg,
    pub dither: DitherCfg,
    pub amplifier: AmplifierCfg,
    pub noise: NoiseCfg,
}
