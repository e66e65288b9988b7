//! Conversions from the TOML schema in `das_config` to the runtime
//! configuration structs.

use tracing::warn;

use crate::config::{AmplifierCfg, DitherCfg, FiberCfg, NoiseCfg, SessionCfg};

impl From<&das_config::FiberSection> for FiberCfg {
    fn from(s: &das_config::FiberSection) -> Self {
        Self {
            inactive_margin: s.inactive_margin,
            dc_reference_channels: s.dc_reference_channels,
            threshold_factor: s.threshold_factor,
            region_gap: s.region_gap,
            probe_duration_s: s.probe_duration_s,
        }
    }
}

impl From<&das_config::DitherSection> for DitherCfg {
    fn from(s: &das_config::DitherSection) -> Self {
        Self {
            amplitude_v: s.amplitude_v,
            frequency_hz: s.frequency_hz,
            end_threshold_fraction: s.end_threshold_fraction,
            run_length: s.run_length,
            probe_duration_s: s.probe_duration_s,
            single_assembly_rad_per_v: s.single_assembly_rad_per_v,
            dual_assembly_rad_per_v: s.dual_assembly_rad_per_v,
        }
    }
}

impl From<&das_config::AmplifierSection> for AmplifierCfg {
    fn from(s: &das_config::AmplifierSection) -> Self {
        Self {
            seed_launch_ma: s.seed_launch_ma,
            current_step_ma: s.current_step_ma,
            activity_threshold: s.activity_threshold,
            probe_first_channel: s.probe_first_channel,
            probe_last_channel: s.probe_last_channel,
            probe_duration_s: s.probe_duration_s,
            launch_ceiling_ma: s.launch_ceiling_ma,
            rolloff_lookback: s.rolloff_lookback,
            tail_channels: s.tail_channels,
            receive_seed_ma: s.receive_seed_ma,
            saturation_threshold: s.saturation_threshold,
            saturation_block: s.saturation_block,
            receive_learning_rate: s.receive_learning_rate,
            saturated_ratio_threshold: s.saturated_ratio_threshold,
        }
    }
}

/// A malformed channel range is substituted with the default window rather
/// than aborting the run.
impl From<&das_config::DiagnosticsSection> for NoiseCfg {
    fn from(s: &das_config::DiagnosticsSection) -> Self {
        let mut cfg = NoiseCfg {
            test_duration_s: s.test_duration_s,
            refractive_index: s.refractive_index,
            ..NoiseCfg::default()
        };
        match das_config::parse_channel_range(&s.channel_range) {
            Ok((first, last)) => {
                cfg.first_channel = first;
                cfg.last_channel = last;
            }
            Err(e) => warn!(
                range = %s.channel_range,
                error = %e,
                "invalid diagnostics channel range, using {}-{}",
                cfg.first_channel,
                cfg.last_channel
            ),
        }
        cfg
    }
}

impl From<&das_config::Config> for SessionCfg {
    fn from(c: &das_config::Config) -> Self {
        Self {
            fiber: (&c.fiber).into(),
            dither: (&c.dither).into(),
            amplifier: (&c.amplifier).into(),
            noise: (&c.diagnostics).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_range_falls_back_on_garbage() {
        let section = das_config::DiagnosticsSection {
            channel_range: "not-a-range".into(),
            ..Default::default()
        };
        let cfg = NoiseCfg::from(&section);
        assert_eq!((cfg.first_channel, cfg.last_channel), (1, 512));
    }

    #[test]
    fn diagnostics_range_is_honored_when_valid() {
        let section = das_config::DiagnosticsSection {
            channel_range: "401-700".into(),
            ..Default::default()
        };
        let cfg = NoiseCfg::from(&section);
        assert_eq!((cfg.first_channel, cfg.last_channel), (401, 700));
    }
}
