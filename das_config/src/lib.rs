//! TOML configuration schema for the DAS calibration tools, plus the
//! channel-range string parser and the rate-table CSV loader.

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, bail};
use serde::{Deserialize, Serialize};

/// Top-level configuration. Every section has working defaults, so an
/// empty file is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub fiber: FiberSection,
    pub dither: DitherSection,
    pub amplifier: AmplifierSection,
    pub diagnostics: DiagnosticsSection,
    pub logging: LoggingSection,
    pub recording: RecordingSection,
    /// Optional CSV overriding the built-in pulse-period rate table.
    pub rate_table: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FiberSection {
    pub inactive_margin: u32,
    pub dc_reference_channels: usize,
    pub threshold_factor: f64,
    pub region_gap: u32,
    pub probe_duration_s: f64,
}

impl Default for FiberSection {
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

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DitherSection {
    pub amplitude_v: f64,
    pub frequency_hz: f64,
    pub end_threshold_fraction: f64,
    pub run_length: usize,
    pub probe_duration_s: f64,
    pub single_assembly_rad_per_v: f64,
    pub dual_assembly_rad_per_v: f64,
}

impl Default for DitherSection {
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

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AmplifierSection {
    pub seed_launch_ma: u32,
    pub current_step_ma: u32,
    pub activity_threshold: f64,
    pub probe_first_channel: u32,
    pub probe_last_channel: u32,
    pub probe_duration_s: f64,
    pub launch_ceiling_ma: u32,
    pub rolloff_lookback: usize,
    pub tail_channels: usize,
    pub receive_seed_ma: u32,
    pub saturation_threshold: f64,
    pub saturation_block: usize,
    pub receive_learning_rate: f64,
    pub saturated_ratio_threshold: f64,
}

impl Default for AmplifierSection {
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

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiagnosticsSection {
    pub test_duration_s: usize,
    /// Channel window of the internal procedure, e.g. `"1-512"`. A
    /// malformed value is substituted with the default at use, not
    /// rejected here.
    pub channel_range: String,
    pub refractive_index: f64,
}

impl Default for DiagnosticsSection {
    fn default() -> Self {
        Self {
            test_duration_s: 30,
            channel_range: "1-512".into(),
            refractive_index: 1.4682,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    /// Tracing filter directive, e.g. `"info"` or `"das_core=debug"`.
    pub level: String,
    /// Optional log file; stderr only when unset.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecordingSection {
    pub directory: PathBuf,
    pub duration_s: usize,
}

impl Default for RecordingSection {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("recordings"),
            duration_s: 10,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let text = fs::read_to_string(path)
            .wrap_err_with(|| format!("reading config file {}", path.display()))?;
        let cfg: Config = toml::from_str(&text)
            .wrap_err_with(|| format!("parsing config file {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values the hardware or the algorithms cannot work with.
    pub fn validate(&self) -> eyre::Result<()> {
        if self.fiber.inactive_margin == 0 {
            bail!("fiber.inactive_margin must be at least 1");
        }
        if self.fiber.dc_reference_channels == 0 {
            bail!("fiber.dc_reference_channels must be at least 1");
        }
        if self.fiber.threshold_factor <= 0.0 {
            bail!("fiber.threshold_factor must be positive");
        }
        if self.dither.amplitude_v <= 0.0 || self.dither.frequency_hz <= 0.0 {
            bail!("dither amplitude and frequency must be positive");
        }
        if !(0.0..=1.0).contains(&self.dither.end_threshold_fraction) {
            bail!("dither.end_threshold_fraction must lie in [0, 1]");
        }
        if self.dither.run_length == 0 {
            bail!("dither.run_length must be at least 1");
        }
        if self.amplifier.current_step_ma == 0 {
            bail!("amplifier.current_step_ma must be at least 1");
        }
        if self.amplifier.seed_launch_ma >= self.amplifier.launch_ceiling_ma {
            bail!("amplifier.seed_launch_ma must be below the launch ceiling");
        }
        if self.amplifier.probe_first_channel == 0
            || self.amplifier.probe_first_channel > self.amplifier.probe_last_channel
        {
            bail!("amplifier probe channel window is empty or starts at 0");
        }
        if !(0.0..1.0).contains(&self.amplifier.saturation_threshold) {
            bail!("amplifier.saturation_threshold must lie in [0, 1)");
        }
        if self.amplifier.saturation_block == 0 {
            bail!("amplifier.saturation_block must be at least 1");
        }
        if self.diagnostics.test_duration_s == 0 {
            bail!("diagnostics.test_duration_s must be at least 1");
        }
        if self.diagnostics.refractive_index <= 1.0 {
            bail!("diagnostics.refractive_index must be above 1.0");
        }
        if self.recording.duration_s == 0 {
            bail!("recording.duration_s must be at least 1");
        }
        Ok(())
    }
}

/// Parse a `"first-last"` channel range, 1-based and inclusive.
pub fn parse_channel_range(text: &str) -> eyre::Result<(u32, u32)> {
    let (first, last) = text
        .split_once('-')
        .ok_or_else(|| eyre::eyre!("channel range {text:?} is not of the form \"first-last\""))?;
    let first: u32 = first
        .trim()
        .parse()
        .wrap_err_with(|| format!("invalid first channel in {text:?}"))?;
    let last: u32 = last
        .trim()
        .parse()
        .wrap_err_with(|| format!("invalid last channel in {text:?}"))?;
    if first == 0 {
        bail!("channel numbering starts at 1, got {text:?}");
    }
    if last <= first {
        bail!("channel range {text:?} must span at least two channels");
    }
    Ok((first, last))
}

/// Load a rate-table override: CSV with `min_period,sampling_hz` columns,
/// ordered by strictly ascending period.
pub fn load_rate_table_csv(path: &Path) -> eyre::Result<Vec<(u32, u32)>> {
    #[derive(Deserialize)]
    struct Row {
        min_period: u32,
        sampling_hz: u32,
    }

    let mut reader = csv::Reader::from_path(path)
        .wrap_err_with(|| format!("opening rate table {}", path.display()))?;
    let mut table = Vec::new();
    for row in reader.deserialize() {
        let row: Row = row.wrap_err("malformed rate table row")?;
        table.push((row.min_period, row.sampling_hz));
    }
    if table.is_empty() {
        bail!("rate table {} has no entries", path.display());
    }
    if !table.windows(2).all(|w| w[0].0 < w[1].0) {
        bail!("rate table periods must be strictly ascending");
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_valid() {
        let cfg: Config = toml::from_str("").unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.diagnostics.channel_range, "1-512");
    }

    #[test]
    fn channel_range_parsing() {
        assert_eq!(parse_channel_range("401-700").unwrap(), (401, 700));
        assert_eq!(parse_channel_range(" 1 - 512 ").unwrap(), (1, 512));
        assert!(parse_channel_range("700-401").is_err());
        assert!(parse_channel_range("0-10").is_err());
        assert!(parse_channel_range("41").is_err());
        assert!(parse_channel_range("a-b").is_err());
    }
}
