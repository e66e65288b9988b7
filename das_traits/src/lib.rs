//! Collaborator contracts for the DAS calibration core.
//!
//! The core never talks to digitizer boards, interrogator registers, report
//! documents, or progress widgets directly; it goes through the traits in
//! this crate. Implementations live in `das_hardware` (and in test mocks).

pub mod figure;

pub use figure::{Annotation, Figure, FigureKind, Series};

/// Boxed error alias used across all collaborator traits.
pub type HwResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Which laser pair(s) an acquisition captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaserSelector {
    Laser1,
    Laser2,
    Both,
}

impl LaserSelector {
    /// Interleaved columns per spatial channel: `[I, Q]` for a single laser,
    /// `[I1, Q1, I2, Q2]` when both lasers are captured.
    pub fn lanes_per_channel(self) -> usize {
        match self {
            Self::Laser1 | Self::Laser2 => 2,
            Self::Both => 4,
        }
    }
}

/// Raw interleaved I/Q samples from one digitizer board.
///
/// Row-major: one row per time sample, `channels * lanes_per_channel`
/// columns. Samples are 16-bit offset binary; [`SampleBlock::value`]
/// normalizes to `[-1.0, 1.0)`.
#[derive(Debug, Clone)]
pub struct SampleBlock {
    pub rows: usize,
    pub channels: usize,
    pub lanes_per_channel: usize,
    pub samples: Vec<u16>,
}

impl SampleBlock {
    pub fn new(rows: usize, channels: usize, lanes_per_channel: usize, samples: Vec<u16>) -> Self {
        debug_assert_eq!(samples.len(), rows * channels * lanes_per_channel);
        Self {
            rows,
            channels,
            lanes_per_channel,
            samples,
        }
    }

    #[inline]
    pub fn raw(&self, row: usize, channel: usize, lane: usize) -> u16 {
        self.samples[row * self.channels * self.lanes_per_channel
            + channel * self.lanes_per_channel
            + lane]
    }

    /// Normalized sample in `[-1.0, 1.0)`.
    #[inline]
    pub fn value(&self, row: usize, channel: usize, lane: usize) -> f64 {
        (f64::from(self.raw(row, channel, lane)) - 32768.0) / 32768.0
    }
}

/// Result of one acquisition: one block per digitizer board plus the
/// effective (alignment-widened) channel bounds. Callers must use the
/// effective bounds, not the ones they requested.
#[derive(Debug, Clone)]
pub struct Acquisition {
    pub blocks: Vec<SampleBlock>,
    pub first_channel: u32,
    pub last_channel: u32,
}

/// One entry of the hardware rate table: the smallest pulse period (in
/// hardware clock ticks, equal to the channel capacity) that supports the
/// given sampling frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePoint {
    pub min_period: u32,
    pub sampling_hz: u32,
}

/// Synchronous block acquisition. Blocks the calling thread until the
/// hardware DMA buffers are filled or the per-buffer timeout trips.
pub trait AcquisitionProvider {
    fn acquire(
        &mut self,
        first_channel: u32,
        last_channel: u32,
        duration_s: f64,
        laser: LaserSelector,
    ) -> HwResult<Acquisition>;
}

/// Control surface of the interrogator assembly (one or two units sharing a
/// pulse clock). `unit` indexes the assembly; the master unit is 0.
pub trait Interrogator {
    fn unit_count(&self) -> usize;
    fn unit_name(&self, unit: usize) -> String;

    fn sampling_frequency(&self) -> u32;
    fn set_sampling_frequency(&mut self, hz: u32) -> HwResult<()>;
    fn pulse_width_ns(&self) -> u32;
    fn set_pulse_width_ns(&mut self, ns: u32) -> HwResult<()>;

    fn gauge_length_m(&self, unit: usize) -> u32;
    fn set_gauge_length_m(&mut self, unit: usize, m: u32) -> HwResult<()>;
    fn laser_itu_channels(&self, unit: usize) -> [u16; 2];

    /// Pulse-period → sampling-frequency table, ordered by ascending period.
    fn rate_table(&self) -> &[RatePoint];

    fn set_launch_current(&mut self, unit: usize, ma: u32) -> HwResult<()>;
    fn set_receive_current(&mut self, unit: usize, ma: u32) -> HwResult<()>;

    fn enable_dither(&mut self, unit: usize, amplitude_v: f64, frequency_hz: f64) -> HwResult<()>;
    fn disable_dither(&mut self, unit: usize) -> HwResult<()>;
}

/// Destination for the scrolling log and report figures of a calibration or
/// diagnostics run.
pub trait ReportSink {
    fn log_line(&mut self, line: &str);
    fn append_figure(&mut self, figure: &Figure) -> HwResult<()>;
    fn close(&mut self) -> HwResult<()>;
}

/// Fractional progress in `[0, 1]`. Observational only; never gates control
/// flow.
pub trait ProgressSink {
    fn update(&mut self, fraction: f64);
}
