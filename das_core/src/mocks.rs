//! Scripted collaborator implementations for tests and examples.
//!
//! `TableControl` is a pure in-memory interrogator assembly whose state is
//! shared through a handle, so scripted acquisition closures can shape
//! their output from the currents and dither the algorithm under test has
//! set.

use std::cell::RefCell;
use std::rc::Rc;

use das_traits::{
    Acquisition, AcquisitionProvider, Figure, HwResult, Interrogator, LaserSelector,
    ProgressSink, RatePoint, ReportSink, SampleBlock,
};

/// Report sink that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryReport {
    pub lines: Vec<String>,
    pub figures: Vec<Figure>,
    pub closed: bool,
}

impl ReportSink for MemoryReport {
    fn log_line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }

    fn append_figure(&mut self, figure: &Figure) -> HwResult<()> {
        self.figures.push(figure.clone());
        Ok(())
    }

    fn close(&mut self) -> HwResult<()> {
        self.closed = true;
        Ok(())
    }
}

/// Progress sink that remembers only the latest fraction.
#[derive(Debug, Default)]
pub struct LastProgress {
    pub last: f64,
}

impl ProgressSink for LastProgress {
    fn update(&mut self, fraction: f64) {
        self.last = fraction;
    }
}

/// Mutable state of a [`TableControl`] assembly, shared with tests through
/// [`TableControl::handle`].
#[derive(Debug, Clone)]
pub struct ControlState {
    pub sampling_hz: u32,
    pub pulse_width_ns: u32,
    pub gauge_length_m: Vec<u32>,
    pub itu_channels: Vec<[u16; 2]>,
    pub launch_ma: Vec<u32>,
    pub receive_ma: Vec<u32>,
    pub dither: Vec<Option<(f64, f64)>>,
}

impl ControlState {
    fn new(units: usize) -> Self {
        Self {
            sampling_hz: 1600,
            pulse_width_ns: 100,
            gauge_length_m: vec![10; units],
            itu_channels: vec![[35, 37], [39, 41]][..units].to_vec(),
            launch_ma: vec![0; units],
            receive_ma: vec![0; units],
            dither: vec![None; units],
        }
    }
}

/// Interrogator backed by plain tables. All setters succeed and record.
pub struct TableControl {
    state: Rc<RefCell<ControlState>>,
    rate_table: Vec<RatePoint>,
}

impl TableControl {
    pub fn new(units: usize) -> Self {
        assert!(units == 1 || units == 2);
        Self {
            state: Rc::new(RefCell::new(ControlState::new(units))),
            rate_table: standard_rate_table(),
        }
    }

    pub fn with_rate_table(units: usize, rate_table: Vec<RatePoint>) -> Self {
        Self {
            state: Rc::new(RefCell::new(ControlState::new(units))),
            rate_table,
        }
    }

    /// Shared view of the assembly state for scripted acquisitions.
    pub fn handle(&self) -> Rc<RefCell<ControlState>> {
        Rc::clone(&self.state)
    }
}

impl Interrogator for TableControl {
    fn unit_count(&self) -> usize {
        self.state.borrow().launch_ma.len()
    }

    fn unit_name(&self, unit: usize) -> String {
        format!("DAS-{}", unit + 1)
    }

    fn sampling_frequency(&self) -> u32 {
        self.state.borrow().sampling_hz
    }

    fn set_sampling_frequency(&mut self, hz: u32) -> HwResult<()> {
        self.state.borrow_mut().sampling_hz = hz;
        Ok(())
    }

    fn pulse_width_ns(&self) -> u32 {
        self.state.borrow().pulse_width_ns
    }

    fn set_pulse_width_ns(&mut self, ns: u32) -> HwResult<()> {
        self.state.borrow_mut().pulse_width_ns = ns;
        Ok(())
    }

    fn gauge_length_m(&self, unit: usize) -> u32 {
        self.state.borrow().gauge_length_m[unit]
    }

    fn set_gauge_length_m(&mut self, unit: usize, m: u32) -> HwResult<()> {
        self.state.borrow_mut().gauge_length_m[unit] = m;
        Ok(())
    }

    fn laser_itu_channels(&self, unit: usize) -> [u16; 2] {
        self.state.borrow().itu_channels[unit]
    }

    fn rate_table(&self) -> &[RatePoint] {
        &self.rate_table
    }

    fn set_launch_current(&mut self, unit: usize, ma: u32) -> HwResult<()> {
        self.state.borrow_mut().launch_ma[unit] = ma;
        Ok(())
    }

    fn set_receive_current(&mut self, unit: usize, ma: u32) -> HwResult<()> {
        self.state.borrow_mut().receive_ma[unit] = ma;
        Ok(())
    }

    fn enable_dither(&mut self, unit: usize, amplitude_v: f64, frequency_hz: f64) -> HwResult<()> {
        self.state.borrow_mut().dither[unit] = Some((amplitude_v, frequency_hz));
        Ok(())
    }

    fn disable_dither(&mut self, unit: usize) -> HwResult<()> {
        self.state.borrow_mut().dither[unit] = None;
        Ok(())
    }
}

/// Acquisition provider driven by a closure.
pub struct FnAcquisition<F>(pub F);

impl<F> AcquisitionProvider for FnAcquisition<F>
where
    F: FnMut(u32, u32, f64, LaserSelector) -> HwResult<Acquisition>,
{
    fn acquire(
        &mut self,
        first_channel: u32,
        last_channel: u32,
        duration_s: f64,
        laser: LaserSelector,
    ) -> HwResult<Acquisition> {
        (self.0)(first_channel, last_channel, duration_s, laser)
    }
}

/// The factory rate table of the CRI-4400 assembly.
pub fn standard_rate_table() -> Vec<RatePoint> {
    [
        (2400, 40000),
        (3025, 32000),
        (3900, 25000),
        (4900, 20000),
        (6150, 16000),
        (7900, 12500),
        (9900, 10000),
        (12400, 8000),
        (19900, 5000),
        (24900, 4000),
        (31150, 3200),
        (49900, 2000),
        (62400, 1600),
    ]
    .into_iter()
    .map(|(min_period, sampling_hz)| RatePoint {
        min_period,
        sampling_hz,
    })
    .collect()
}

/// Offset-binary quantization of a normalized sample.
pub fn quantize(v: f64) -> u16 {
    ((v * 32768.0 + 32768.0).round().clamp(0.0, 65535.0)) as u16
}

/// Build a dual-laser block from per-channel I/Q columns, both lasers
/// carrying the same data.
pub fn block_both_lasers(i_cols: &[Vec<f64>], q_cols: &[Vec<f64>]) -> SampleBlock {
    let channels = i_cols.len();
    let rows = i_cols.first().map_or(0, Vec::len);
    let mut samples = Vec::with_capacity(rows * channels * 4);
    for row in 0..rows {
        for ch in 0..channels {
            let i = quantize(i_cols[ch][row]);
            let q = quantize(q_cols[ch][row]);
            samples.extend_from_slice(&[i, q, i, q]);
        }
    }
    SampleBlock::new(rows, channels, 4, samples)
}

/// Single-board acquisition wrapper with effective bounds derived from the
/// block width.
pub fn acquisition_single_board(first_channel: u32, block: SampleBlock) -> Acquisition {
    let last_channel = first_channel + block.channels as u32 - 1;
    Acquisition {
        blocks: vec![block],
        first_channel,
        last_channel,
    }
}
