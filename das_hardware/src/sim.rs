//! Simulated interrogator assembly backed by a synthetic fiber model.
//!
//! The model reproduces the observable behavior the calibration relies on:
//! backscatter appears above an activity launch current and peaks at an
//! optimum, magnitude scales with receive gain, and the stretcher dither
//! shows up as a phase tone on every channel up to the physical fiber end.

use std::cell::RefCell;
use std::f64::consts::TAU;
use std::rc::Rc;

use das_traits::{
    Acquisition, AcquisitionProvider, HwResult, Interrogator, LaserSelector, RatePoint,
    SampleBlock,
};
use tracing::debug;

use crate::{BUFFER_TIMEOUT_S, FACTORY_RATE_TABLE, HwError, align_channel_range};

/// Stretcher sensitivity baked into the simulated optics.
const RAD_PER_VOLT: f64 = 1.3;

/// Identity of one digitizer board as enumerated on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardId {
    pub board_id: u32,
    pub system_id: u32,
}

/// Synthetic fiber and plant parameters.
#[derive(Debug, Clone)]
pub struct SimFiberModel {
    /// Spliced sensing regions (inclusive channel bounds).
    pub regions: Vec<(u32, u32)>,
    /// Last channel the dither physically reaches.
    pub fiber_end: u32,
    /// Launch current where backscatter becomes visible.
    pub activity_launch_ma: u32,
    /// Launch current of peak backscatter.
    pub optimum_launch_ma: u32,
    /// Normalized magnitude of inactive channels.
    pub noise_level: f64,
    pub rate_table: Vec<RatePoint>,
    /// Simulate a dead fiber-return path: every acquisition times out.
    pub fail_with_timeout: bool,
}

impl Default for SimFiberModel {
    fn default() -> Self {
        Self {
            regions: vec![(10, 120)],
            fiber_end: 100,
            activity_launch_ma: 150,
            optimum_launch_ma: 250,
            noise_level: 0.003,
            rate_table: FACTORY_RATE_TABLE.to_vec(),
            fail_with_timeout: false,
        }
    }
}

#[derive(Debug)]
struct SimState {
    model: SimFiberModel,
    sampling_hz: u32,
    pulse_width_ns: u32,
    gauge_length_m: Vec<u32>,
    itu_channels: Vec<[u16; 2]>,
    launch_ma: Vec<u32>,
    receive_ma: Vec<u32>,
    dither: Vec<Option<(f64, f64)>>,
}

impl SimState {
    fn new(model: SimFiberModel, units: usize) -> Self {
        Self {
            model,
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

/// Build a connected simulated assembly: the acquisition side and the
/// control side share one plant.
pub fn sim_pair(model: SimFiberModel, units: usize) -> (SimAcquisition, SimControl) {
    assert!(units == 1 || units == 2);
    let state = Rc::new(RefCell::new(SimState::new(model, units)));
    let boards = (0..units as u32)
        .map(|k| BoardId {
            board_id: k + 1,
            system_id: 7,
        })
        .collect();
    let rate_table = state.borrow().model.rate_table.clone();
    (
        SimAcquisition {
            state: Rc::clone(&state),
            boards,
        },
        SimControl { state, rate_table },
    )
}

pub struct SimControl {
    state: Rc<RefCell<SimState>>,
    rate_table: Vec<RatePoint>,
}

impl Interrogator for SimControl {
    fn unit_count(&self) -> usize {
        self.state.borrow().launch_ma.len()
    }

    fn unit_name(&self, unit: usize) -> String {
        format!("CRI-4400 #{}", unit + 1)
    }

    fn sampling_frequency(&self) -> u32 {
        self.state.borrow().sampling_hz
    }

    fn set_sampling_frequency(&mut self, hz: u32) -> HwResult<()> {
        if !self.rate_table.iter().any(|p| p.sampling_hz == hz) {
            return Err(Box::new(HwError::Command(format!(
                "unsupported sampling frequency {hz} Hz"
            ))));
        }
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

pub struct SimAcquisition {
    state: Rc<RefCell<SimState>>,
    boards: Vec<BoardId>,
}

impl SimAcquisition {
    /// Assembly with explicit board enumeration, for consistency-check
    /// tests.
    pub fn with_boards(model: SimFiberModel, boards: Vec<BoardId>) -> Self {
        let units = boards.len();
        Self {
            state: Rc::new(RefCell::new(SimState::new(model, units.clamp(1, 2)))),
            boards,
        }
    }

    fn check_boards(&self) -> Result<(), HwError> {
        let master = self.boards.first().ok_or(HwError::MasterNotFirst)?;
        if master.board_id != 1 {
            return Err(HwError::MasterNotFirst);
        }
        for board in &self.boards[1..] {
            if board.system_id != master.system_id {
                return Err(HwError::SystemMismatch {
                    expected: master.system_id,
                    found: board.system_id,
                });
            }
        }
        Ok(())
    }
}

impl AcquisitionProvider for SimAcquisition {
    fn acquire(
        &mut self,
        first_channel: u32,
        last_channel: u32,
        duration_s: f64,
        laser: LaserSelector,
    ) -> HwResult<Acquisition> {
        self.check_boards()?;
        let state = self.state.borrow();
        if state.model.fail_with_timeout {
            return Err(Box::new(HwError::BufferTimeout {
                timeout_s: BUFFER_TIMEOUT_S,
            }));
        }
        let (first, last) = align_channel_range(first_channel, last_channel)?;
        let channels = (last - first + 1) as usize;
        let fs = f64::from(state.sampling_hz);
        let rows = ((duration_s * fs).round() as usize).max(1);
        let lanes = laser.lanes_per_channel();
        debug!(first, last, rows, "simulated acquisition");

        let mut rng = Xorshift::new(0x9E37_79B9);
        let mut blocks = Vec::with_capacity(self.boards.len());
        for unit in 0..self.boards.len() {
            let mut samples = Vec::with_capacity(rows * channels * lanes);
            for row in 0..rows {
                let t = row as f64 / fs;
                for ch_idx in 0..channels {
                    let ch = first + ch_idx as u32;
                    let m = magnitude(&state, unit, ch, &mut rng);
                    let phi = phase(&state, unit, ch, t, &mut rng);
                    let i = quantize(m * phi.cos());
                    let q = quantize(m * phi.sin());
                    for _ in 0..lanes / 2 {
                        samples.push(i);
                        samples.push(q);
                    }
                }
            }
            blocks.push(SampleBlock::new(rows, channels, lanes, samples));
        }
        Ok(Acquisition {
            blocks,
            first_channel: first,
            last_channel: last,
        })
    }
}

fn magnitude(state: &SimState, unit: usize, channel: u32, rng: &mut Xorshift) -> f64 {
    let model = &state.model;
    let active = model
        .regions
        .iter()
        .any(|&(s, e)| channel >= s && channel <= e);
    let launch = state.launch_ma[unit];
    if active && launch >= model.activity_launch_ma {
        let d = (f64::from(launch) - f64::from(model.optimum_launch_ma)) / 400.0;
        let shape = (1.0 - d * d).max(0.05);
        let receive_scale = f64::from(state.receive_ma[unit].max(1)) / 175.0;
        0.8 * shape * receive_scale
    } else {
        model.noise_level * (0.5 + rng.uniform())
    }
}

fn phase(state: &SimState, unit: usize, channel: u32, t: f64, rng: &mut Xorshift) -> f64 {
    let mut phi = 0.2 * (TAU * 50.0 * t + f64::from(channel)).sin() + 0.01 * rng.uniform();
    if let Some((amplitude_v, frequency_hz)) = state.dither[unit] {
        let rad = if channel <= state.model.fiber_end {
            amplitude_v * RAD_PER_VOLT
        } else {
            0.1
        };
        phi += rad * (TAU * frequency_hz * t).sin();
    }
    phi
}

fn quantize(v: f64) -> u16 {
    (v * 32768.0 + 32768.0).round().clamp(0.0, 65535.0) as u16
}

/// Small deterministic generator for the simulated noise floor.
#[derive(Debug)]
struct Xorshift(u64);

impl Xorshift {
    fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    /// Uniform in `[0, 1)`.
    fn uniform(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn master_must_enumerate_first() {
        let mut acq = SimAcquisition::with_boards(
            SimFiberModel::default(),
            vec![
                BoardId { board_id: 2, system_id: 7 },
                BoardId { board_id: 1, system_id: 7 },
            ],
        );
        let err = acq.acquire(1, 32, 0.01, LaserSelector::Both).unwrap_err();
        let hw = err.downcast_ref::<HwError>().unwrap();
        assert!(matches!(hw, HwError::MasterNotFirst));
    }

    #[test]
    fn mixed_systems_are_rejected() {
        let mut acq = SimAcquisition::with_boards(
            SimFiberModel::default(),
            vec![
                BoardId { board_id: 1, system_id: 7 },
                BoardId { board_id: 2, system_id: 9 },
            ],
        );
        let err = acq.acquire(1, 32, 0.01, LaserSelector::Both).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HwError>().unwrap(),
            HwError::SystemMismatch { expected: 7, found: 9 }
        ));
    }

    #[test]
    fn acquisition_reports_widened_bounds() {
        let (mut acq, _ctl) = sim_pair(SimFiberModel::default(), 1);
        let a = acq.acquire(10, 40, 0.01, LaserSelector::Both).unwrap();
        assert_eq!((a.first_channel, a.last_channel), (9, 40));
        assert_eq!(a.blocks.len(), 1);
        assert_eq!(a.blocks[0].channels, 32);
        assert_eq!(a.blocks[0].lanes_per_channel, 4);
    }

    #[test]
    fn dead_plant_times_out() {
        let model = SimFiberModel {
            fail_with_timeout: true,
            ..SimFiberModel::default()
        };
        let (mut acq, _ctl) = sim_pair(model, 1);
        let err = acq.acquire(1, 32, 0.01, LaserSelector::Both).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HwError>().unwrap(),
            HwError::BufferTimeout { .. }
        ));
    }
}
