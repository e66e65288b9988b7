use std::cell::RefCell;
use std::rc::Rc;

use das_core::amplifier::{initialize_launch, optimize_launch, optimize_receive};
use das_core::config::AmplifierCfg;
use das_core::error::DasError;
use das_core::mocks::{FnAcquisition, TableControl, acquisition_single_board, block_both_lasers};
use das_traits::Interrogator;

fn flat_block(channels: usize, rows: usize, level: f64) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
    (
        vec![vec![level; rows]; channels],
        vec![vec![0.0; rows]; channels],
    )
}

#[test]
fn seed_search_stops_at_the_activity_jump() {
    let mut control = TableControl::new(1);
    let handle = control.handle();
    let mut acq = FnAcquisition(move |first: u32, last: u32, _dur, _laser| {
        let launch = handle.borrow().launch_ma[0];
        let level = if launch >= 150 { 0.3 } else { 0.01 };
        let channels = (last - first + 1) as usize;
        let (i, q) = flat_block(channels, 2, level);
        Ok(acquisition_single_board(first, block_both_lasers(&i, &q)))
    });

    let cfg = AmplifierCfg::default();
    let (launch, receive) = initialize_launch(&mut acq, &mut control, 0, &cfg).unwrap();
    assert_eq!(launch, 150);
    assert_eq!(receive, 200);
    let handle = control.handle();
    assert_eq!(handle.borrow().launch_ma[0], 150);
    assert_eq!(handle.borrow().receive_ma[0], 200);
}

#[test]
fn seed_search_probes_above_the_seed_only() {
    let mut control = TableControl::new(1);
    let handle = control.handle();
    let probed = Rc::new(RefCell::new(Vec::new()));
    let probed_in = Rc::clone(&probed);
    let mut acq = FnAcquisition(move |first: u32, last: u32, _dur, _laser| {
        let launch = handle.borrow().launch_ma[0];
        probed_in.borrow_mut().push(launch);
        let level = if launch >= 130 { 0.3 } else { 0.01 };
        let channels = (last - first + 1) as usize;
        let (i, q) = flat_block(channels, 2, level);
        Ok(acquisition_single_board(first, block_both_lasers(&i, &q)))
    });

    let cfg = AmplifierCfg::default();
    let (launch, _receive) = initialize_launch(&mut acq, &mut control, 0, &cfg).unwrap();
    assert_eq!(launch, 130);
    // the 100 mA seed is set but never probed; readings start one step up
    assert_eq!(*probed.borrow(), vec![110, 120, 130]);
}

#[test]
fn a_dark_fiber_hits_the_ceiling() {
    let mut control = TableControl::new(1);
    let mut acq = FnAcquisition(move |first: u32, last: u32, _dur, _laser| {
        let channels = (last - first + 1) as usize;
        let (i, q) = flat_block(channels, 2, 0.01);
        Ok(acquisition_single_board(first, block_both_lasers(&i, &q)))
    });

    let err = initialize_launch(&mut acq, &mut control, 0, &AmplifierCfg::default()).unwrap_err();
    let das = err.downcast_ref::<DasError>().unwrap();
    assert!(matches!(das, DasError::HardwareFault(_)));
    assert_eq!(control.sampling_frequency(), 1600);
}

#[test]
fn launch_sweep_reports_the_backscatter_peak() {
    let mut control = TableControl::new(1);
    let handle = control.handle();
    let mut acq = FnAcquisition(move |first: u32, last: u32, _dur, _laser| {
        let launch = f64::from(handle.borrow().launch_ma[0]);
        let level = 1.0 - ((launch - 400.0) / 500.0).powi(2);
        let channels = (last - first + 1) as usize;
        let (i, q) = flat_block(channels, 2, level);
        Ok(acquisition_single_board(first, block_both_lasers(&i, &q)))
    });

    let cfg = AmplifierCfg::default();
    let (optimum, figure) = optimize_launch(&mut acq, &mut control, 0, 150, 1, 300, &cfg).unwrap();
    assert_eq!(optimum, 400);
    assert!(
        figure
            .annotations
            .iter()
            .any(|a| a.label.contains("Optimal Launch EDFA Current: 400 mA"))
    );
}

#[test]
fn receive_descent_stops_strictly_below_the_target_ratio() {
    let mut control = TableControl::new(1);
    let handle = control.handle();
    let mut acq = FnAcquisition(move |first: u32, _last: u32, _dur, _laser| {
        let receive = handle.borrow().receive_ma[0];
        // first 500-channel block saturates proportionally to the gain
        let saturated = (receive.saturating_sub(100) as usize * 5).min(500);
        let mut i = vec![vec![0.1]; 1000];
        for col in i.iter_mut().take(saturated) {
            col[0] = 0.9;
        }
        let q = vec![vec![0.0]; 1000];
        Ok(acquisition_single_board(first, block_both_lasers(&i, &q)))
    });

    let cfg = AmplifierCfg::default();
    let (receive, _figure) = optimize_receive(&mut acq, &mut control, 0, 1, 1000, &cfg).unwrap();
    // the ratio at 102 mA equals the 0.02 target exactly and must not stop
    // the descent; 101 mA is the first current strictly below it
    assert_eq!(receive, 101);
}

#[test]
fn a_saturated_floor_is_a_hardware_fault() {
    let mut control = TableControl::new(1);
    let mut acq = FnAcquisition(move |first: u32, _last, _dur, _laser| {
        let (i, q) = flat_block(1000, 1, 0.95);
        Ok(acquisition_single_board(first, block_both_lasers(&i, &q)))
    });

    let err =
        optimize_receive(&mut acq, &mut control, 0, 1, 1000, &AmplifierCfg::default()).unwrap_err();
    let das = err.downcast_ref::<DasError>().unwrap();
    assert!(matches!(das, DasError::HardwareFault(_)));
}
