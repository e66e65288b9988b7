use std::f64::consts::TAU;

use das_core::config::NoiseCfg;
use das_core::mocks::{
    FnAcquisition, LastProgress, TableControl, acquisition_single_board, block_both_lasers,
};
use das_core::noise::{internal_noise_floor, seafom_noise_floor};

struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> f64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64 - 0.5
    }
}

/// Phase-modulated I/Q with a broadband jitter floor, so every spectral bin
/// is nonzero.
fn noisy_acquisition(first: u32, last: u32, rows: usize, fs: f64) -> das_traits::Acquisition {
    let channels = (last - first + 1) as usize;
    let mut rng = Lcg(42);
    let mut i_cols = vec![Vec::with_capacity(rows); channels];
    let mut q_cols = vec![Vec::with_capacity(rows); channels];
    for (ch, (i_col, q_col)) in i_cols.iter_mut().zip(&mut q_cols).enumerate() {
        for row in 0..rows {
            let t = row as f64 / fs;
            let phi = 0.5 * (TAU * 300.0 * t).sin()
                + 0.3 * (TAU * 77.0 * t + ch as f64).sin()
                + 0.05 * rng.next();
            i_col.push(0.5 * phi.cos());
            q_col.push(0.5 * phi.sin());
        }
    }
    acquisition_single_board(first, block_both_lasers(&i_cols, &q_cols))
}

fn small_cfg() -> NoiseCfg {
    NoiseCfg {
        test_duration_s: 2,
        first_channel: 1,
        last_channel: 8,
        seafom_windows: vec![(1, 8)],
        ..NoiseCfg::default()
    }
}

#[test]
fn internal_procedure_reduces_to_one_median_per_lane() {
    let control = TableControl::new(1);
    let mut progress = LastProgress::default();
    let mut acq = FnAcquisition(|first: u32, last: u32, _dur, _laser| {
        Ok(noisy_acquisition(first, last, 1600, 1600.0))
    });

    let outcome =
        internal_noise_floor(&mut acq, &control, &mut progress, &small_cfg()).unwrap();
    assert_eq!(
        outcome.lane_labels,
        vec!["DAS-1 Laser 1", "DAS-1 Laser 2", "DAS-1 Laser 1+2"]
    );
    assert_eq!(outcome.lane_medians_db.len(), 3);
    assert!(outcome.lane_medians_db.iter().all(|m| m.is_finite()));
    assert_eq!(outcome.figures.len(), 3);
    // every lane collected seconds * channels measurements
    assert_eq!(outcome.figures[0].series[0].y.len(), 2 * 8);
    assert!((progress.last - 1.0).abs() < 1e-12);
}

#[test]
fn seafom_procedure_yields_a_triple_per_window() {
    let control = TableControl::new(1);
    let mut progress = LastProgress::default();
    let mut acq = FnAcquisition(|first: u32, last: u32, _dur, _laser| {
        Ok(noisy_acquisition(first, last, 1600, 1600.0))
    });

    let outcomes = seafom_noise_floor(&mut acq, &control, &mut progress, &small_cfg()).unwrap();
    assert_eq!(outcomes.len(), 1);
    let outcome = &outcomes[0];
    assert_eq!(outcome.window, (1, 8));
    assert!(outcome.lane_medians_db.iter().all(|m| m.is_finite()));
    assert_eq!(outcome.figure.series.len(), 3);
    // single-sided spectrum of a one-second record
    assert_eq!(outcome.figure.series[0].y.len(), 800);
    assert!((progress.last - 1.0).abs() < 1e-12);
}
