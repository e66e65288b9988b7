use das_core::config::{DitherCfg, FiberCfg};
use das_core::fiber::{FiberMap, FiberSensingRegion, fiber_end_from_amplitudes, regions_from_radius};
use rstest::rstest;

fn profile(len: usize, active: &[(usize, usize)]) -> Vec<f64> {
    // inactive channels carry a small alternating ripple so the tail-based
    // threshold is nonzero
    let mut radius: Vec<f64> = (0..len)
        .map(|k| if k % 2 == 0 { 0.0009 } else { 0.0011 })
        .collect();
    for &(start, end) in active {
        for r in radius.iter_mut().take(end).skip(start - 1) {
            *r = 0.5;
        }
    }
    radius
}

#[test]
fn a_single_span_yields_one_region() {
    // channels 100..=4000 active, 50 inactive margin channels at the tail
    let radius = profile(4050, &[(100, 4000)]);
    let map = regions_from_radius(&radius, 1, &FiberCfg::default());
    assert_eq!(
        map.regions(),
        &[FiberSensingRegion { start: 100, end: 4000 }]
    );
}

#[test]
fn spans_closer_than_the_gap_threshold_merge() {
    let radius = profile(4050, &[(50, 100), (150, 4000)]);
    let map = regions_from_radius(&radius, 1, &FiberCfg::default());
    assert_eq!(map.regions(), &[FiberSensingRegion { start: 50, end: 4000 }]);
}

#[test]
fn distant_spans_stay_separate() {
    let radius = profile(2050, &[(50, 100), (600, 2000)]);
    let map = regions_from_radius(&radius, 1, &FiberCfg::default());
    assert_eq!(
        map.regions(),
        &[
            FiberSensingRegion { start: 50, end: 100 },
            FiberSensingRegion { start: 600, end: 2000 },
        ]
    );
}

#[test]
fn first_channel_offsets_the_numbering() {
    let radius = profile(1050, &[(100, 1000)]);
    let map = regions_from_radius(&radius, 201, &FiberCfg::default());
    assert_eq!(
        map.regions(),
        &[FiberSensingRegion { start: 300, end: 1200 }]
    );
}

#[test]
fn an_all_quiet_profile_yields_an_empty_map() {
    let radius = profile(500, &[]);
    let map = regions_from_radius(&radius, 1, &FiberCfg::default());
    assert!(map.is_empty());
}

#[rstest]
#[case(vec![(1, 10), (50, 60), (500, 700)], 100)]
#[case(vec![(1, 10), (50, 60), (500, 700)], 1000)]
#[case(vec![(5, 5)], 200)]
fn merging_is_idempotent(#[case] spans: Vec<(u32, u32)>, #[case] gap: u32) {
    let map = FiberMap::new(
        spans
            .into_iter()
            .map(|(start, end)| FiberSensingRegion { start, end })
            .collect(),
    );
    let once = map.merged(gap);
    assert_eq!(once.merged(gap), once);
}

#[test]
fn the_end_scan_backs_off_by_the_pulse_width() {
    let cfg = DitherCfg::default();
    let mut amps = vec![2.0; 30];
    amps.extend(vec![0.1; 20]);
    // run starts at index 30; threshold is 0.75 * 2.0 V
    assert_eq!(fiber_end_from_amplitudes(&amps, 1, 7, &cfg), Some(23));
    assert_eq!(fiber_end_from_amplitudes(&amps, 100, 7, &cfg), Some(122));
}

#[test]
fn a_short_dropout_does_not_end_the_fiber() {
    let cfg = DitherCfg::default();
    let mut amps = vec![2.0; 50];
    // three quiet channels survive the median filter but not the run test
    for a in amps.iter_mut().take(23).skip(20) {
        *a = 0.1;
    }
    assert_eq!(fiber_end_from_amplitudes(&amps, 1, 7, &cfg), None);
}

#[test]
fn an_end_near_the_window_start_clamps_to_channel_one() {
    let cfg = DitherCfg::default();
    let amps = vec![0.1; 20];
    assert_eq!(fiber_end_from_amplitudes(&amps, 1, 7, &cfg), Some(1));
}
