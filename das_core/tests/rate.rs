use das_core::error::DasError;
use das_core::fiber::{FiberMap, FiberSensingRegion};
use das_core::mocks::standard_rate_table;
use das_core::rate::optimize;
use rstest::rstest;

fn map(spans: &[(u32, u32)]) -> FiberMap {
    FiberMap::new(
        spans
            .iter()
            .map(|&(start, end)| FiberSensingRegion { start, end })
            .collect(),
    )
}

#[rstest]
#[case(&[(100, 4000)], 20000)] // 3901 channels fit the 4900 period
#[case(&[(1, 2400)], 32000)] // exactly 2400 channels need the next period up
#[case(&[(1, 2399)], 40000)]
#[case(&[(1, 60000)], 1600)]
fn single_region_rates(#[case] spans: &[(u32, u32)], #[case] expected_hz: u32) {
    assert_eq!(optimize(&map(spans), &standard_rate_table()).unwrap(), expected_hz);
}

#[test]
fn distant_regions_ride_extra_pulses_in_the_dead_zone() {
    // covered: 1000 + 501 = 1501 channels; one extra pulse fails the
    // dead-zone bound, so the span collapses to a single-pulse period
    let m = map(&[(1, 1000), (3000, 3500)]);
    assert_eq!(optimize(&m, &standard_rate_table()).unwrap(), 25000);
}

#[test]
fn multi_region_with_a_wide_dead_zone_keeps_the_extra_pulse() {
    // covered: 2000 + 1001 = 3001 channels; two pulses ride the
    // 18000-channel dead zone, cutting the effective span to a third
    let m = map(&[(1, 2000), (20000, 21000)]);
    assert_eq!(optimize(&m, &standard_rate_table()).unwrap(), 12500);
}

#[test]
fn demand_beyond_the_table_is_a_config_error() {
    let err = optimize(&map(&[(1, 70000)]), &standard_rate_table()).unwrap_err();
    assert!(matches!(err, DasError::Config(_)));
}

#[test]
fn an_empty_map_is_a_state_error() {
    let err = optimize(&FiberMap::default(), &standard_rate_table()).unwrap_err();
    assert!(matches!(err, DasError::State(_)));
}
