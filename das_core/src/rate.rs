//! Pulse-repetition-rate selection against the hardware rate table.

use das_traits::RatePoint;
use tracing::debug;

use crate::error::DasError;
use crate::fiber::FiberMap;

/// Smallest tabulated period strictly greater than the channel demand.
pub fn period_above(table: &[RatePoint], channels: f64) -> Option<u32> {
    table
        .iter()
        .find(|p| f64::from(p.min_period) > channels)
        .map(|p| p.min_period)
}

/// Largest tabulated period strictly smaller than the channel demand, or 0
/// when every period is at least as large.
pub fn period_below(table: &[RatePoint], channels: f64) -> u32 {
    table
        .iter()
        .rev()
        .find(|p| f64::from(p.min_period) < channels)
        .map_or(0, |p| p.min_period)
}

/// Sampling frequency for an exact tabulated period.
pub fn frequency_for_period(table: &[RatePoint], period: u32) -> Option<u32> {
    table
        .iter()
        .find(|p| p.min_period == period)
        .map(|p| p.sampling_hz)
}

/// Channel capacity (period) for an exact tabulated sampling frequency.
pub fn capacity_for_frequency(table: &[RatePoint], hz: u32) -> Option<u32> {
    table
        .iter()
        .find(|p| p.sampling_hz == hz)
        .map(|p| p.min_period)
}

/// Pick the highest sampling frequency whose pulse period still covers the
/// sensing fiber without a pulse ambiguity inside any active region.
///
/// A single region needs one pulse in flight per period covering its span.
/// With multiple regions, extra pulses may ride in the dead zone between
/// the first region and the rest, as long as no pulse boundary lands inside
/// an active span; the pulse count shrinks until the period window closes.
pub fn optimize(map: &FiberMap, table: &[RatePoint]) -> Result<u32, DasError> {
    let regions = map.regions();
    let (first, last) = match (map.first(), map.last()) {
        (Some(f), Some(l)) => (f, l),
        _ => return Err(DasError::State("rate optimization requires a fiber map".into())),
    };

    let covered = if regions.len() == 1 {
        f64::from(last.end - first.start + 1)
    } else {
        f64::from(first.end - first.start + 1) + f64::from(last.end - regions[1].start + 1)
    };

    let period = if regions.len() == 1 {
        period_above(table, covered).ok_or_else(|| too_long(covered))?
    } else {
        let outer_period = period_above(table, covered).ok_or_else(|| too_long(covered))?;
        let mut pulses = last.end / outer_period;
        loop {
            let span = f64::from(last.end - first.start) / (pulses + 1) as f64;
            let min_period = period_above(table, span).ok_or_else(|| too_long(span))?;
            let max_period = if pulses > 0 {
                period_below(table, f64::from(regions[1].start - first.end) / pulses as f64)
            } else {
                min_period
            };
            if max_period >= min_period {
                break min_period;
            }
            pulses -= 1;
        }
    };

    let hz = frequency_for_period(table, period)
        .ok_or_else(|| DasError::Config(format!("period {period} missing from the rate table")))?;
    debug!(period, hz, "pulse repetition rate selected");
    Ok(hz)
}

fn too_long(channels: f64) -> DasError {
    DasError::Config(format!(
        "sensing fiber needs {channels:.0} channels, beyond the largest supported pulse period"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Vec<RatePoint> {
        [(2400, 40000), (3025, 32000), (3900, 25000), (4900, 20000)]
            .into_iter()
            .map(|(min_period, sampling_hz)| RatePoint {
                min_period,
                sampling_hz,
            })
            .collect()
    }

    #[test]
    fn period_lookups_are_strict() {
        let t = table();
        assert_eq!(period_above(&t, 3900.0), Some(4900));
        assert_eq!(period_above(&t, 3899.0), Some(3900));
        assert_eq!(period_below(&t, 2400.0), 0);
        assert_eq!(period_below(&t, 2401.0), 2400);
    }
}
