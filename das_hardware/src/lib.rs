//! Hardware layer for DAS interrogator assemblies.
//!
//! Currently ships the simulated assembly in [`sim`]; a vendor-backed
//! implementation plugs in behind the same `das_traits` contracts. The
//! channel alignment rules and the factory rate table live here because
//! they are properties of the digitizer, not of the algorithms.

pub mod error;
pub mod sim;

pub use error::HwError;

use das_traits::RatePoint;

/// Seconds an acquisition waits for each DMA buffer before giving up.
pub const BUFFER_TIMEOUT_S: u64 = 5;

/// Factory pulse-period rate table of the CRI-4400 assembly, ordered by
/// ascending period. The period doubles as the channel capacity at that
/// sampling frequency.
pub const FACTORY_RATE_TABLE: [RatePoint; 13] = [
    RatePoint { min_period: 2400, sampling_hz: 40000 },
    RatePoint { min_period: 3025, sampling_hz: 32000 },
    RatePoint { min_period: 3900, sampling_hz: 25000 },
    RatePoint { min_period: 4900, sampling_hz: 20000 },
    RatePoint { min_period: 6150, sampling_hz: 16000 },
    RatePoint { min_period: 7900, sampling_hz: 12500 },
    RatePoint { min_period: 9900, sampling_hz: 10000 },
    RatePoint { min_period: 12400, sampling_hz: 8000 },
    RatePoint { min_period: 19900, sampling_hz: 5000 },
    RatePoint { min_period: 24900, sampling_hz: 4000 },
    RatePoint { min_period: 31150, sampling_hz: 3200 },
    RatePoint { min_period: 49900, sampling_hz: 2000 },
    RatePoint { min_period: 62400, sampling_hz: 1600 },
];

/// Widen requested channel bounds to what the digitizer DMA engine can
/// address: the zero-based offset is a multiple of 8 and the span a
/// multiple of 32. Returns the effective inclusive bounds.
pub fn align_channel_range(first: u32, last: u32) -> Result<(u32, u32), HwError> {
    if first == 0 || last < first {
        return Err(HwError::InvalidChannelRange { first, last });
    }
    let offset = (first - 1) & !7;
    let span = (last - offset).div_ceil(32) * 32;
    Ok((offset + 1, offset + span))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, 32, (1, 32))]
    #[case(1, 33, (1, 64))]
    #[case(9, 40, (9, 40))]
    #[case(10, 40, (9, 40))]
    #[case(20, 220, (17, 240))]
    #[case(65, 96, (65, 96))]
    #[case(401, 700, (401, 720))]
    fn alignment_widens_to_8_and_32(
        #[case] first: u32,
        #[case] last: u32,
        #[case] expected: (u32, u32),
    ) {
        assert_eq!(align_channel_range(first, last).unwrap(), expected);
    }

    #[test]
    fn degenerate_bounds_are_rejected() {
        assert!(matches!(
            align_channel_range(0, 10),
            Err(HwError::InvalidChannelRange { .. })
        ));
        assert!(matches!(
            align_channel_range(10, 9),
            Err(HwError::InvalidChannelRange { .. })
        ));
    }
}
