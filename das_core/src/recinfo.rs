//! Recording metadata written alongside every raw data capture.

use das_traits::Interrogator;

/// Sidecar description of a recording, rendered as one value per line in a
/// fixed order the downstream processing tools rely on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingInfo {
    pub interrogator_count: usize,
    pub first_channel: u32,
    pub last_channel: u32,
    pub sampling_hz: u32,
    pub gauge_length_m: u32,
    /// Laser ITU channel pair per assembly unit.
    pub itu_channels: Vec<[u16; 2]>,
}

impl RecordingInfo {
    pub fn from_system<I: Interrogator>(control: &I, first_channel: u32, last_channel: u32) -> Self {
        let itu_channels = (0..control.unit_count())
            .map(|unit| control.laser_itu_channels(unit))
            .collect();
        Self {
            interrogator_count: control.unit_count(),
            first_channel,
            last_channel,
            sampling_hz: control.sampling_frequency(),
            gauge_length_m: control.gauge_length_m(0),
            itu_channels,
        }
    }

    /// Line order: unit count, first channel, last channel, sampling
    /// frequency, gauge length, then each unit's two ITU channels.
    pub fn render(&self) -> String {
        let mut out = format!(
            "{}\n{}\n{}\n{}\n{}",
            self.interrogator_count,
            self.first_channel,
            self.last_channel,
            self.sampling_hz,
            self.gauge_length_m,
        );
        for itu in &self.itu_channels {
            out.push_str(&format!("\n{}\n{}", itu[0], itu[1]));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_keeps_the_line_order() {
        let info = RecordingInfo {
            interrogator_count: 2,
            first_channel: 1,
            last_channel: 4000,
            sampling_hz: 20000,
            gauge_length_m: 10,
            itu_channels: vec![[35, 37], [39, 41]],
        };
        assert_eq!(info.render(), "2\n1\n4000\n20000\n10\n35\n37\n39\n41");
    }
}
