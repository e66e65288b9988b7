//! Lane extraction and column-wise statistics over raw sample blocks.

use das_traits::{Acquisition, SampleBlock};

use crate::transform::median;

/// Normalized I/Q time series of one channel, one laser.
#[derive(Debug, Clone, Default)]
pub struct ChannelIq {
    pub i: Vec<f64>,
    pub q: Vec<f64>,
}

/// Per-channel columns of the element-wise maximum of both lasers' I (and
/// Q) lanes. For single-laser blocks this is simply that laser's lanes.
///
/// Returns `(i_columns, q_columns)`, each indexed `[channel][row]`.
pub fn combined_columns(block: &SampleBlock) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
    let mut i_cols = vec![Vec::with_capacity(block.rows); block.channels];
    let mut q_cols = vec![Vec::with_capacity(block.rows); block.channels];
    for ch in 0..block.channels {
        for row in 0..block.rows {
            let (iv, qv) = if block.lanes_per_channel >= 4 {
                (
                    block.value(row, ch, 0).max(block.value(row, ch, 2)),
                    block.value(row, ch, 1).max(block.value(row, ch, 3)),
                )
            } else {
                (block.value(row, ch, 0), block.value(row, ch, 1))
            };
            i_cols[ch].push(iv);
            q_cols[ch].push(qv);
        }
    }
    (i_cols, q_cols)
}

/// All lanes of one channel across every board of an acquisition, in board
/// order, laser 1 before laser 2.
pub fn channel_lanes(acquisition: &Acquisition, channel: usize) -> Vec<ChannelIq> {
    let mut lanes = Vec::new();
    for block in &acquisition.blocks {
        let lasers = block.lanes_per_channel / 2;
        for laser in 0..lasers {
            let mut lane = ChannelIq {
                i: Vec::with_capacity(block.rows),
                q: Vec::with_capacity(block.rows),
            };
            for row in 0..block.rows {
                lane.i.push(block.value(row, channel, 2 * laser));
                lane.q.push(block.value(row, channel, 2 * laser + 1));
            }
            lanes.push(lane);
        }
    }
    lanes
}

/// Per-channel median over time of the I/Q vector magnitude.
pub fn median_radius(i_cols: &[Vec<f64>], q_cols: &[Vec<f64>]) -> Vec<f64> {
    i_cols
        .iter()
        .zip(q_cols)
        .map(|(i, q)| {
            let mut r: Vec<f64> = i
                .iter()
                .zip(q)
                .map(|(&iv, &qv)| (iv * iv + qv * qv).sqrt())
                .collect();
            median(&mut r)
        })
        .collect()
}

pub fn rms(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    (values.iter().map(|&v| v * v).sum::<f64>() / values.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use das_traits::SampleBlock;

    fn raw(v: f64) -> u16 {
        (v * 32768.0 + 32768.0) as u16
    }

    #[test]
    fn combined_columns_takes_the_stronger_laser() {
        // one row, one channel, 4 lanes: laser 2 stronger on I, laser 1 on Q
        let block = SampleBlock::new(
            1,
            1,
            4,
            vec![raw(0.1), raw(0.4), raw(0.3), raw(0.2)],
        );
        let (i, q) = combined_columns(&block);
        assert!((i[0][0] - 0.3).abs() < 1e-3);
        assert!((q[0][0] - 0.4).abs() < 1e-3);
    }

    #[test]
    fn channel_lanes_splits_lasers_in_order() {
        let block = SampleBlock::new(
            2,
            1,
            4,
            vec![
                raw(0.1),
                raw(0.2),
                raw(0.3),
                raw(0.4),
                raw(0.5),
                raw(0.6),
                raw(0.7),
                raw(0.8),
            ],
        );
        let acq = Acquisition {
            blocks: vec![block],
            first_channel: 1,
            last_channel: 1,
        };
        let lanes = channel_lanes(&acq, 0);
        assert_eq!(lanes.len(), 2);
        assert!((lanes[0].i[1] - 0.5).abs() < 1e-3);
        assert!((lanes[1].q[0] - 0.4).abs() < 1e-3);
    }

    #[test]
    fn rms_of_constant_is_that_constant() {
        assert!((rms(&[2.0, 2.0, 2.0]) - 2.0).abs() < 1e-12);
    }
}
