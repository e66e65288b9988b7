//! Phase extraction and spectral estimators.
//!
//! The estimators reproduce the interrogator's established processing chain
//! exactly, including its single-sided scaling conventions, so results stay
//! comparable with historical measurement records.

use std::f64::consts::{PI, SQRT_2, TAU};

use rustfft::{FftPlanner, num_complex::Complex};

use crate::error::DasError;
use crate::iq::ChannelIq;

/// Photo-elastic scaling factor of standard single-mode fiber.
const PHOTO_ELASTIC: f64 = 0.78;

/// Center wavelength in nm for the ITU grid channels the laser cards ship
/// with.
pub fn itu_wavelength_nm(channel: u16) -> Option<f64> {
    let nm = match channel {
        35 => 1549.32,
        36 => 1548.51,
        37 => 1547.72,
        38 => 1546.92,
        39 => 1546.12,
        40 => 1545.32,
        41 => 1544.53,
        42 => 1543.73,
        43 => 1542.94,
        44 => 1542.14,
        45 => 1541.35,
        46 => 1540.56,
        47 => 1539.77,
        _ => return None,
    };
    Some(nm)
}

/// Unwrapped `atan2(Q, I)` phase of one channel.
pub fn unwrapped_phase(i: &[f64], q: &[f64]) -> Vec<f64> {
    debug_assert_eq!(i.len(), q.len());
    let mut out = Vec::with_capacity(i.len());
    let mut correction = 0.0;
    let mut prev = 0.0;
    for (k, (&iv, &qv)) in i.iter().zip(q).enumerate() {
        let raw = qv.atan2(iv);
        if k > 0 {
            let step = raw - prev;
            if step > PI {
                correction -= TAU;
            } else if step < -PI {
                correction += TAU;
            }
        }
        prev = raw;
        out.push(raw + correction);
    }
    out
}

/// Combine the lanes of one channel into a single phase series.
///
/// Each lane's first-differenced phase is weighted by its instantaneous
/// signal power `I² + Q² + 1e-4` (the floor keeps dead lanes from producing
/// NaNs), the weighted sum is normalized per sample, and the result is
/// re-integrated by cumulative sum. The first sample keeps each lane's
/// absolute phase, so the sum restores the absolute scale lost in
/// differencing.
pub fn weighted_phase_stack(lanes: &[ChannelIq]) -> Vec<f64> {
    let n = lanes.first().map_or(0, |l| l.i.len());
    if n == 0 {
        return Vec::new();
    }
    let mut num = vec![0.0; n];
    let mut den = vec![0.0; n];
    for lane in lanes {
        let phase = unwrapped_phase(&lane.i, &lane.q);
        for k in 0..n {
            let w = lane.i[k] * lane.i[k] + lane.q[k] * lane.q[k] + 1e-4;
            let d = if k == 0 { phase[0] } else { phase[k] - phase[k - 1] };
            num[k] += w * d;
            den[k] += w;
        }
    }
    let mut out = Vec::with_capacity(n);
    let mut acc = 0.0;
    for (nk, dk) in num.iter().zip(&den) {
        acc += nk / dk;
        out.push(acc);
    }
    out
}

/// Convert phase in radians to picostrain.
pub fn phase_to_strain(
    phase: &[f64],
    refractive_index: f64,
    itu_channel: u16,
    gauge_length_m: f64,
) -> Result<Vec<f64>, DasError> {
    let wavelength_nm = itu_wavelength_nm(itu_channel).ok_or_else(|| {
        DasError::Config(format!("laser ITU channel {itu_channel} is not on the supported grid"))
    })?;
    // nm over m leaves nanostrain; a further 1e3 yields picostrain.
    let scale =
        wavelength_nm / (4.0 * PI * refractive_index * gauge_length_m * PHOTO_ELASTIC) * 1e3;
    Ok(phase.iter().map(|&p| p * scale).collect())
}

fn fft(signal: &[f64]) -> Vec<Complex<f64>> {
    let mut planner = FftPlanner::new();
    let plan = planner.plan_fft_forward(signal.len());
    let mut buf: Vec<Complex<f64>> =
        signal.iter().map(|&x| Complex::new(x, 0.0)).collect();
    plan.process(&mut buf);
    buf
}

fn frequency_grid(half: usize, n: usize, fs: f64) -> Vec<f64> {
    (0..half).map(|k| k as f64 * fs / n as f64).collect()
}

/// Single-sided power spectral density, `(|X|/N)²` with doubling applied to
/// bins `1..N/2-2`. The last two single-sided bins stay undoubled; this
/// matches the historical estimator and must not be "fixed".
pub fn psd(signal: &[f64], fs: f64) -> (Vec<f64>, Vec<f64>) {
    let n = signal.len();
    let half = n / 2;
    let x = fft(signal);
    let mut p: Vec<f64> = x[..half]
        .iter()
        .map(|c| (c.norm() / n as f64).powi(2))
        .collect();
    for v in p.iter_mut().take(half.saturating_sub(2)).skip(1) {
        *v *= 2.0;
    }
    (p, frequency_grid(half, n, fs))
}

/// Single-sided periodogram, `|X|²/(N·fs)`, same doubling convention as
/// [`psd`].
pub fn periodogram(signal: &[f64], fs: f64) -> (Vec<f64>, Vec<f64>) {
    let n = signal.len();
    let half = n / 2;
    let x = fft(signal);
    let mut p: Vec<f64> = x[..half]
        .iter()
        .map(|c| c.norm_sqr() / (n as f64 * fs))
        .collect();
    for v in p.iter_mut().take(half.saturating_sub(2)).skip(1) {
        *v *= 2.0;
    }
    (p, frequency_grid(half, n, fs))
}

/// Remove the least-squares linear trend.
pub fn detrend(signal: &[f64]) -> Vec<f64> {
    let n = signal.len();
    if n < 2 {
        return signal.to_vec();
    }
    let nf = n as f64;
    let x_mean = (nf - 1.0) / 2.0;
    let y_mean = signal.iter().sum::<f64>() / nf;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (k, &y) in signal.iter().enumerate() {
        let dx = k as f64 - x_mean;
        sxy += dx * (y - y_mean);
        sxx += dx * dx;
    }
    let slope = sxy / sxx;
    signal
        .iter()
        .enumerate()
        .map(|(k, &y)| y - (y_mean + slope * (k as f64 - x_mean)))
        .collect()
}

/// 4-term Blackman-Harris window.
pub fn blackman_harris(n: usize) -> Vec<f64> {
    const A: [f64; 4] = [0.35875, 0.48829, 0.14128, 0.01168];
    if n == 1 {
        return vec![1.0];
    }
    let denom = (n - 1) as f64;
    (0..n)
        .map(|k| {
            let t = TAU * k as f64 / denom;
            A[0] - A[1] * t.cos() + A[2] * (2.0 * t).cos() - A[3] * (3.0 * t).cos()
        })
        .collect()
}

/// SEAFOM-style single-sided amplitude spectrum: linear detrend, normalized
/// Blackman-Harris window scaled by `fs/Σw`, `√2` single-sided scaling, and
/// noise-equivalent-bandwidth correction.
pub fn standard_fft(signal: &[f64], fs: f64) -> (Vec<f64>, Vec<f64>) {
    let n = signal.len();
    let half = n / 2;
    let detrended = detrend(signal);
    let w = blackman_harris(n);
    let w_sum: f64 = w.iter().sum();
    let w_sq_sum: f64 = w.iter().map(|&v| v * v).sum();
    let norm = fs / w_sum;
    let windowed: Vec<f64> = detrended
        .iter()
        .zip(&w)
        .map(|(&s, &wv)| s * wv * norm)
        .collect();
    let x = fft(&windowed);
    let neb = (n as f64 * w_sq_sum / (w_sum * w_sum)).sqrt();
    let mag: Vec<f64> = x[..half]
        .iter()
        .map(|c| SQRT_2 * c.norm() / n as f64 / neb)
        .collect();
    (mag, frequency_grid(half, n, fs))
}

/// Boxcar decimation: non-overlapping means of `factor` samples. A factor
/// of 0 or 1 returns the input unchanged; a trailing partial window is
/// dropped.
pub fn boxcar_decimate(signal: &[f64], factor: usize) -> Vec<f64> {
    if factor <= 1 {
        return signal.to_vec();
    }
    signal
        .chunks_exact(factor)
        .map(|c| c.iter().sum::<f64>() / factor as f64)
        .collect()
}

/// Median filter with an odd window, zero-padded at the edges.
pub fn median_filter(signal: &[f64], window: usize) -> Vec<f64> {
    debug_assert!(window % 2 == 1);
    let half = window / 2;
    let n = signal.len();
    let mut scratch = Vec::with_capacity(window);
    (0..n)
        .map(|k| {
            scratch.clear();
            for j in 0..window {
                let idx = k as isize + j as isize - half as isize;
                if idx < 0 || idx as usize >= n {
                    scratch.push(0.0);
                } else {
                    scratch.push(signal[idx as usize]);
                }
            }
            median(&mut scratch)
        })
        .collect()
}

/// Median of a scratch slice (averages the middle pair for even lengths).
pub fn median(values: &mut [f64]) -> f64 {
    debug_assert!(!values.is_empty());
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) / 2.0
    }
}

#[inline]
pub fn power_db(p: f64) -> f64 {
    10.0 * p.log10()
}

#[inline]
pub fn amplitude_db(a: f64) -> f64 {
    20.0 * a.log10()
}
