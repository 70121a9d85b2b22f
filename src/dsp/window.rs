//! Window and kernel tables for the block filter.

use std::f64::consts::PI;

/// Hann window of length `n`, reaching zero at both ends.
pub fn hann(n: usize) -> Vec<f64> {
    if n < 2 {
        return vec![1.0; n];
    }
    let denom = (n - 1) as f64;
    (0..n)
        .map(|i| {
            let v = (PI * i as f64 / denom).sin();
            v * v
        })
        .collect()
}

/// One-sided sinc lowpass kernel of length `n`.
///
/// `amplitude` scales the kernel; `cutoff` sets how many half-periods of
/// the sinc fit in the table, so the cutoff frequency is roughly
/// `cutoff / (2 * (n + 1))` of the sample rate.
pub fn sinc_lowpass(n: usize, amplitude: f64, cutoff: f64) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let x = cutoff * PI * (i + 1) as f64 / (n + 1) as f64;
            amplitude * x.sin() / x
        })
        .collect()
}
