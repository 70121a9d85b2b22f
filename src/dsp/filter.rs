//! Overlap-add FFT lowpass.
//!
//! Each raw block is Hann-windowed and convolved with a sinc kernel. A
//! second, half-block-shifted window straddles the previous and current
//! raw blocks, and the two convolutions are summed where they overlap.

use super::fft::Spectrum;
use super::window::{hann, sinc_lowpass};

/// Kernel amplitude used by the streaming engine.
pub const KERNEL_AMPLITUDE: f64 = 600.0;
/// Kernel cutoff constant used by the streaming engine.
pub const KERNEL_CUTOFF: f64 = 4000.0;

/// Block-based lowpass with 50% overlap-add reconstruction.
#[derive(Debug, Clone)]
pub struct OverlapAddFilter {
    n: usize,
    window: Vec<f64>,
    kernel: Spectrum,

    /// Previous raw block.
    prev_raw: Vec<f64>,
    /// Convolution of the previous windowed raw block.
    prev_conv: Vec<f64>,
    /// Convolution of the current windowed raw block.
    conv: Vec<f64>,
    /// Straddling windowed buffer.
    windowed: Vec<f64>,
    out: Vec<f64>,
    scratch: Vec<f64>,
}

impl OverlapAddFilter {
    /// Filter with the engine's default kernel.
    pub fn new(n: usize) -> Self {
        Self::with_kernel(n, KERNEL_AMPLITUDE, KERNEL_CUTOFF)
    }

    /// # Panics
    ///
    /// Panics if `n` is not a power of two of at least 2.
    pub fn with_kernel(n: usize, amplitude: f64, cutoff: f64) -> Self {
        assert!(
            n >= 2 && n.is_power_of_two(),
            "block size must be a power of two >= 2, got {n}"
        );
        OverlapAddFilter {
            n,
            window: hann(n),
            kernel: Spectrum::new(&sinc_lowpass(n, amplitude, cutoff)),
            prev_raw: vec![0.0; n],
            prev_conv: vec![0.0; n],
            conv: vec![0.0; n],
            windowed: vec![0.0; n],
            out: vec![0.0; n],
            scratch: Vec::with_capacity(n),
        }
    }

    pub fn block_size(&self) -> usize {
        self.n
    }

    /// Filter the next raw block. The returned slice is valid until the
    /// next call.
    ///
    /// # Panics
    ///
    /// Panics if `raw.len()` differs from the block size.
    pub fn process(&mut self, raw: &[f64]) -> &[f64] {
        let n = self.n;
        let half = n / 2;
        assert_eq!(raw.len(), n, "raw block must be exactly {n} samples");

        // Current block, fully windowed
        for i in 0..n {
            self.windowed[i] = self.window[i] * raw[i];
        }
        self.kernel
            .convolve_into(&mut self.conv, &self.windowed, &mut self.scratch);

        // Block straddling the previous and current raw blocks
        for i in 0..half {
            self.windowed[i] = self.window[i] * self.prev_raw[i + half];
        }
        for i in half..n {
            self.windowed[i] = self.window[i] * raw[i - half];
        }
        self.kernel
            .convolve_into(&mut self.out, &self.windowed, &mut self.scratch);

        for i in 0..half {
            self.out[i] += self.prev_conv[i + half];
        }
        for i in half..n {
            self.out[i] += self.conv[i - half];
        }

        self.prev_raw.copy_from_slice(raw);
        std::mem::swap(&mut self.prev_conv, &mut self.conv);

        &self.out
    }

    /// Forget all history, as if no block had been processed.
    pub fn reset(&mut self) {
        self.prev_raw.fill(0.0);
        self.prev_conv.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn tone(freq: f64, start: usize, n: usize) -> Vec<f64> {
        (start..start + n)
            .map(|i| (2.0 * PI * freq * i as f64 / 44100.0).sin())
            .collect()
    }

    fn steady_peak(freq: f64) -> f64 {
        let n = 4096;
        // Same cutoff relative to the sample rate as the 16384-sample engine kernel
        let mut filter = OverlapAddFilter::with_kernel(n, KERNEL_AMPLITUDE, KERNEL_CUTOFF / 4.0);
        let mut peak = 0.0_f64;
        for b in 0..4 {
            let out = filter.process(&tone(freq, b * n, n));
            if b >= 2 {
                peak = out.iter().fold(peak, |m, v| m.max(v.abs()));
            }
        }
        peak
    }

    #[test]
    fn silence_stays_silent() {
        let mut filter = OverlapAddFilter::new(1024);
        let zeros = vec![0.0; 1024];
        for _ in 0..3 {
            let out = filter.process(&zeros);
            assert!(out.iter().all(|&s| s == 0.0));
        }
    }

    #[test]
    fn passes_low_and_attenuates_high() {
        let low = steady_peak(440.0);
        let high = steady_peak(15000.0);
        assert!(low > 0.0, "low tone should pass");
        // The kernel has no centre tap, so a constant fraction leaks above cutoff
        assert!(
            high < low * 0.6,
            "15 kHz should be attenuated: low={low}, high={high}"
        );
    }

    #[test]
    fn output_is_finite() {
        let n = 2048;
        let mut filter = OverlapAddFilter::new(n);
        let impulse: Vec<f64> = (0..n).map(|i| if i % 100 == 0 { 1.0 } else { 0.0 }).collect();
        for _ in 0..3 {
            assert!(filter.process(&impulse).iter().all(|s| s.is_finite()));
        }
    }

    #[test]
    fn reset_clears_history() {
        let n = 256;
        let mut filter = OverlapAddFilter::new(n);
        filter.process(&vec![1.0; n]);
        filter.reset();
        let mut fresh = OverlapAddFilter::new(n);
        let block = tone(440.0, 0, n);
        let a = filter.process(&block).to_vec();
        let b = fresh.process(&block).to_vec();
        for i in 0..n {
            assert!((a[i] - b[i]).abs() < 1e-9);
        }
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn rejects_odd_block_size() {
        OverlapAddFilter::new(1000);
    }
}
