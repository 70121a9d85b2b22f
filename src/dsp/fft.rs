//! Radix-2 FFT and frequency-domain convolution.
//!
//! Transforms run in place on parallel real/imaginary slices. The forward
//! transform scales by `1/N`; the inverse does not, so a forward/inverse
//! pair reconstructs its input.

use std::f64::consts::PI;

/// Direction of a transform.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Direction {
    Forward,
    Inverse,
}

/// In-place iterative Cooley–Tukey transform.
fn transform(direction: Direction, re: &mut [f64], im: &mut [f64]) {
    let n = re.len();
    assert_eq!(n, im.len(), "real and imaginary parts must have equal length");
    assert!(
        n.is_power_of_two(),
        "transform length must be a power of two, got {n}"
    );
    if n < 2 {
        return;
    }

    // Bit-reversal permutation
    let half = n >> 1;
    let mut j = 0;
    for i in 0..n - 1 {
        if i < j {
            re.swap(i, j);
            im.swap(i, j);
        }
        let mut k = half;
        while k <= j {
            j -= k;
            k >>= 1;
        }
        j += k;
    }

    // Butterflies, doubling the span each stage
    let sign = match direction {
        Direction::Forward => -1.0,
        Direction::Inverse => 1.0,
    };
    let mut span = 1;
    while span < n {
        let step = span << 1;
        let theta = sign * PI / span as f64;
        let (w_im, w_re) = theta.sin_cos();
        let mut u_re = 1.0;
        let mut u_im = 0.0;
        for offset in 0..span {
            let mut i = offset;
            while i < n {
                let k = i + span;
                let t_re = u_re * re[k] - u_im * im[k];
                let t_im = u_re * im[k] + u_im * re[k];
                re[k] = re[i] - t_re;
                im[k] = im[i] - t_im;
                re[i] += t_re;
                im[i] += t_im;
                i += step;
            }
            let next_re = u_re * w_re - u_im * w_im;
            u_im = u_re * w_im + u_im * w_re;
            u_re = next_re;
        }
        span = step;
    }

    if direction == Direction::Forward {
        let scale = 1.0 / n as f64;
        for (r, i) in re.iter_mut().zip(im.iter_mut()) {
            *r *= scale;
            *i *= scale;
        }
    }
}

/// Forward transform, scaled by `1/N`.
pub fn fft(re: &mut [f64], im: &mut [f64]) {
    transform(Direction::Forward, re, im);
}

/// Inverse transform, unscaled.
pub fn ifft(re: &mut [f64], im: &mut [f64]) {
    transform(Direction::Inverse, re, im);
}

/// Per-bin complex product: `y = f * g`.
pub fn complex_mult(
    y: &mut [f64],
    yi: &mut [f64],
    f: &[f64],
    fi: &[f64],
    g: &[f64],
    gi: &[f64],
) {
    for i in 0..y.len() {
        y[i] = f[i] * g[i] - fi[i] * gi[i];
        yi[i] = f[i] * gi[i] + fi[i] * g[i];
    }
}

/// Circular convolution of `f` and `g` into `y`, via the frequency domain.
///
/// The result carries the `1/N` factor left over from the scaled forward
/// transforms. `f` and `g` are transformed and restored in place.
///
/// # Panics
///
/// Panics unless `y`, `f` and `g` have the same power-of-two length.
pub fn convolve(y: &mut [f64], f: &mut [f64], g: &mut [f64]) {
    assert!(
        y.len() == f.len() && y.len() == g.len(),
        "convolve: mismatched lengths (y={}, f={}, g={})",
        y.len(),
        f.len(),
        g.len()
    );

    let n = y.len();
    let mut fi = vec![0.0; n];
    let mut gi = vec![0.0; n];
    let mut yi = vec![0.0; n];

    fft(f, &mut fi);
    fft(g, &mut gi);

    complex_mult(y, &mut yi, f, &fi, g, &gi);

    ifft(y, &mut yi);
    ifft(f, &mut fi);
    ifft(g, &mut gi);
}

/// A precomputed forward transform, for convolving many blocks against
/// the same kernel.
#[derive(Debug, Clone)]
pub struct Spectrum {
    re: Vec<f64>,
    im: Vec<f64>,
}

impl Spectrum {
    pub fn new(signal: &[f64]) -> Self {
        let mut re = signal.to_vec();
        let mut im = vec![0.0; re.len()];
        fft(&mut re, &mut im);
        Spectrum { re, im }
    }

    pub fn len(&self) -> usize {
        self.re.len()
    }

    pub fn is_empty(&self) -> bool {
        self.re.is_empty()
    }

    /// Same result as [`convolve`] with this spectrum's source signal as `g`.
    ///
    /// `scratch` holds the imaginary parts and is overwritten.
    pub fn convolve_into(&self, y: &mut [f64], f: &[f64], scratch: &mut Vec<f64>) {
        assert!(
            y.len() == f.len() && y.len() == self.len(),
            "convolve: mismatched lengths (y={}, f={}, kernel={})",
            y.len(),
            f.len(),
            self.len()
        );

        scratch.clear();
        scratch.resize(y.len(), 0.0);
        y.copy_from_slice(f);
        fft(y, scratch);

        for i in 0..y.len() {
            let (a, b) = (y[i], scratch[i]);
            y[i] = a * self.re[i] - b * self.im[i];
            scratch[i] = a * self.im[i] + b * self.re[i];
        }

        ifft(y, scratch);
    }
}
