//! Additive synthesis voices and the overlap-add output filter.
//!
//! Everything here is single-threaded. The streaming core drives it from
//! its worker thread.

pub mod envelope;
pub mod fft;
pub mod filter;
pub mod instrument;
pub mod renderer;
pub mod voice;
pub mod window;

use std::f64::consts::PI;

/// Output sample rate in Hz.
pub const SAMPLE_RATE: u32 = 44100;

/// Radians per sample of a 1 Hz cycle.
pub const SAMPLING_INTERVAL: f64 = 2.0 * PI / SAMPLE_RATE as f64;

/// Samples per filtered block.
pub const BLOCK_SIZE: usize = 16384;
