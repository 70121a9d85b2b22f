//! Piecewise-linear envelope segments.

use serde::{Deserialize, Serialize};

/// Levels below this snap to exactly zero.
pub const LEVEL_FLOOR: f64 = 1e-10;

/// One envelope segment: ramp to `value` over `time` samples.
///
/// Segments chain: each one starts where the previous one ended. A
/// segment with `time == 0` has no duration and is skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Envelope {
    pub value: f64,
    pub time: i64,
}

impl Envelope {
    pub const fn new(value: f64, time: i64) -> Self {
        Envelope { value, time }
    }

    /// Linear ramp from `start` toward this segment's value, `offset`
    /// samples into the segment.
    pub fn interpolate(&self, offset: i64, start: f64) -> f64 {
        let level = (self.value - start) / self.time as f64 * offset as f64 + start;
        if level < LEVEL_FLOOR { 0.0 } else { level }
    }
}
