//! Additive instrument: a harmonic series shaped by a four-segment envelope.

use serde::{Deserialize, Serialize};

use crate::sequence::EventKind;

use super::envelope::Envelope;

/// A bank of overtone amplitudes plus an attack/decay/sustain/release shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Instrument {
    /// Amplitude of the i-th overtone (index 0 is the fundamental).
    pub harmonics: Vec<f64>,
    #[serde(default)]
    pub attack: Envelope,
    #[serde(default)]
    pub decay: Envelope,
    #[serde(default)]
    pub sustain: Envelope,
    #[serde(default)]
    pub release: Envelope,
}

impl Instrument {
    pub fn new(harmonics: Vec<f64>) -> Self {
        Instrument {
            harmonics,
            ..Default::default()
        }
    }

    pub fn with_envelope(
        mut self,
        attack: Envelope,
        decay: Envelope,
        sustain: Envelope,
        release: Envelope,
    ) -> Self {
        self.attack = attack;
        self.decay = decay;
        self.sustain = sustain;
        self.release = release;
        self
    }

    /// Envelope level `offset` samples after an event, and whether the
    /// note is still sounding.
    ///
    /// `baseline` is the level the note had when the event fired: the
    /// attack ramps up from it on `On`, the release ramps down from it on
    /// `Off`.
    pub fn level(&self, event: EventKind, offset: i64, baseline: f64) -> (f64, bool) {
        if offset < 0 {
            return (0.0, false);
        }

        match event {
            EventKind::On => {
                let mut offset = offset;
                let mut start = baseline;
                for segment in [&self.attack, &self.decay, &self.sustain, &self.release] {
                    if offset < segment.time {
                        return (segment.interpolate(offset, start), true);
                    }
                    offset -= segment.time;
                    start = segment.value;
                }
                (0.0, false)
            }
            EventKind::Off if offset < self.release.time => {
                (self.release.interpolate(offset, baseline), true)
            }
            _ => (0.0, false),
        }
    }

    /// Sum of the harmonic series at `phase` (radians of the fundamental).
    pub fn mix(&self, phase: f64) -> f64 {
        self.harmonics
            .iter()
            .enumerate()
            .map(|(i, amp)| amp * (phase * (i + 1) as f64).sin())
            .sum()
    }

    /// Total samples an `On` event sounds before it falls silent.
    pub fn duration(&self) -> i64 {
        self.attack.time + self.decay.time + self.sustain.time + self.release.time
    }
}
