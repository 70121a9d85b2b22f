//! One polyphonic lane hosting any number of sounding channels.

use serde::{Deserialize, Serialize};

use crate::sequence::EventKind;

use super::instrument::Instrument;

/// Channels whose pitches differ by less than this are the same note.
pub const PITCH_TOLERANCE: f64 = 1e-2;

/// Convert a MIDI-style pitch (A4 = 69) to a frequency in Hz.
pub fn pitch_to_frequency(pitch: f64) -> f64 {
    440.0 * ((pitch - 69.0) / 12.0).exp2()
}

/// One sounding note within a voice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Channel {
    pub pitch: f64,
    pub event: EventKind,
    /// Sample index at which `event` fired.
    pub event_time: i64,
    /// Envelope level when `event` fired.
    pub event_level: f64,
    /// Envelope level on the most recent rendered sample.
    pub prev_level: f64,
}

/// A synthesis lane: gain, instrument selection, vibrato and its channels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Voice {
    pub level: f64,
    /// Index into the mix's instruments.
    pub instrument: usize,
    #[serde(default)]
    pub vibrato_freq: f64,
    #[serde(default)]
    pub vibrato_amp: f64,

    #[serde(skip)]
    channels: Vec<Channel>,
}

impl Voice {
    pub fn new(level: f64, instrument: usize) -> Self {
        Voice {
            level,
            instrument,
            ..Default::default()
        }
    }

    pub fn with_vibrato(mut self, freq: f64, amp: f64) -> Self {
        self.vibrato_freq = freq;
        self.vibrato_amp = amp;
        self
    }

    /// Currently sounding channels.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Apply a note event at sample `now`.
    ///
    /// A channel already sounding within [`PITCH_TOLERANCE`] of `pitch` is
    /// retriggered from its current level; otherwise a new channel starts
    /// from silence.
    pub fn trigger(&mut self, pitch: f64, event: EventKind, now: i64) {
        match self
            .channels
            .iter_mut()
            .find(|c| (c.pitch - pitch).abs() < PITCH_TOLERANCE)
        {
            Some(channel) => {
                channel.event = event;
                channel.event_time = now;
                channel.event_level = channel.prev_level;
            }
            None => self.channels.push(Channel {
                pitch,
                event,
                event_time: now,
                event_level: 0.0,
                prev_level: 0.0,
            }),
        }
    }

    /// Render this voice's contribution at sample `index`.
    ///
    /// `s` is the sample index in radians of a 1 Hz cycle. Channels whose
    /// envelope has finished are dropped.
    pub fn render(&mut self, instrument: &Instrument, index: i64, s: f64) -> f64 {
        let vibrato = self.vibrato_amp * (self.vibrato_freq * s).sin();
        let gain = self.level;
        let mut sum = 0.0;
        self.channels.retain_mut(|c| {
            let (level, active) = instrument.level(c.event, index - c.event_time, c.event_level);
            if active {
                c.prev_level = level;
                sum += level * gain * instrument.mix((s + vibrato) * pitch_to_frequency(c.pitch));
            }
            active
        });
        sum
    }

    /// Drop every channel.
    pub fn silence(&mut self) {
        self.channels.clear();
    }
}
