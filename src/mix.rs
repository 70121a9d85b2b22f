//! The mix: instruments, voices and the sequencer playhead in one aggregate.
//!
//! A `Mix` is plain single-threaded state. The streaming core shares it
//! behind one `Mutex` between the synthesis worker and control handles.

use log::{debug, warn};

use crate::config::MixConfig;
use crate::dsp::SAMPLING_INTERVAL;
use crate::dsp::instrument::Instrument;
use crate::dsp::voice::Voice;
use crate::error::EngineError;
use crate::sequence::{Event, EventKind, Sequence};

/// Instruments, voices, master level and sequencer state.
#[derive(Debug, Default)]
pub struct Mix {
    /// Master output level.
    pub level: f64,
    pub instruments: Vec<Instrument>,
    pub voices: Vec<Voice>,

    /// Global sample counter.
    sample_index: i64,
    /// Playhead within the active sequence.
    sequence_position: i64,
    /// Next event to fire in the active sequence.
    cursor: usize,
    active: Option<Sequence>,
    /// The active sequence is checked out of `active` while its events fire.
    draining: bool,
    /// Becomes active at the next loop boundary.
    pending: Option<Sequence>,
}

impl Mix {
    pub fn new(config: MixConfig) -> Self {
        Mix {
            level: config.level,
            instruments: config.instruments,
            voices: config.voices,
            ..Default::default()
        }
    }

    pub fn sample_index(&self) -> i64 {
        self.sample_index
    }

    pub fn sequence_position(&self) -> i64 {
        self.sequence_position
    }

    /// Whether a sequence is playing. Hooks see their own sequence as active.
    pub fn has_active_sequence(&self) -> bool {
        self.active.is_some() || self.draining
    }

    pub fn has_pending_sequence(&self) -> bool {
        self.pending.is_some()
    }

    /// Queue `sequence` to start at the next loop boundary. Replaces any
    /// sequence already queued.
    pub fn set_next_sequence(&mut self, sequence: Sequence) {
        self.pending = Some(sequence);
    }

    /// Replace one instrument's harmonic series. Nothing changes if
    /// `index` is out of range.
    pub fn update_instrument_harmonics(
        &mut self,
        index: usize,
        harmonics: Vec<f64>,
    ) -> Result<(), EngineError> {
        let len = self.instruments.len();
        let instrument = self
            .instruments
            .get_mut(index)
            .ok_or(EngineError::InstrumentOutOfRange { index, len })?;
        instrument.harmonics = harmonics;
        Ok(())
    }

    /// Instruments, voices and master level, without runtime state.
    pub fn snapshot(&self) -> MixConfig {
        MixConfig {
            level: self.level,
            instruments: self.instruments.clone(),
            voices: self
                .voices
                .iter()
                .map(|v| {
                    let mut v = v.clone();
                    v.silence();
                    v
                })
                .collect(),
        }
    }

    /// Fill `buf` with consecutive raw samples.
    pub fn fill(&mut self, buf: &mut [f64]) {
        for sample in buf.iter_mut() {
            *sample = self.tick();
        }
    }

    /// Advance one sample: fire every due event, then render.
    pub fn tick(&mut self) -> f64 {
        let mut sequence = self.active.take();
        if self.sequence_position == 0 {
            self.promote(&mut sequence);
        }
        self.draining = sequence.is_some();

        // Each event fires at most once per tick, so a sequence whose
        // events all sit at time 0 cannot spin forever.
        let mut fired = 0;
        while let Some(seq) = sequence.as_mut() {
            let len = seq.events.len();
            if len == 0 || fired >= len {
                break;
            }
            let event = &mut seq.events[self.cursor];
            if event.time > self.sequence_position {
                break;
            }
            self.apply(event);
            fired += 1;

            self.cursor += 1;
            if self.cursor >= len {
                self.cursor = 0;
                self.sequence_position = 0;
                if self.promote(&mut sequence) {
                    fired = 0;
                }
            }
        }

        self.draining = false;
        let sample = self.render();

        self.sample_index += 1;
        // Without events there is nothing to loop over; hold the playhead
        // at the boundary so a queued sequence starts on the next tick.
        if sequence.as_ref().is_some_and(|s| !s.is_empty()) {
            self.sequence_position += 1;
        } else {
            self.sequence_position = 0;
        }
        self.active = sequence;

        sample
    }

    /// Swap in the pending sequence, if any. Returns whether one was swapped.
    fn promote(&mut self, sequence: &mut Option<Sequence>) -> bool {
        self.cursor = 0;
        match self.pending.take() {
            Some(next) => {
                debug!(
                    "sequence promoted at sample {} ({} events, {} samples)",
                    self.sample_index,
                    next.len(),
                    next.duration()
                );
                *sequence = Some(next);
                true
            }
            None => false,
        }
    }

    fn apply(&mut self, event: &mut Event) {
        if matches!(event.kind, EventKind::On | EventKind::Off) {
            let pitch = event.pitch.resolve();
            let now = self.sample_index;
            let count = self.voices.len();
            match self.voices.get_mut(event.voice) {
                Some(voice) if pitch != 0.0 => voice.trigger(pitch, event.kind, now),
                Some(_) => {}
                None => warn!(
                    "event at {} targets voice {} but the mix has {}",
                    event.time,
                    event.voice,
                    count
                ),
            }
        }

        if let Some(hook) = event.hook.as_mut() {
            hook(self);
        }
    }

    fn render(&mut self) -> f64 {
        let index = self.sample_index;
        let s = index as f64 * SAMPLING_INTERVAL;
        let mut sum = 0.0;
        for voice in &mut self.voices {
            match self.instruments.get(voice.instrument) {
                Some(instrument) => sum += voice.render(instrument, index, s),
                None => voice.silence(),
            }
        }
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::envelope::Envelope;
    use std::sync::{Arc, Mutex};

    fn sustained() -> Instrument {
        Instrument::new(vec![1.0]).with_envelope(
            Envelope::new(1.0, 0),
            Envelope::new(1.0, 0),
            Envelope::new(1.0, 1_000_000),
            Envelope::new(0.0, 100),
        )
    }

    fn test_mix(voices: usize) -> Mix {
        Mix::new(MixConfig {
            level: 1.0,
            instruments: vec![sustained(), Instrument::new(vec![0.5, 0.25])],
            voices: (0..voices).map(|_| Voice::new(1.0, 0)).collect(),
        })
    }

    /// Marker event that records the sample index it fired on.
    fn probe(time: i64, id: usize, log: &Arc<Mutex<Vec<(usize, i64)>>>) -> Event {
        let log = Arc::clone(log);
        Event::hook(time, move |mix: &mut Mix| {
            log.lock().unwrap().push((id, mix.sample_index()));
        })
    }

    #[test]
    fn loops_at_last_event_and_reprocesses_start() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut mix = test_mix(1);
        mix.set_next_sequence(Sequence::new(vec![
            probe(0, 0, &log),
            probe(100, 1, &log),
            probe(200, 2, &log),
        ]));

        for _ in 0..200 {
            mix.tick();
        }
        assert_eq!(mix.sequence_position(), 200);

        mix.tick();
        assert_eq!(
            *log.lock().unwrap(),
            vec![(0, 0), (1, 100), (2, 200), (0, 200)],
            "time-0 event should fire again on the wrapping tick"
        );
        // Wrapped to 0 during tick 200, then advanced past it
        assert_eq!(mix.sequence_position(), 1);

        for _ in 0..100 {
            mix.tick();
        }
        assert_eq!(log.lock().unwrap().last(), Some(&(1, 300)));
    }

    #[test]
    fn ties_fire_in_list_order_before_rendering() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut mix = test_mix(1);
        mix.set_next_sequence(Sequence::new(vec![
            probe(5, 10, &log),
            probe(5, 11, &log),
            probe(5, 12, &log),
            Event::marker(50),
        ]));
        for _ in 0..6 {
            mix.tick();
        }
        assert_eq!(*log.lock().unwrap(), vec![(10, 5), (11, 5), (12, 5)]);
    }

    #[test]
    fn pending_sequence_waits_for_the_boundary() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut mix = test_mix(1);
        mix.set_next_sequence(Sequence::new(vec![probe(0, 0, &log), Event::marker(100)]));
        for _ in 0..50 {
            mix.tick();
        }

        mix.set_next_sequence(Sequence::new(vec![probe(0, 1, &log), Event::marker(10)]));
        assert!(mix.has_pending_sequence());
        for _ in 50..100 {
            mix.tick();
        }
        assert_eq!(*log.lock().unwrap(), vec![(0, 0)], "swap must not happen mid-loop");

        mix.tick();
        assert_eq!(*log.lock().unwrap(), vec![(0, 0), (1, 100)]);
        assert!(!mix.has_pending_sequence());

        // The new sequence keeps looping on its own
        for _ in 0..10 {
            mix.tick();
        }
        assert_eq!(log.lock().unwrap().last(), Some(&(1, 110)));
    }

    #[test]
    fn hook_can_chain_a_successor() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chained = Arc::clone(&log);
        let mut mix = test_mix(1);
        mix.set_next_sequence(Sequence::new(vec![
            probe(0, 0, &log),
            Event::hook(20, move |mix: &mut Mix| {
                mix.set_next_sequence(Sequence::new(vec![
                    probe(0, 1, &chained),
                    Event::marker(30),
                ]));
            }),
        ]));
        for _ in 0..=20 {
            mix.tick();
        }
        assert_eq!(*log.lock().unwrap(), vec![(0, 0), (1, 20)]);
    }

    #[test]
    fn hooks_see_their_sequence_as_active() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = Arc::clone(&seen);
        let mut mix = test_mix(1);
        mix.set_next_sequence(Sequence::new(vec![
            Event::hook(0, move |mix: &mut Mix| {
                record.lock().unwrap().push(mix.has_active_sequence());
            }),
            Event::marker(5),
        ]));
        assert!(!mix.has_active_sequence());
        for _ in 0..=5 {
            mix.tick();
        }
        assert_eq!(*seen.lock().unwrap(), vec![true, true]);
        assert!(mix.has_active_sequence());
    }

    #[test]
    fn snapshot_leaves_out_sounding_channels() {
        let mut mix = test_mix(1);
        let idle = mix.snapshot();
        mix.set_next_sequence(Sequence::new(vec![Event::on(0, 0, 69.0), Event::marker(1000)]));
        mix.tick();
        assert_eq!(mix.voices[0].channels().len(), 1);

        let playing = mix.snapshot();
        assert!(playing.voices[0].channels().is_empty());
        assert_eq!(playing, idle);
    }

    #[test]
    fn zero_length_sequence_fires_once_per_tick() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut mix = test_mix(1);
        mix.set_next_sequence(Sequence::new(vec![probe(0, 0, &log), probe(0, 1, &log)]));
        for _ in 0..3 {
            mix.tick();
        }
        let fired = log.lock().unwrap();
        assert_eq!(fired.len(), 6, "{fired:?}");
        assert_eq!(fired[..2], [(0, 0), (1, 0)]);
    }

    #[test]
    fn empty_sequence_is_silent_and_replaceable() {
        let mut mix = test_mix(1);
        mix.set_next_sequence(Sequence::default());
        for _ in 0..10 {
            assert_eq!(mix.tick(), 0.0);
        }
        assert_eq!(mix.sequence_position(), 0);

        mix.set_next_sequence(Sequence::new(vec![Event::on(0, 0, 69.0), Event::marker(1000)]));
        mix.tick();
        assert_eq!(mix.voices[0].channels().len(), 1);
    }

    #[test]
    fn no_sequence_renders_silence() {
        let mut mix = test_mix(2);
        let mut buf = vec![1.0; 64];
        mix.fill(&mut buf);
        assert!(buf.iter().all(|&s| s == 0.0));
        assert_eq!(mix.sample_index(), 64);
    }

    #[test]
    fn note_events_allocate_channels() {
        let mut mix = test_mix(2);
        mix.set_next_sequence(Sequence::new(vec![
            Event::on(0, 0, 60.0),
            Event::on(0, 0, 60.004),
            Event::on(0, 0, 64.0),
            Event::on(0, 1, 67.0),
            Event::on(0, 1, 0.0),
            Event::marker(1000),
        ]));
        mix.tick();
        assert_eq!(mix.voices[0].channels().len(), 2);
        assert_eq!(mix.voices[1].channels().len(), 1, "pitch 0 must not allocate");
    }

    #[test]
    fn pitch_source_runs_when_event_fires() {
        let mut mix = test_mix(1);
        let mut next = 58.0;
        mix.set_next_sequence(Sequence::new(vec![
            Event::on(0, 0, 0.0).with_pitch_source(move || {
                next += 2.0;
                next
            }),
            Event::marker(10),
        ]));
        for _ in 0..=10 {
            mix.tick();
        }
        let pitches: Vec<f64> = mix.voices[0].channels().iter().map(|c| c.pitch).collect();
        assert_eq!(pitches, vec![60.0, 62.0]);
    }

    #[test]
    fn off_event_releases_matching_channel() {
        let mut mix = test_mix(1);
        mix.set_next_sequence(Sequence::new(vec![
            Event::on(0, 0, 69.0),
            Event::off(50, 0, 69.0),
            Event::marker(100_000),
        ]));
        for _ in 0..60 {
            mix.tick();
        }
        let c = mix.voices[0].channels()[0];
        assert_eq!(c.event, EventKind::Off);
        assert_eq!(c.event_time, 50);
        assert!((c.event_level - 1.0).abs() < 1e-12);

        // Release is 100 samples long
        for _ in 60..200 {
            mix.tick();
        }
        assert!(mix.voices[0].channels().is_empty());
    }

    #[test]
    fn bad_indices_do_not_panic() {
        let mut mix = test_mix(1);
        mix.voices.push(Voice::new(1.0, 7));
        mix.set_next_sequence(Sequence::new(vec![
            Event::on(0, 5, 60.0),
            Event::on(0, 1, 60.0),
            Event::marker(10),
        ]));
        for _ in 0..20 {
            assert_eq!(mix.tick(), 0.0);
        }
    }

    #[test]
    fn update_harmonics_checks_range() {
        let mut mix = test_mix(1);
        let err = mix.update_instrument_harmonics(5, vec![1.0]).unwrap_err();
        assert!(matches!(err, EngineError::InstrumentOutOfRange { index: 5, len: 2 }));
        assert_eq!(mix.instruments[1].harmonics, vec![0.5, 0.25]);

        mix.update_instrument_harmonics(0, vec![0.5, 0.3]).unwrap();
        assert_eq!(mix.snapshot().instruments[0].harmonics, vec![0.5, 0.3]);
    }

    #[test]
    fn renders_a_sine_for_a_held_note() {
        let mut mix = test_mix(1);
        mix.set_next_sequence(Sequence::new(vec![Event::on(0, 0, 69.0), Event::marker(1_000_000)]));
        let mut buf = vec![0.0; 441];
        mix.fill(&mut buf);
        for (i, &s) in buf.iter().enumerate() {
            let expected = (i as f64 * SAMPLING_INTERVAL * 440.0).sin();
            assert!((s - expected).abs() < 1e-9, "i={i}: {s} vs {expected}");
        }
    }
}
