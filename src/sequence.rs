//! Timed note events and the sequences that carry them.
//!
//! Events may carry closures: a pitch source evaluated when the event
//! fires, and a hook that mutates the mix. Any state those closures need
//! (a random-walk position, a chord index) lives in their captures, owned
//! by whoever built the sequence.

use std::fmt;

use crate::mix::Mix;

/// What an event does to its voice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EventKind {
    /// Nothing; the event only marks time or runs its hook.
    #[default]
    None,
    /// Start (or retrigger) a note.
    On,
    /// Release a note.
    Off,
}

/// Produces a pitch each time its event fires.
pub type PitchSource = Box<dyn FnMut() -> f64 + Send>;

/// Side effect run against the mix when its event fires.
pub type Hook = Box<dyn FnMut(&mut Mix) + Send>;

/// Where an event's pitch comes from.
pub enum Pitch {
    Fixed(f64),
    Source(PitchSource),
}

impl Pitch {
    /// Current pitch. Runs the source, if any.
    pub fn resolve(&mut self) -> f64 {
        match self {
            Pitch::Fixed(p) => *p,
            Pitch::Source(f) => f(),
        }
    }
}

impl Default for Pitch {
    fn default() -> Self {
        Pitch::Fixed(0.0)
    }
}

impl fmt::Debug for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pitch::Fixed(p) => write!(f, "Fixed({p})"),
            Pitch::Source(_) => f.write_str("Source(..)"),
        }
    }
}

/// A single scheduled event.
#[derive(Default)]
pub struct Event {
    /// Sample offset from the start of the sequence.
    pub time: i64,
    pub kind: EventKind,
    /// Index into the mix's voices.
    pub voice: usize,
    /// A pitch of exactly 0 means "no note".
    pub pitch: Pitch,
    pub hook: Option<Hook>,
}

impl Event {
    pub fn on(time: i64, voice: usize, pitch: f64) -> Self {
        Event {
            time,
            kind: EventKind::On,
            voice,
            pitch: Pitch::Fixed(pitch),
            hook: None,
        }
    }

    pub fn off(time: i64, voice: usize, pitch: f64) -> Self {
        Event {
            kind: EventKind::Off,
            ..Event::on(time, voice, pitch)
        }
    }

    /// An event that does nothing; as the last event it sets the loop length.
    pub fn marker(time: i64) -> Self {
        Event {
            time,
            ..Default::default()
        }
    }

    /// A marker that runs `hook` when it fires.
    pub fn hook<F>(time: i64, hook: F) -> Self
    where
        F: FnMut(&mut Mix) + Send + 'static,
    {
        Event::marker(time).with_hook(hook)
    }

    pub fn with_pitch_source<F>(mut self, source: F) -> Self
    where
        F: FnMut() -> f64 + Send + 'static,
    {
        self.pitch = Pitch::Source(Box::new(source));
        self
    }

    pub fn with_hook<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut Mix) + Send + 'static,
    {
        self.hook = Some(Box::new(hook));
        self
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("time", &self.time)
            .field("kind", &self.kind)
            .field("voice", &self.voice)
            .field("pitch", &self.pitch)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

/// An ordered list of events played as a loop.
#[derive(Debug, Default)]
pub struct Sequence {
    pub events: Vec<Event>,
}

impl Sequence {
    /// Build a sequence, stably ordering events by time. Events sharing a
    /// time keep their relative order.
    pub fn new(mut events: Vec<Event>) -> Self {
        events.sort_by_key(|e| e.time);
        Sequence { events }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Time of the last event: the loop length in samples.
    pub fn duration(&self) -> i64 {
        self.events.last().map_or(0, |e| e.time)
    }
}

impl From<Vec<Event>> for Sequence {
    fn from(events: Vec<Event>) -> Self {
        Sequence::new(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sorts_stably() {
        let seq = Sequence::new(vec![
            Event::on(200, 0, 60.0),
            Event::on(0, 1, 62.0),
            Event::on(0, 2, 64.0),
            Event::marker(100),
        ]);
        let order: Vec<(i64, usize)> = seq.events.iter().map(|e| (e.time, e.voice)).collect();
        assert_eq!(order, vec![(0, 1), (0, 2), (100, 0), (200, 0)]);
        assert_eq!(seq.duration(), 200);
    }

    #[test]
    fn pitch_sources_keep_their_state() {
        let mut step = 0.0;
        let mut event = Event::on(0, 0, 0.0).with_pitch_source(move || {
            step += 1.0;
            60.0 + step
        });
        assert_eq!(event.pitch.resolve(), 61.0);
        assert_eq!(event.pitch.resolve(), 62.0);
    }

    #[test]
    fn constructors_set_kind() {
        assert_eq!(Event::on(1, 0, 60.0).kind, EventKind::On);
        assert_eq!(Event::off(1, 0, 60.0).kind, EventKind::Off);
        let marker = Event::marker(5);
        assert_eq!(marker.kind, EventKind::None);
        assert!(marker.hook.is_none());
        assert!(Event::hook(5, |_| {}).hook.is_some());
    }

    #[test]
    fn empty_sequence_has_zero_duration() {
        let seq = Sequence::default();
        assert!(seq.is_empty());
        assert_eq!(seq.duration(), 0);
    }

    #[test]
    fn debug_hides_closures() {
        let e = Event::on(3, 1, 0.0).with_pitch_source(|| 60.0);
        let text = format!("{e:?}");
        assert!(text.contains("Source(..)"), "{text}");
    }
}
