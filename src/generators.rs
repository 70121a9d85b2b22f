//! Bundled sequence generators.
//!
//! These only produce [`Sequence`] data. Any state they need between
//! firings is captured by the event closures they build.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rand::Rng;
use rand::rngs::StdRng;

use crate::sequence::{Event, Sequence};

/// Seven pitches of a heptatonic scale starting on A4.
pub type Scale = [f64; 7];

pub const MAJOR: Scale = [69.0, 71.0, 73.0, 74.0, 76.0, 78.0, 80.0];
pub const MINOR: Scale = [69.0, 71.0, 72.0, 74.0, 76.0, 77.0, 79.0];
pub const MELODIC_MINOR: Scale = [69.0, 71.0, 72.0, 74.0, 76.0, 78.0, 80.0];
pub const HARMONIC_MINOR: Scale = [69.0, 71.0, 72.0, 74.0, 75.0, 77.0, 80.0];

/// Random-walk melody on voice 0 with a third above on voice 1 and a low
/// bass note on voice 2. Loops every 24000 samples.
///
/// Each loop the melody moves between two steps down and three steps up
/// the scale, wrapping around it.
pub fn basic(scale: &Scale, mut rng: StdRng) -> Sequence {
    let scale = *scale;
    let position = Arc::new(AtomicUsize::new(0));

    let step = {
        let position = Arc::clone(&position);
        move || {
            let delta = rng.random_range(-2..4_i32) as isize;
            let current = position.load(Ordering::Relaxed) as isize;
            let next = (current + delta).rem_euclid(scale.len() as isize) as usize;
            position.store(next, Ordering::Relaxed);
            scale[next]
        }
    };
    let degree = |offset: usize| {
        let position = Arc::clone(&position);
        move || scale[(position.load(Ordering::Relaxed) + offset) % scale.len()]
    };

    Sequence::new(vec![
        Event::on(0, 2, 35.0),
        Event::on(0, 0, 0.0).with_pitch_source(step),
        Event::on(12_000, 1, 0.0).with_pitch_source(degree(2)),
        Event::off(20_500, 0, 0.0).with_pitch_source(degree(0)),
        Event::off(20_000, 1, 0.0).with_pitch_source(degree(2)),
        Event::marker(24_000),
    ])
}

/// Four bars of arpeggiated chords on voice 3, then a closing note.
/// Loops every 480000 samples.
pub fn chords(scale: &Scale) -> Sequence {
    const BAR: i64 = 96_000;

    // Root offset plus the three scale degrees arpeggiated above it
    let bars: [(f64, [usize; 3]); 4] = [
        (scale[0] - 24.0, [2, 4, 6]),
        (scale[6] - 36.0, [2, 4, 6]),
        (scale[6] - 36.0, [1, 4, 6]),
        (scale[6] - 36.0, [1, 3, 6]),
    ];

    let mut events = Vec::with_capacity(18);
    for (bar, (root, degrees)) in bars.into_iter().enumerate() {
        let start = bar as i64 * BAR;
        events.push(Event::on(start, 3, root));
        for (i, degree) in degrees.into_iter().enumerate() {
            events.push(Event::on(start + 2000 * (i as i64 + 1), 3, scale[degree] - 12.0));
        }
    }
    events.push(Event::on(4 * BAR + 72_000, 3, scale[2] - 12.0));
    events.push(Event::marker(480_000));
    Sequence::new(events)
}

/// A sustained three-note chord, re-struck every 96000 samples.
pub fn auto_chords() -> Sequence {
    Sequence::new(vec![
        Event::on(0, 4, 57.0),
        Event::on(0, 4, 61.0782),
        Event::on(0, 3, 64.0196),
        Event::marker(96_000),
    ])
}

/// `pitch` held on each of the first `voices` voices for as long as the
/// sequence runs.
pub fn held_notes(voices: usize, pitch: f64) -> Sequence {
    let mut events: Vec<Event> = (0..voices).map(|v| Event::on(0, v, pitch)).collect();
    events.push(Event::marker(i64::MAX));
    Sequence::new(events)
}

/// A sequence from `factory` whose last event queues a fresh one from the
/// same factory, giving playback that never repeats a loop verbatim.
///
/// The queuing hook sits at the end of each sequence, but never before
/// sample 1, so each link lasts at least one sample.
pub fn chained<F>(factory: F) -> Sequence
where
    F: FnMut() -> Sequence + Send + 'static,
{
    link(Arc::new(Mutex::new(factory)))
}

fn link<F>(factory: Arc<Mutex<F>>) -> Sequence
where
    F: FnMut() -> Sequence + Send + 'static,
{
    let mut sequence = {
        let mut make = factory.lock().unwrap_or_else(PoisonError::into_inner);
        (*make)()
    };
    let end = sequence.duration().max(1);
    sequence.events.push(Event::hook(end, move |mix| {
        mix.set_next_sequence(link(Arc::clone(&factory)));
    }));
    sequence
}
