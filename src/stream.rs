//! Streaming core: a synthesis worker thread feeding a WAV byte stream.
//!
//! The worker renders one filtered block at a time and hands it over a
//! single-slot channel, so it never runs more than one block ahead of the
//! reader. The mix lives behind a shared `Mutex` that the worker takes
//! for one sample tick at a time.

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, bounded};
use log::{info, trace, warn};

use crate::control::Controller;
use crate::dsp::renderer::{BlockRenderer, SampleSource, pcm_bytes, wav_stream_header};
use crate::mix::Mix;
use crate::sequence::Sequence;

/// The mix as shared between the worker and control handles.
pub type SharedMix = Arc<Mutex<Mix>>;

/// Lock the mix, recovering it if a previous holder panicked.
pub fn lock_mix(mix: &Mutex<Mix>) -> MutexGuard<'_, Mix> {
    mix.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fills a block from the shared mix, locking it once per sample so
/// control calls interleave with synthesis.
struct Locked<'a>(&'a Mutex<Mix>);

impl SampleSource for Locked<'_> {
    fn fill_block(&mut self, buf: &mut [f64]) -> f64 {
        for sample in buf.iter_mut() {
            *sample = lock_mix(self.0).tick();
        }
        lock_mix(self.0).level
    }
}

/// A running engine, readable as an endless mono 16-bit WAV stream.
///
/// Dropping the stream stops and joins the worker.
pub struct Stream {
    mix: SharedMix,
    rx: Option<Receiver<Vec<u8>>>,
    /// Unread bytes of the current chunk; starts out as the WAV header.
    rem: Vec<u8>,
    pos: usize,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Stream {
    /// Take ownership of `mix` and start synthesizing.
    pub fn start(mix: Mix) -> io::Result<Self> {
        Self::from_shared(Arc::new(Mutex::new(mix)))
    }

    /// Start synthesizing from a mix that is already shared.
    pub fn from_shared(mix: SharedMix) -> io::Result<Self> {
        let (tx, rx) = bounded(1);
        let stop = Arc::new(AtomicBool::new(false));

        let worker = {
            let mix = Arc::clone(&mix);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("overtone-synth".to_string())
                .spawn(move || run_worker(&mix, &tx, &stop))?
        };

        Ok(Stream {
            mix,
            rx: Some(rx),
            rem: wav_stream_header().to_vec(),
            pos: 0,
            stop,
            worker: Some(worker),
        })
    }

    /// A control handle onto this stream's mix.
    pub fn controller(&self) -> Controller {
        Controller::new(Arc::clone(&self.mix))
    }

    pub fn mix(&self) -> &SharedMix {
        &self.mix
    }

    /// Queue `sequence` to start at the next loop boundary.
    pub fn set_next_sequence(&self, sequence: Sequence) {
        lock_mix(&self.mix).set_next_sequence(sequence);
    }

    /// Whether the worker is still producing blocks.
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Stop the worker and wait for it to exit. Bytes already handed over
    /// can still be read; after that `read` reports end of stream.
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        // A worker blocked on a full slot wakes up with a send error.
        self.rx = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("synthesis worker panicked");
            }
        }
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pos >= self.rem.len() {
            let Some(rx) = self.rx.as_ref() else {
                return Ok(0);
            };
            match rx.recv() {
                Ok(chunk) => {
                    self.rem = chunk;
                    self.pos = 0;
                }
                // Worker gone
                Err(_) => return Ok(0),
            }
        }

        let n = buf.len().min(self.rem.len() - self.pos);
        buf[..n].copy_from_slice(&self.rem[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(mix: &Mutex<Mix>, tx: &Sender<Vec<u8>>, stop: &AtomicBool) {
    info!("synthesis worker started");
    let mut renderer = BlockRenderer::new();
    let mut blocks: u64 = 0;

    while !stop.load(Ordering::Acquire) {
        let started = Instant::now();
        let samples = renderer.next_block(&mut Locked(mix));
        trace!("block {blocks} rendered in {:?}", started.elapsed());

        if tx.send(pcm_bytes(&samples)).is_err() {
            break;
        }
        blocks += 1;
    }

    info!("synthesis worker stopped after {blocks} blocks");
}
