//! Control handle: the operations an outside control surface needs.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use log::{info, warn};

use crate::config::MixConfig;
use crate::error::EngineError;
use crate::sequence::Sequence;
use crate::stream::{SharedMix, lock_mix};

/// Where mutations are saved. The lock orders snapshot-then-save across
/// all clones, so the file always ends up holding the latest update.
#[derive(Debug)]
struct Persistence {
    path: PathBuf,
    lock: Mutex<()>,
}

/// Cloneable handle for mutating and inspecting a running mix.
#[derive(Debug, Clone)]
pub struct Controller {
    mix: SharedMix,
    persist: Option<Arc<Persistence>>,
}

impl Controller {
    pub fn new(mix: SharedMix) -> Self {
        Controller { mix, persist: None }
    }

    /// Rewrite the configuration at `path` after every successful mutation.
    pub fn with_persistence(mut self, path: impl Into<PathBuf>) -> Self {
        self.persist = Some(Arc::new(Persistence {
            path: path.into(),
            lock: Mutex::new(()),
        }));
        self
    }

    /// Replace the harmonic series of instrument `index`.
    ///
    /// Fails with [`EngineError::InstrumentOutOfRange`] without touching
    /// the mix. If persistence is enabled and the save fails, the new
    /// harmonics stay in effect and the save error is returned.
    pub fn update_instrument_harmonics(
        &self,
        index: usize,
        harmonics: Vec<f64>,
    ) -> Result<(), EngineError> {
        let count = harmonics.len();
        let Some(persist) = self.persist.as_deref() else {
            lock_mix(&self.mix).update_instrument_harmonics(index, harmonics)?;
            info!("instrument {index} now has {count} harmonics");
            return Ok(());
        };

        // Held across update, snapshot and save; the mix lock only across
        // the first two, so synthesis never waits on the disk.
        let _saving = persist.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let config = {
            let mut mix = lock_mix(&self.mix);
            mix.update_instrument_harmonics(index, harmonics)?;
            mix.snapshot()
        };
        info!("instrument {index} now has {count} harmonics");

        config.save_atomic(&persist.path).inspect_err(|e| {
            warn!("could not persist mix to {}: {e}", persist.path.display());
        })
    }

    /// Instruments, voices and level as they are now.
    pub fn snapshot(&self) -> MixConfig {
        lock_mix(&self.mix).snapshot()
    }

    /// The snapshot as JSON, in the configuration file format.
    pub fn snapshot_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    /// Queue `sequence` to start at the next loop boundary.
    pub fn set_next_sequence(&self, sequence: Sequence) {
        lock_mix(&self.mix).set_next_sequence(sequence);
    }

    pub fn set_level(&self, level: f64) {
        lock_mix(&self.mix).level = level;
    }
}
