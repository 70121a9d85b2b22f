//! Mix configuration: the persisted description of instruments, voices
//! and master level.
//!
//! The JSON uses PascalCase keys:
//!
//! ```json
//! {
//!   "Level": 5000,
//!   "Instruments": [
//!     { "Harmonics": [1.0, 0.5],
//!       "Attack": { "Value": 1.0, "Time": 441 },
//!       "Decay": { "Value": 0.8, "Time": 4410 },
//!       "Sustain": { "Value": 0.8, "Time": 441000 },
//!       "Release": { "Value": 0.0, "Time": 22050 } }
//!   ],
//!   "Voices": [ { "Level": 1.0, "Instrument": 0, "VibratoFreq": 5.0, "VibratoAmp": 0.002 } ]
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::dsp::envelope::Envelope;
use crate::dsp::instrument::Instrument;
use crate::dsp::voice::Voice;
use crate::error::{ConfigError, EngineError};

/// Instruments, voices and master level. Also the shape of a state
/// snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MixConfig {
    pub level: f64,
    #[serde(default)]
    pub instruments: Vec<Instrument>,
    #[serde(default)]
    pub voices: Vec<Voice>,
}

impl Default for MixConfig {
    /// One pure-sine instrument shared by five voices, enough for the
    /// bundled generators.
    fn default() -> Self {
        MixConfig {
            level: 10_000.0,
            instruments: vec![Instrument::new(vec![1.0]).with_envelope(
                Envelope::new(1.0, 0),
                Envelope::new(0.8, 4410),
                Envelope::new(0.8, 441_000),
                Envelope::new(0.0, 22050),
            )],
            voices: [1.0, 0.6, 0.8, 0.7, 0.7]
                .into_iter()
                .map(|level| Voice::new(level, 0))
                .collect(),
        }
    }
}

impl MixConfig {
    /// Read and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&source, &path.display().to_string())?;
        info!(
            "loaded {} ({} instruments, {} voices)",
            path.display(),
            config.instruments.len(),
            config.voices.len()
        );
        Ok(config)
    }

    /// Parse and validate configuration text. `origin` names the source in
    /// error messages.
    pub fn from_json_str(source: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: MixConfig =
            serde_json::from_str(source).map_err(|e| parse_error(origin, &e))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-references and envelope times.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.level.is_finite() {
            return Err(invalid(format!("master level {} is not finite", self.level)));
        }
        for (i, instrument) in self.instruments.iter().enumerate() {
            let segments = [
                ("attack", &instrument.attack),
                ("decay", &instrument.decay),
                ("sustain", &instrument.sustain),
                ("release", &instrument.release),
            ];
            for (name, segment) in segments {
                if segment.time < 0 {
                    return Err(invalid(format!(
                        "instrument {i} {name} time {} is negative",
                        segment.time
                    )));
                }
            }
        }
        for (i, voice) in self.voices.iter().enumerate() {
            if voice.instrument >= self.instruments.len() {
                return Err(invalid(format!(
                    "voice {i} uses instrument {} but only {} are defined",
                    voice.instrument,
                    self.instruments.len()
                )));
            }
        }
        Ok(())
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write to `path` through a temporary file in the same directory, so
    /// readers never see a half-written file.
    pub fn save_atomic(&self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        let path = path.as_ref();
        let json = self.to_json_pretty()?;
        let tmp = temp_path(path);
        if let Err(e) = fs::write(&tmp, json).and_then(|()| fs::rename(&tmp, path)) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        debug!("saved mix configuration to {}", path.display());
        Ok(())
    }
}

fn parse_error(origin: &str, e: &serde_json::Error) -> ConfigError {
    let (line, column) = (e.line(), e.column());
    let text = e.to_string();
    let suffix = format!(" at line {line} column {column}");
    let message = text.strip_suffix(&suffix).unwrap_or(&text).to_string();
    ConfigError::Parse {
        origin: origin.to_string(),
        line,
        column,
        message,
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Invalid { message }
}

/// A temporary sibling of `path`, unique per call within this process.
fn temp_path(path: &Path) -> PathBuf {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mix".to_string());
    let n = NEXT.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{name}.{}.{n}.tmp", std::process::id()))
}
