pub mod config;
pub mod control;
pub mod dsp;
pub mod error;
pub mod generators;
pub mod mix;
pub mod sequence;
pub mod stream;

#[cfg(feature = "capture")]
pub mod capture;

pub use config::MixConfig;
pub use control::Controller;
pub use error::{ConfigError, EngineError};
pub use mix::Mix;
pub use sequence::{Event, EventKind, Pitch, Sequence};
pub use stream::{SharedMix, Stream};

use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Pitch held by every voice in a preview render (A4).
const PREVIEW_PITCH: f64 = 69.0;

/// WASM-exposed: return the overtone-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// A mix with every voice holding the preview pitch.
fn preview_mix(config: MixConfig) -> Mix {
    let voices = config.voices.len();
    let mut mix = Mix::new(config);
    mix.set_next_sequence(generators::held_notes(voices, PREVIEW_PITCH));
    mix
}

/// Render `blocks` filtered blocks of `config` with every voice holding
/// the preview pitch.
pub fn render_preview(config: MixConfig, blocks: usize) -> Vec<i16> {
    dsp::renderer::render_blocks(&mut preview_mix(config), blocks)
}

fn parse_config(config_json: &str) -> Result<MixConfig, JsValue> {
    MixConfig::from_json_str(config_json, "config.json")
        .map_err(|e| JsValue::from_str(&e.report(config_json)))
}

/// WASM-exposed: render a mix configuration to mono f32 samples in
/// [-1, 1] for AudioWorklet preview.
#[wasm_bindgen]
pub fn render_config_samples(config_json: &str, blocks: u32) -> Result<Vec<f32>, JsValue> {
    let config = parse_config(config_json)?;
    Ok(render_preview(config, blocks as usize)
        .into_iter()
        .map(|s| s as f32 / 32768.0)
        .collect())
}

/// WASM-exposed: render a mix configuration to a WAV byte array.
#[wasm_bindgen]
pub fn render_config_wav(config_json: &str, blocks: u32) -> Result<Vec<u8>, JsValue> {
    let config = parse_config(config_json)?;
    Ok(dsp::renderer::render_wav(&mut preview_mix(config), blocks as usize))
}

/// WASM-exposed: validate a mix configuration and return it as a JS
/// object with the configuration's own keys.
#[wasm_bindgen]
pub fn config_snapshot(config_json: &str) -> Result<JsValue, JsValue> {
    let config = parse_config(config_json)?;
    serde_wasm_bindgen::to_value(&config).map_err(|e| JsValue::from_str(&format!("{e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::BLOCK_SIZE;

    #[test]
    fn version_matches_manifest() {
        assert_eq!(core_version(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn preview_sounds_every_voice() {
        let samples = render_preview(MixConfig::default(), 2);
        assert_eq!(samples.len(), 2 * BLOCK_SIZE);
        assert!(samples.iter().any(|&s| s != 0));
    }

    #[test]
    fn preview_samples_are_normalized() {
        let json = MixConfig::default().to_json_pretty().unwrap();
        let samples = render_config_samples(&json, 1).unwrap();
        assert_eq!(samples.len(), BLOCK_SIZE);
        assert!(samples.iter().all(|s| (-1.0..=1.0).contains(s)));
    }
}
