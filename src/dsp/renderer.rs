//! Block rendering: synthesize, filter and quantize to 16-bit PCM, then
//! frame the result as WAV.

use crate::mix::Mix;

use super::filter::OverlapAddFilter;
use super::{BLOCK_SIZE, SAMPLE_RATE};

/// Size of a canonical PCM WAV header.
pub const WAV_HEADER_LEN: usize = 44;

/// Size field value for a stream of unknown length.
const STREAMING_SIZE: u32 = 0xFFFF_FFFF;

/// Something that can synthesize raw blocks for the renderer.
pub trait SampleSource {
    /// Fill `buf` with raw samples and return the master level to apply.
    fn fill_block(&mut self, buf: &mut [f64]) -> f64;
}

impl SampleSource for Mix {
    fn fill_block(&mut self, buf: &mut [f64]) -> f64 {
        self.fill(buf);
        self.level
    }
}

/// Runs raw blocks through the overlap-add filter and quantizes them.
#[derive(Debug, Clone)]
pub struct BlockRenderer {
    filter: OverlapAddFilter,
    raw: Vec<f64>,
}

impl Default for BlockRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockRenderer {
    pub fn new() -> Self {
        Self::with_filter(OverlapAddFilter::new(BLOCK_SIZE))
    }

    pub fn with_filter(filter: OverlapAddFilter) -> Self {
        let n = filter.block_size();
        BlockRenderer {
            filter,
            raw: vec![0.0; n],
        }
    }

    pub fn block_size(&self) -> usize {
        self.raw.len()
    }

    /// Synthesize, filter and quantize the next block.
    pub fn next_block<S: SampleSource + ?Sized>(&mut self, source: &mut S) -> Vec<i16> {
        let level = source.fill_block(&mut self.raw);
        quantize(self.filter.process(&self.raw), level)
    }
}

/// Scale a filtered block to 16-bit PCM, saturating at the i16 range.
///
/// The gain is `len / 1024 * level`, which undoes most of the `1/N` left
/// by the scaled forward transforms.
pub fn quantize(out: &[f64], level: f64) -> Vec<i16> {
    let gain = out.len() as f64 / 1024.0 * level;
    out.iter()
        .map(|&s| (gain * s).round().clamp(i16::MIN as f64, i16::MAX as f64) as i16)
        .collect()
}

/// Little-endian byte encoding of PCM samples.
pub fn pcm_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// Mono 16-bit WAV header for a stream of unknown length.
pub fn wav_stream_header() -> [u8; WAV_HEADER_LEN] {
    encode_header(STREAMING_SIZE, STREAMING_SIZE)
}

/// Mono 16-bit WAV header for `data_size` bytes of samples.
pub fn wav_header(data_size: u32) -> [u8; WAV_HEADER_LEN] {
    encode_header(data_size.saturating_add(36), data_size)
}

fn encode_header(riff_size: u32, data_size: u32) -> [u8; WAV_HEADER_LEN] {
    let channels: u16 = 1;
    let bits_per_sample: u16 = 16;
    let block_align = channels * (bits_per_sample / 8);
    let byte_rate = SAMPLE_RATE * block_align as u32;

    let mut buf = [0u8; WAV_HEADER_LEN];
    let fields: [&[u8]; 13] = [
        b"RIFF",
        &riff_size.to_le_bytes(),
        b"WAVE",
        b"fmt ",
        &16u32.to_le_bytes(), // fmt chunk size
        &1u16.to_le_bytes(),  // PCM
        &channels.to_le_bytes(),
        &SAMPLE_RATE.to_le_bytes(),
        &byte_rate.to_le_bytes(),
        &block_align.to_le_bytes(),
        &bits_per_sample.to_le_bytes(),
        b"data",
        &data_size.to_le_bytes(),
    ];
    let mut at = 0;
    for field in fields {
        buf[at..at + field.len()].copy_from_slice(field);
        at += field.len();
    }
    buf
}

/// Render `blocks` filtered blocks synchronously.
pub fn render_blocks(mix: &mut Mix, blocks: usize) -> Vec<i16> {
    let mut renderer = BlockRenderer::new();
    let mut samples = Vec::with_capacity(blocks * renderer.block_size());
    for _ in 0..blocks {
        samples.extend(renderer.next_block(mix));
    }
    samples
}

/// Render `blocks` filtered blocks to a complete WAV file.
pub fn render_wav(mix: &mut Mix, blocks: usize) -> Vec<u8> {
    let samples = render_blocks(mix, blocks);
    let data = pcm_bytes(&samples);
    let data_size = u32::try_from(data.len()).unwrap_or(u32::MAX);

    let mut wav = Vec::with_capacity(WAV_HEADER_LEN + data.len());
    wav.extend_from_slice(&wav_header(data_size));
    wav.extend_from_slice(&data);
    wav
}
