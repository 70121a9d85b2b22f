//! Record a stretch of a running stream to a finite WAV file.

use std::io::{self, Read};
use std::path::Path;

use log::info;

use crate::dsp::SAMPLE_RATE;
use crate::dsp::renderer::WAV_HEADER_LEN;
use crate::error::EngineError;
use crate::stream::Stream;

const CHUNK: usize = 1024;

/// Read `samples` mono samples from a freshly started `stream` and write
/// them to `path` with correct size fields.
///
/// The stream must not have been read from yet: its streaming header is
/// consumed and checked first.
pub fn capture_wav(
    stream: &mut Stream,
    path: impl AsRef<Path>,
    samples: usize,
) -> Result<(), EngineError> {
    let path = path.as_ref();

    let mut header = [0u8; WAV_HEADER_LEN];
    stream.read_exact(&mut header)?;
    if &header[0..4] != b"RIFF" || &header[8..12] != b"WAVE" {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "stream does not start with a WAV header",
        )
        .into());
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).map_err(wav_error)?;

    let mut buf = [0u8; CHUNK];
    let mut remaining = samples * 2;
    while remaining > 0 {
        let n = remaining.min(CHUNK);
        stream.read_exact(&mut buf[..n])?;
        for pair in buf[..n].chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([pair[0], pair[1]]))
                .map_err(wav_error)?;
        }
        remaining -= n;
    }
    writer.finalize().map_err(wav_error)?;

    info!("captured {samples} samples to {}", path.display());
    Ok(())
}

fn wav_error(e: hound::Error) -> EngineError {
    match e {
        hound::Error::IoError(e) => EngineError::Io(e),
        other => EngineError::Io(io::Error::other(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MixConfig;
    use crate::mix::Mix;
    use crate::sequence::{Event, Sequence};

    #[test]
    fn captures_a_finite_wav() {
        let path = std::env::temp_dir().join(format!("overtone-capture-{}.wav", std::process::id()));
        let mut mix = Mix::new(MixConfig::default());
        mix.set_next_sequence(Sequence::new(vec![Event::on(0, 0, 69.0), Event::marker(100_000)]));
        let mut stream = Stream::start(mix).unwrap();

        capture_wav(&mut stream, &path, 20_000).unwrap();
        stream.shutdown();

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 44100);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.len(), 20_000);

        let samples: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert!(samples.iter().any(|&s| s != 0));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn rejects_a_stream_already_read() {
        let path = std::env::temp_dir().join(format!("overtone-capture-bad-{}.wav", std::process::id()));
        let mut stream = Stream::start(Mix::new(MixConfig::default())).unwrap();
        let mut skip = [0u8; WAV_HEADER_LEN];
        stream.read_exact(&mut skip).unwrap();

        let err = capture_wav(&mut stream, &path, 10).unwrap_err();
        assert!(matches!(err, EngineError::Io(_)), "{err:?}");
        assert!(!path.exists());
    }
}
