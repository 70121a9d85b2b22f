use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;

use overtone_core::dsp::SAMPLE_RATE;
use overtone_core::dsp::renderer::WAV_HEADER_LEN;
use overtone_core::generators::{self, Scale};
use overtone_core::{Mix, MixConfig, Sequence, Stream};

const DEFAULT_CONFIG: &str = "config.json";

/// Bytes copied to stdout per write.
const COPY_CHUNK: usize = 1024;

#[derive(Parser)]
#[command(name = "overtone", version, about = "Additive synthesizer streaming WAV to stdout")]
struct Cli {
    /// Mix configuration (instruments, voices, level)
    #[arg(long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,
    /// Generator producing the looped sequence
    #[arg(long, value_enum, default_value_t = SequenceKind::Basic)]
    sequence: SequenceKind,
    #[arg(long, value_enum, default_value_t = ScaleKind::Major)]
    scale: ScaleKind,
    /// Stop after this many seconds of audio; streams forever if omitted
    #[arg(long)]
    seconds: Option<f64>,
    /// Seed for the random walk
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Clone, Copy, ValueEnum)]
enum SequenceKind {
    Basic,
    Chords,
    AutoChords,
}

#[derive(Clone, Copy, ValueEnum)]
enum ScaleKind {
    Major,
    Minor,
    MelodicMinor,
    HarmonicMinor,
}

impl ScaleKind {
    fn pitches(self) -> &'static Scale {
        match self {
            ScaleKind::Major => &generators::MAJOR,
            ScaleKind::Minor => &generators::MINOR,
            ScaleKind::MelodicMinor => &generators::MELODIC_MINOR,
            ScaleKind::HarmonicMinor => &generators::HARMONIC_MINOR,
        }
    }
}

fn main() -> Result<()> {
    // Logs on stderr; stdout carries audio
    env_logger::init();
    let cli = Cli::parse();

    let byte_limit = match cli.seconds {
        Some(s) if !(s.is_finite() && s >= 0.0) => bail!("--seconds must be a non-negative number"),
        Some(s) => Some(WAV_HEADER_LEN as u64 + (s * SAMPLE_RATE as f64).round() as u64 * 2),
        None => None,
    };

    let config = load_config(&cli.config)?;
    let mut mix = Mix::new(config);
    mix.set_next_sequence(build_sequence(cli.sequence, cli.scale, cli.seed));

    let mut stream = Stream::start(mix).context("starting synthesis worker")?;
    let written = copy_to_stdout(&mut stream, byte_limit)?;
    stream.shutdown();
    info!("wrote {written} bytes");
    Ok(())
}

fn load_config(path: &Path) -> Result<MixConfig> {
    if path == Path::new(DEFAULT_CONFIG) && !path.exists() {
        info!("no {DEFAULT_CONFIG}, using the built-in mix");
        return Ok(MixConfig::default());
    }
    MixConfig::load(path).or_else(|e| {
        if let Ok(source) = fs::read_to_string(path) {
            eprint!("{}", e.report(&source));
        }
        Err(e).with_context(|| format!("loading {}", path.display()))
    })
}

fn build_sequence(kind: SequenceKind, scale: ScaleKind, seed: Option<u64>) -> Sequence {
    match kind {
        SequenceKind::Basic => {
            let rng = seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
            generators::basic(scale.pitches(), rng)
        }
        SequenceKind::Chords => generators::chords(scale.pitches()),
        SequenceKind::AutoChords => generators::auto_chords(),
    }
}

/// Copy the stream to stdout until `limit` bytes, end of stream, or the
/// reader goes away. Returns the number of bytes written.
fn copy_to_stdout(stream: &mut Stream, limit: Option<u64>) -> Result<u64> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut buf = [0u8; COPY_CHUNK];
    let mut written: u64 = 0;

    loop {
        let want = match limit {
            Some(limit) => (limit - written).min(COPY_CHUNK as u64) as usize,
            None => COPY_CHUNK,
        };
        if want == 0 {
            break;
        }
        let n = stream.read(&mut buf[..want]).context("reading audio stream")?;
        if n == 0 {
            break;
        }
        match out.write_all(&buf[..n]) {
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                info!("stdout closed");
                return Ok(written);
            }
            result => result.context("writing audio to stdout")?,
        }
        written += n as u64;
    }

    out.flush().context("flushing stdout")?;
    Ok(written)
}
