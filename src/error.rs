use std::fmt;
use std::io;
use std::ops::Range;
use std::path::PathBuf;

use ariadne::{Config, IndexType, Label, Report, ReportKind, Source};

#[derive(Debug)]
pub enum EngineError {
    /// Instrument index past the end of the mix's instruments.
    InstrumentOutOfRange { index: usize, len: usize },
    Config(ConfigError),
    Io(io::Error),
    Serialize(serde_json::Error),
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: io::Error,
    },
    /// Malformed JSON or a value of the wrong shape. `line` and `column`
    /// are 1-based.
    Parse {
        origin: String,
        line: usize,
        column: usize,
        message: String,
    },
    /// Well-formed JSON describing an unusable mix.
    Invalid { message: String },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InstrumentOutOfRange { index, len } => {
                write!(f, "no such instrument: index {index} out of range for {len} instruments")
            }
            EngineError::Config(e) => write!(f, "Config error: {e}"),
            EngineError::Io(e) => write!(f, "I/O error: {e}"),
            EngineError::Serialize(e) => write!(f, "Serialization error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::InstrumentOutOfRange { .. } => None,
            EngineError::Config(e) => Some(e),
            EngineError::Io(e) => Some(e),
            EngineError::Serialize(e) => Some(e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "cannot read {}: {source}", path.display())
            }
            ConfigError::Parse { origin, line, column, message } => {
                write!(f, "{origin}:{line}:{column}: {message}")
            }
            ConfigError::Invalid { message } => write!(f, "invalid mix: {message}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl ConfigError {
    /// Render a diagnostic for this error against the configuration text
    /// it came from. Parse errors point at the offending location.
    pub fn report(&self, source: &str) -> String {
        let ConfigError::Parse { origin, line, column, message } = self else {
            return self.to_string();
        };

        let span = span_at(source, *line, *column);
        let id = origin.as_str();
        let mut out = Vec::new();
        let written = Report::build(ReportKind::Error, (id, span.clone()))
            .with_config(
                Config::default()
                    .with_color(false)
                    .with_index_type(IndexType::Byte),
            )
            .with_message("malformed mix configuration")
            .with_label(Label::new((id, span)).with_message(message))
            .finish()
            .write((id, Source::from(source)), &mut out);

        match written {
            Ok(()) => String::from_utf8_lossy(&out).into_owned(),
            Err(_) => self.to_string(),
        }
    }
}

/// One-character byte range at a 1-based line/column, clamped to `source`.
fn span_at(source: &str, line: usize, column: usize) -> Range<usize> {
    let line_start: usize = source
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    let start = (line_start + column.saturating_sub(1)).min(source.len());
    let end = (start + 1).min(source.len());
    start..end
}

impl From<ConfigError> for EngineError {
    fn from(e: ConfigError) -> Self {
        EngineError::Config(e)
    }
}

impl From<io::Error> for EngineError {
    fn from(e: io::Error) -> Self {
        EngineError::Io(e)
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Serialize(e)
    }
}
