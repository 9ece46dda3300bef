//! Subscriber setup for the gateway and its CLI.
//!
//! One formatting layer, one `EnvFilter`. The layer writes to stdout,
//! stderr, or daily-rotated files; rotated files never carry ANSI codes.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::error::{TelemetryError, TelemetryResult};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Line format of emitted events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, colored, for people at a terminal.
    #[default]
    Pretty,
    /// One line per event.
    Compact,
    /// One JSON object per event, fields and span context included.
    Json,
    /// `tracing-subscriber`'s stock format.
    Full,
}

impl LogFormat {
    /// Name used in configuration files.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pretty => "pretty",
            Self::Compact => "compact",
            Self::Json => "json",
            Self::Full => "full",
        }
    }
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Pretty, Self::Compact, Self::Json, Self::Full]
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| TelemetryError::UnknownFormat(s.to_owned()))
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where events go.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    /// Standard output.
    Stdout,
    /// Standard error, so command output on stdout stays clean.
    #[default]
    Stderr,
    /// Daily-rotated files in a directory.
    File(PathBuf),
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Base level (`info`, `debug`, ...) or a full filter expression.
    pub level: String,
    /// Event format.
    pub format: LogFormat,
    /// Output destination.
    pub target: LogTarget,
    /// File name prefix for [`LogTarget::File`].
    pub file_prefix: String,
    /// Include timestamps.
    pub timestamps: bool,
    /// Emit ANSI colors. Forced off for file targets.
    pub ansi: bool,
    /// Extra per-target directives such as `sqlgate_approval=debug`.
    pub directives: Vec<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::default(),
            target: LogTarget::default(),
            file_prefix: "sqlgate".to_owned(),
            timestamps: true,
            ansi: true,
            directives: Vec::new(),
        }
    }
}

impl LogConfig {
    /// Config at `level` with every other field defaulted.
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Self::default()
        }
    }

    /// Set the event format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the destination.
    #[must_use]
    pub fn with_target(mut self, target: LogTarget) -> Self {
        self.target = target;
        self
    }

    /// Write daily-rotated `<prefix>.<date>` files under `directory`.
    #[must_use]
    pub fn with_file_logging(
        mut self,
        directory: impl Into<PathBuf>,
        prefix: impl Into<String>,
    ) -> Self {
        self.target = LogTarget::File(directory.into());
        self.file_prefix = prefix.into();
        self
    }

    /// Append a directive.
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// Drop timestamps, e.g. for snapshot-style output.
    #[must_use]
    pub fn without_timestamps(mut self) -> Self {
        self.timestamps = false;
        self
    }

    fn filter(&self) -> TelemetryResult<EnvFilter> {
        let invalid = |directive: &str, message: String| TelemetryError::InvalidFilter {
            directive: directive.to_owned(),
            message,
        };

        let mut filter =
            EnvFilter::try_new(&self.level).map_err(|e| invalid(&self.level, e.to_string()))?;
        for directive in &self.directives {
            let parsed = directive
                .parse()
                .map_err(|e: tracing_subscriber::filter::ParseError| {
                    invalid(directive, e.to_string())
                })?;
            filter = filter.add_directive(parsed);
        }
        Ok(filter)
    }

    fn layer<W>(&self, writer: W, ansi: bool) -> BoxedLayer
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let base = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(true);

        match (self.format, self.timestamps) {
            (LogFormat::Pretty, true) => base.pretty().boxed(),
            (LogFormat::Pretty, false) => base.pretty().without_time().boxed(),
            (LogFormat::Compact, true) => base.compact().boxed(),
            (LogFormat::Compact, false) => base.compact().without_time().boxed(),
            (LogFormat::Json, true) => base.json().with_current_span(true).boxed(),
            (LogFormat::Json, false) => base.json().with_current_span(true).without_time().boxed(),
            (LogFormat::Full, true) => base.boxed(),
            (LogFormat::Full, false) => base.without_time().boxed(),
        }
    }
}

/// Install the global subscriber described by `config`.
///
/// # Errors
///
/// Returns an error if a filter does not parse, the log directory cannot be
/// created, or a subscriber is already installed.
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = config.filter()?;

    let layer = match &config.target {
        LogTarget::Stdout => config.layer(std::io::stdout, config.ansi),
        LogTarget::Stderr => config.layer(std::io::stderr, config.ansi),
        LogTarget::File(dir) => {
            std::fs::create_dir_all(dir).map_err(|source| TelemetryError::LogDirectory {
                path: dir.clone(),
                source,
            })?;
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, &config.file_prefix);
            config.layer(appender, false)
        },
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init()
        .map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))
}
