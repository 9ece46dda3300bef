//! Configuration errors.

use std::io;
use std::path::PathBuf;

/// Why a configuration could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A config file exists but could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A file passed with `--config` does not exist.
    #[error("config file {} does not exist", .0.display())]
    MissingFile(PathBuf),

    /// A config file is larger than the loader accepts.
    #[error("config file {} is {size} bytes, limit is {limit}", path.display())]
    TooLarge {
        /// Offending file.
        path: PathBuf,
        /// Actual size.
        size: u64,
        /// Accepted maximum.
        limit: u64,
    },

    /// TOML could not be parsed or did not match the config schema.
    #[error("invalid TOML in {origin}: {source}")]
    Parse {
        /// File path, or a label for the embedded defaults and merged tree.
        origin: String,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// The merged configuration broke a validation rule.
    #[error("invalid config value '{field}': {message}")]
    Invalid {
        /// Dotted field path.
        field: String,
        /// Rule that failed.
        message: String,
    },

    /// No home directory to look for `~/.sqlgate` in.
    #[error("could not determine home directory")]
    NoHomeDir,
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
