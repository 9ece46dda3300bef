#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Layered configuration for sqlgate.
//!
//! # Usage
//!
//! ```rust,no_run
//! use sqlgate_config::Config;
//!
//! let resolved = Config::load(None).unwrap();
//! for (id, path) in resolved.config.database_paths() {
//!     println!("{id}: {}", path.display());
//! }
//! ```
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Explicit** file passed with `--config`
//! 2. **User** (`~/.sqlgate/config.toml` or `$SQLGATE_HOME/config.toml`)
//! 3. **System** (`/etc/sqlgate/config.toml`)
//! 4. **Environment variables** (`SQLGATE_*`), fallback only
//! 5. **Embedded defaults** (`defaults.toml` compiled into the binary)
//!
//! This crate has no dependencies on other sqlgate crates. Turning the
//! config into a database registry or gateway happens where the binary
//! wires things together.

/// Environment variable fallback resolution.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Layered configuration merging with source tracking.
pub mod merge;
/// Resolved configuration display.
pub mod show;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use merge::ConfigLayer;
pub use show::{ResolvedConfig, ShowFormat};
pub use types::*;

impl Config {
    /// Load configuration with the full precedence chain.
    ///
    /// See [`loader::load`] for the algorithm.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the final
    /// configuration fails validation.
    pub fn load(explicit: Option<&std::path::Path>) -> ConfigResult<ResolvedConfig> {
        loader::load(None, explicit)
    }

    /// Load configuration with the user config directory overridden.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the final
    /// configuration fails validation.
    pub fn load_with_home(
        home_dir: &std::path::Path,
        explicit: Option<&std::path::Path>,
    ) -> ConfigResult<ResolvedConfig> {
        loader::load(Some(home_dir), explicit)
    }

    /// Load configuration from a single file (no layering).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }
}
