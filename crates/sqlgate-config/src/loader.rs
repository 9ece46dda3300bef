//! Config file discovery and layered loading.
//!
//! `Config::load()` works in these steps:
//! 1. Parse the embedded `defaults.toml` as the base tree
//! 2. Merge `/etc/sqlgate/config.toml` (system)
//! 3. Merge `~/.sqlgate/config.toml`, or `$SQLGATE_HOME/config.toml` (user)
//! 4. Merge the file passed with `--config` (explicit)
//! 5. Apply env var fallbacks for fields no file set
//! 6. Deserialize and validate

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{apply_env_fallbacks, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources, deep_merge_tracking, record_leaves};
use crate::show::ResolvedConfig;
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// System-wide config location.
const SYSTEM_CONFIG: &str = "/etc/sqlgate/config.toml";

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Load the configuration with layered file precedence.
///
/// `home_override` replaces the user config directory (the directory that
/// would otherwise be `~/.sqlgate`). `explicit` is a file given on the
/// command line; unlike the other layers it must exist.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, the explicit
/// file cannot be read, or the merged configuration fails validation.
pub fn load(home_override: Option<&Path>, explicit: Option<&Path>) -> ConfigResult<ResolvedConfig> {
    let env_vars = collect_env_vars();
    let user_dir = match home_override {
        Some(dir) => dir.to_path_buf(),
        None => user_config_dir(&env_vars)?,
    };
    load_layers(Path::new(SYSTEM_CONFIG), &user_dir, explicit, &env_vars)
}

/// Layered load with every input injected.
pub(crate) fn load_layers<S: ::std::hash::BuildHasher>(
    system_path: &Path,
    user_dir: &Path,
    explicit: Option<&Path>,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<ResolvedConfig> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::Parse {
            origin: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    let mut field_sources = FieldSources::new();
    let mut loaded_files = Vec::new();
    record_leaves(&merged, "", &ConfigLayer::Defaults, &mut field_sources);

    let user_path = user_dir.join("config.toml");
    let optional_layers = [
        (system_path, ConfigLayer::System),
        (user_path.as_path(), ConfigLayer::User),
    ];
    for (path, layer) in optional_layers {
        if let Some(overlay) = try_load_file(path)? {
            deep_merge_tracking(&mut merged, &overlay, "", &layer, &mut field_sources);
            loaded_files.push(path.display().to_string());
            info!(path = %path.display(), %layer, "loaded config layer");
        }
    }

    if let Some(path) = explicit {
        let overlay =
            try_load_file(path)?.ok_or_else(|| ConfigError::MissingFile(path.to_path_buf()))?;
        deep_merge_tracking(
            &mut merged,
            &overlay,
            "",
            &ConfigLayer::Explicit,
            &mut field_sources,
        );
        loaded_files.push(path.display().to_string());
        info!(path = %path.display(), "loaded explicit config");
    }

    let env_count = apply_env_fallbacks(&mut merged, &mut field_sources, env_vars);
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable fallbacks");
    }

    let config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse {
                origin: "<merged config>".to_owned(),
                source: e,
            })?;

    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        field_sources,
        loaded_files,
    })
}

/// Load a config from a single file (no layering).
///
/// Sections missing from the file take their built-in defaults.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let value =
        try_load_file(path)?.ok_or_else(|| ConfigError::MissingFile(path.to_path_buf()))?;

    let config: Config = value
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            origin: path.display().to_string(),
            source: e,
        })?;

    validate::validate(&config)?;
    Ok(config)
}

/// Try to load a file, returning `None` if the file doesn't exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            });
        },
    };

    let size = content.len() as u64;
    if size > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::TooLarge {
            path: path.to_path_buf(),
            size,
            limit: MAX_CONFIG_FILE_SIZE,
        });
    }

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::Parse {
        origin: path.display().to_string(),
        source: e,
    })?;

    Ok(Some(value))
}

/// Locate the user config directory.
///
/// `~/.sqlgate` wins when it holds a `config.toml`; otherwise
/// `$SQLGATE_HOME` is used if it names an existing directory.
fn user_config_dir<S: ::std::hash::BuildHasher>(
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<PathBuf> {
    let home = directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDir)?;
    let default_dir = home.join(".sqlgate");

    if default_dir.join("config.toml").is_file() {
        return Ok(default_dir);
    }

    if let Some(raw) = env_vars.get("SQLGATE_HOME") {
        match PathBuf::from(raw).canonicalize() {
            Ok(dir) if dir.is_dir() => return Ok(dir),
            _ => tracing::warn!(path = %raw, "SQLGATE_HOME is not a directory; ignoring"),
        }
    }

    Ok(default_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn test_defaults_deserialize_to_config() {
        let config: Config = toml::from_str(DEFAULTS_TOML).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_defaults_only() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = load_layers(
            &dir.path().join("missing-system.toml"),
            dir.path(),
            None,
            &no_env(),
        )
        .unwrap();

        assert!(resolved.loaded_files.is_empty());
        assert_eq!(resolved.config.gateway.context_capacity, 10);
        assert_eq!(
            resolved.field_sources.get("gateway.context_capacity"),
            Some(&ConfigLayer::Defaults)
        );
    }

    #[test]
    fn test_layer_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let system = dir.path().join("system.toml");
        std::fs::write(&system, "[gateway]\ncontext_capacity = 20\nprompt_turns = 4\n").unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "[gateway]\ncontext_capacity = 30\n",
        )
        .unwrap();
        let explicit = dir.path().join("explicit.toml");
        std::fs::write(&explicit, "[logging]\nformat = \"json\"\n").unwrap();

        let resolved = load_layers(&system, dir.path(), Some(&explicit), &no_env()).unwrap();
        let config = &resolved.config;

        assert_eq!(config.gateway.context_capacity, 30);
        assert_eq!(config.gateway.prompt_turns, 4);
        assert_eq!(config.logging.format, "json");
        assert_eq!(resolved.loaded_files.len(), 3);
        assert_eq!(
            resolved.field_sources.get("gateway.prompt_turns"),
            Some(&ConfigLayer::System)
        );
        assert_eq!(
            resolved.field_sources.get("logging.format"),
            Some(&ConfigLayer::Explicit)
        );
    }

    #[test]
    fn test_env_fallback_applies_only_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "[logging]\nlevel = \"warn\"\n").unwrap();

        let mut env = HashMap::new();
        env.insert("SQLGATE_LOG_LEVEL".to_owned(), "debug".to_owned());
        env.insert("SQLGATE_PENDING_DB".to_owned(), "/tmp/queue.db".to_owned());

        let resolved =
            load_layers(&dir.path().join("none.toml"), dir.path(), None, &env).unwrap();

        assert_eq!(resolved.config.logging.level, "warn");
        assert_eq!(
            resolved.config.pending_db_path(),
            PathBuf::from("/tmp/queue.db")
        );
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_layers(
            &dir.path().join("none.toml"),
            dir.path(),
            Some(&dir.path().join("nope.toml")),
            &no_env(),
        );
        assert!(matches!(result, Err(ConfigError::MissingFile(_))));
    }

    #[test]
    fn test_invalid_merged_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "[gateway]\ncontext_capacity = 0\n",
        )
        .unwrap();
        let result = load_layers(&dir.path().join("none.toml"), dir.path(), None, &no_env());
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_load_file_nonexistent() {
        let result = load_file(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::MissingFile(_))));
    }

    #[test]
    fn test_load_file_replaces_database_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("only-crm.toml");
        std::fs::write(
            &path,
            "[databases.crm]\npath = \"crm.db\"\n\n[risk.sensitive_domains]\n",
        )
        .unwrap();

        let config = load_file(&path).unwrap();
        assert_eq!(config.databases.len(), 1);
        assert!(config.databases.contains_key("crm"));
    }

    #[test]
    fn test_malformed_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[gateway\n").unwrap();
        assert!(matches!(
            try_load_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_oversized_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("huge.toml");
        let data = "x = \"".to_owned() + &"a".repeat(1_100_000) + "\"";
        std::fs::write(&file_path, data).unwrap();

        assert!(matches!(
            try_load_file(&file_path),
            Err(ConfigError::TooLarge { .. })
        ));
    }
}
