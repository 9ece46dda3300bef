//! Configuration struct definitions.
//!
//! Every section derives `Default` with the same values as the embedded
//! `defaults.toml`, so a partially specified file still deserializes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level sqlgate configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Gateway settings.
    pub gateway: GatewaySection,
    /// Logical databases by identifier.
    pub databases: BTreeMap<String, DatabaseSection>,
    /// Safety validator settings.
    pub safety: SafetySection,
    /// Risk assessor settings.
    pub risk: RiskSection,
    /// Logging settings.
    pub logging: LoggingSection,
}

impl Default for Config {
    fn default() -> Self {
        let databases = ["hr", "healthcare", "ecommerce", "finance", "education"]
            .into_iter()
            .map(|id| {
                (
                    id.to_owned(),
                    DatabaseSection {
                        path: PathBuf::from(format!("{id}.db")),
                    },
                )
            })
            .collect();

        Self {
            gateway: GatewaySection::default(),
            databases,
            safety: SafetySection::default(),
            risk: RiskSection::default(),
            logging: LoggingSection::default(),
        }
    }
}

impl Config {
    /// Resolve a configured path against `gateway.data_dir`.
    ///
    /// Absolute paths are returned unchanged.
    #[must_use]
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.gateway.data_dir.join(path)
        }
    }

    /// Location of the durable pending-operation store.
    #[must_use]
    pub fn pending_db_path(&self) -> PathBuf {
        self.resolve_path(&self.gateway.pending_db)
    }

    /// Resolved log directory, if file logging is configured.
    #[must_use]
    pub fn log_dir(&self) -> Option<PathBuf> {
        self.logging.dir.as_deref().map(|dir| self.resolve_path(dir))
    }

    /// Every configured database with its resolved file path, ordered by id.
    #[must_use]
    pub fn database_paths(&self) -> Vec<(String, PathBuf)> {
        self.databases
            .iter()
            .map(|(id, section)| (id.clone(), self.resolve_path(&section.path)))
            .collect()
    }
}

/// `[gateway]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySection {
    /// Base directory for relative paths.
    pub data_dir: PathBuf,
    /// Pending-operation store file.
    pub pending_db: PathBuf,
    /// How many conversation turns the context tracker keeps.
    pub context_capacity: usize,
    /// How many recent turns are rendered for the translator.
    pub prompt_turns: usize,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            pending_db: PathBuf::from("pending.db"),
            context_capacity: 10,
            prompt_turns: 3,
        }
    }
}

/// `[databases.<id>]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSection {
    /// Backing database file.
    pub path: PathBuf,
}

/// `[safety]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetySection {
    /// Case-insensitive substrings that reject a statement outright.
    pub denylist: Vec<String>,
}

impl Default for SafetySection {
    fn default() -> Self {
        Self {
            denylist: DEFAULT_DENYLIST.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}

/// Substrings rejected by the default safety configuration.
pub const DEFAULT_DENYLIST: &[&str] = &[
    "drop",
    "truncate",
    "alter",
    "create",
    "shutdown",
    "delete database",
    "attach",
    "detach",
    "replace",
    "grant",
    "revoke",
    "exec(",
    "execute(",
    "pragma",
    "attach database",
];

/// `[risk]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskSection {
    /// Database id → risk factor text for sensitive domains.
    pub sensitive_domains: BTreeMap<String, String>,
}

impl Default for RiskSection {
    fn default() -> Self {
        let mut sensitive_domains = BTreeMap::new();
        sensitive_domains.insert(
            "finance".to_owned(),
            "Financial data - high sensitivity".to_owned(),
        );
        sensitive_domains.insert(
            "healthcare".to_owned(),
            "Healthcare data - HIPAA compliance required".to_owned(),
        );
        Self { sensitive_domains }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Level filter (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Output format (`pretty`, `compact`, `json`, `full`).
    pub format: String,
    /// Per-target directives such as `sqlgate_approval=debug`.
    pub directives: Vec<String>,
    /// Write daily-rotated log files here instead of stderr.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "pretty".to_owned(),
            directives: Vec::new(),
            dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_path() {
        let config = Config::default();
        assert_eq!(config.pending_db_path(), PathBuf::from("data/pending.db"));
    }

    #[test]
    fn test_log_dir_is_optional_and_resolved() {
        let mut config = Config::default();
        assert!(config.log_dir().is_none());

        config.logging.dir = Some(PathBuf::from("logs"));
        assert_eq!(config.log_dir(), Some(PathBuf::from("data/logs")));
    }

    #[test]
    fn test_resolve_absolute_path() {
        let mut config = Config::default();
        config.gateway.pending_db = PathBuf::from("/var/lib/sqlgate/pending.db");
        assert_eq!(
            config.pending_db_path(),
            PathBuf::from("/var/lib/sqlgate/pending.db")
        );
    }

    #[test]
    fn test_database_paths_are_ordered() {
        let ids: Vec<String> = Config::default()
            .database_paths()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(
            ids,
            vec!["ecommerce", "education", "finance", "healthcare", "hr"]
        );
    }

    #[test]
    fn test_partial_section_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [gateway]
            context_capacity = 20
        "#,
        )
        .unwrap();
        assert_eq!(config.gateway.context_capacity, 20);
        assert_eq!(config.gateway.prompt_turns, 3);
        assert_eq!(config.safety.denylist.len(), DEFAULT_DENYLIST.len());
    }
}
