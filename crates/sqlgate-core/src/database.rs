//! Logical database identifiers and the registry of known databases.
//!
//! The gateway treats database identifiers as opaque strings. The only check
//! it performs is membership in the configured [`DatabaseRegistry`], and that
//! check happens before any translation or execution is attempted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, CoreResult};

/// Identifier of a logical database (e.g. `hr`, `finance`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatabaseId(String);

impl DatabaseId {
    /// Wrap a raw identifier without checking membership.
    ///
    /// Prefer [`DatabaseRegistry::resolve`] for anything user-supplied.
    #[must_use]
    pub fn new_unchecked(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatabaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DatabaseId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A configured logical database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseDescriptor {
    /// Logical identifier.
    pub id: DatabaseId,
    /// Location of the backing database file.
    pub path: PathBuf,
}

/// The fixed, externally configured set of logical databases.
///
/// # Example
///
/// ```
/// use sqlgate_core::DatabaseRegistry;
///
/// let registry = DatabaseRegistry::new()
///     .with_database("hr", "data/hr.db")
///     .with_database("finance", "data/finance.db");
///
/// assert!(registry.resolve("hr").is_ok());
/// assert!(registry.resolve("payroll").is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseRegistry {
    databases: BTreeMap<DatabaseId, PathBuf>,
}

impl DatabaseRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a database.
    #[must_use]
    pub fn with_database(mut self, id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.insert(id, path);
        self
    }

    /// Register a database in place.
    pub fn insert(&mut self, id: impl Into<String>, path: impl Into<PathBuf>) {
        self.databases
            .insert(DatabaseId::new_unchecked(id), path.into());
    }

    /// Resolve a raw identifier into a known [`DatabaseId`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownDatabase`] if the identifier is not configured.
    pub fn resolve(&self, raw: &str) -> CoreResult<DatabaseId> {
        self.databases
            .get_key_value(raw)
            .map(|(id, _)| id.clone())
            .ok_or_else(|| CoreError::UnknownDatabase(raw.to_string()))
    }

    /// Whether the identifier is configured.
    #[must_use]
    pub fn contains(&self, raw: &str) -> bool {
        self.databases.contains_key(raw)
    }

    /// Backing file of a database.
    #[must_use]
    pub fn path_of(&self, id: &DatabaseId) -> Option<&Path> {
        self.databases.get(id).map(PathBuf::as_path)
    }

    /// All configured databases, ordered by identifier.
    #[must_use]
    pub fn list(&self) -> Vec<DatabaseDescriptor> {
        self.databases
            .iter()
            .map(|(id, path)| DatabaseDescriptor {
                id: id.clone(),
                path: path.clone(),
            })
            .collect()
    }

    /// Number of configured databases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.databases.len()
    }

    /// Whether no database is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.databases.is_empty()
    }
}

impl std::borrow::Borrow<str> for DatabaseId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> DatabaseRegistry {
        DatabaseRegistry::new()
            .with_database("hr", "data/hr.db")
            .with_database("finance", "data/finance.db")
    }

    #[test]
    fn test_resolve_known_database() {
        let id = registry().resolve("hr").unwrap();
        assert_eq!(id.as_str(), "hr");
    }

    #[test]
    fn test_resolve_unknown_database() {
        let err = registry().resolve("HR").unwrap_err();
        assert_eq!(err, CoreError::UnknownDatabase("HR".to_string()));
    }

    #[test]
    fn test_list_is_ordered() {
        let ids: Vec<String> = registry()
            .list()
            .into_iter()
            .map(|d| d.id.to_string())
            .collect();
        assert_eq!(ids, vec!["finance", "hr"]);
    }

    #[test]
    fn test_path_of() {
        let reg = registry();
        let id = reg.resolve("finance").unwrap();
        assert_eq!(reg.path_of(&id), Some(Path::new("data/finance.db")));
    }
}
