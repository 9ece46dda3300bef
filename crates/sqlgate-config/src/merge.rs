//! Layered merging of TOML trees with per-field source tracking.

use std::collections::HashMap;
use std::fmt;

/// Which configuration layer a value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLayer {
    /// Compiled-in defaults (`defaults.toml`).
    Defaults,
    /// System-wide configuration (`/etc/sqlgate/config.toml`).
    System,
    /// User-level configuration (`~/.sqlgate/config.toml`).
    User,
    /// File passed explicitly on the command line.
    Explicit,
    /// Environment variable fallback.
    Environment,
}

impl fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Defaults => write!(f, "defaults"),
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Explicit => write!(f, "explicit"),
            Self::Environment => write!(f, "env"),
        }
    }
}

/// Dotted field path → layer that last set it.
pub type FieldSources = HashMap<String, ConfigLayer>;

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Deep-merge `overlay` into `base`, recording which layer set each leaf.
///
/// Tables merge per key. Scalars and arrays from the overlay replace the
/// base value wholesale.
pub fn deep_merge_tracking(
    base: &mut toml::Value,
    overlay: &toml::Value,
    prefix: &str,
    layer: &ConfigLayer,
    sources: &mut FieldSources,
) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let path = join_path(prefix, key);
                match base_table.get_mut(key) {
                    Some(base_val) if overlay_val.is_table() => {
                        deep_merge_tracking(base_val, overlay_val, &path, layer, sources);
                    },
                    Some(base_val) => {
                        *base_val = overlay_val.clone();
                        sources.insert(path, layer.clone());
                    },
                    None => {
                        base_table.insert(key.clone(), overlay_val.clone());
                        record_leaves(overlay_val, &path, layer, sources);
                    },
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
            record_leaves(overlay, prefix, layer, sources);
        },
    }
}

/// Record every leaf under `val` as set by `layer`.
pub fn record_leaves(val: &toml::Value, prefix: &str, layer: &ConfigLayer, sources: &mut FieldSources) {
    if let toml::Value::Table(table) = val {
        for (key, child) in table {
            record_leaves(child, &join_path(prefix, key), layer, sources);
        }
    } else {
        sources.insert(prefix.to_owned(), layer.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> toml::Value {
        toml::from_str(s).unwrap()
    }

    #[test]
    fn test_scalar_override_tracks_layer() {
        let mut base = parse("[gateway]\ncontext_capacity = 10\nprompt_turns = 3\n");
        let mut sources = FieldSources::new();
        record_leaves(&base, "", &ConfigLayer::Defaults, &mut sources);

        let overlay = parse("[gateway]\ncontext_capacity = 25\n");
        deep_merge_tracking(&mut base, &overlay, "", &ConfigLayer::User, &mut sources);

        assert_eq!(base["gateway"]["context_capacity"].as_integer(), Some(25));
        assert_eq!(base["gateway"]["prompt_turns"].as_integer(), Some(3));
        assert_eq!(
            sources.get("gateway.context_capacity"),
            Some(&ConfigLayer::User)
        );
        assert_eq!(
            sources.get("gateway.prompt_turns"),
            Some(&ConfigLayer::Defaults)
        );
    }

    #[test]
    fn test_new_table_is_added() {
        let mut base = parse("[databases.hr]\npath = \"hr.db\"\n");
        let mut sources = FieldSources::new();
        let overlay = parse("[databases.crm]\npath = \"crm.db\"\n");
        deep_merge_tracking(&mut base, &overlay, "", &ConfigLayer::Explicit, &mut sources);

        assert!(base["databases"].get("hr").is_some());
        assert_eq!(base["databases"]["crm"]["path"].as_str(), Some("crm.db"));
        assert_eq!(
            sources.get("databases.crm.path"),
            Some(&ConfigLayer::Explicit)
        );
    }

    #[test]
    fn test_arrays_replace() {
        let mut base = parse("[safety]\ndenylist = [\"drop\", \"alter\"]\n");
        let mut sources = FieldSources::new();
        let overlay = parse("[safety]\ndenylist = [\"grant\"]\n");
        deep_merge_tracking(&mut base, &overlay, "", &ConfigLayer::System, &mut sources);

        let list = base["safety"]["denylist"].as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].as_str(), Some("grant"));
    }
}
