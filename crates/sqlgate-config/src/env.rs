//! Environment variable fallbacks.
//!
//! Env vars only fill fields that no config file set; a value coming from
//! the system, user or explicit layer always wins.

use std::collections::HashMap;

use tracing::debug;

use crate::merge::{ConfigLayer, FieldSources};

/// Environment variable → dotted config field.
const ENV_MAPPINGS: &[(&str, &str)] = &[
    ("SQLGATE_LOG_LEVEL", "logging.level"),
    ("SQLGATE_LOG_DIR", "logging.dir"),
    ("SQLGATE_PENDING_DB", "gateway.pending_db"),
    ("SQLGATE_DATA_DIR", "gateway.data_dir"),
];

/// Apply env var fallbacks to fields still at their default.
///
/// Returns the number of env vars applied.
pub fn apply_env_fallbacks<S: ::std::hash::BuildHasher>(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env_vars: &HashMap<String, String, S>,
) -> usize {
    let mut count: usize = 0;

    for (var_name, field_path) in ENV_MAPPINGS {
        let set_by_file = sources
            .get(*field_path)
            .is_some_and(|layer| *layer != ConfigLayer::Defaults);
        if set_by_file {
            continue;
        }

        let Some(val) = env_vars.get(*var_name) else {
            continue;
        };

        debug!(var = *var_name, field = *field_path, "applying env var fallback");
        set_string_field(merged, field_path, val);
        sources.insert((*field_path).to_owned(), ConfigLayer::Environment);
        count = count.saturating_add(1);
    }

    count
}

/// Set a string leaf, creating intermediate tables as needed.
fn set_string_field(root: &mut toml::Value, path: &str, val: &str) {
    let Some((parents, leaf)) = path.rsplit_once('.') else {
        if let Some(table) = root.as_table_mut() {
            table.insert(path.to_owned(), toml::Value::String(val.to_owned()));
        }
        return;
    };

    let mut current = root;
    for segment in parents.split('.') {
        let Some(table) = current.as_table_mut() else {
            return;
        };
        current = table
            .entry(segment.to_owned())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }

    if let Some(table) = current.as_table_mut() {
        table.insert(leaf.to_owned(), toml::Value::String(val.to_owned()));
    }
}

/// Collect all current environment variables into a map.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}
