//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Validate a fully merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_databases(config)?;
    validate_gateway(config)?;
    validate_safety(config)?;
    validate_risk(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.into(),
        message: message.into(),
    }
}

fn validate_databases(config: &Config) -> ConfigResult<()> {
    if config.databases.is_empty() {
        return Err(invalid(
            "databases",
            "at least one logical database must be configured",
        ));
    }

    for (id, section) in &config.databases {
        if id.trim().is_empty() {
            return Err(invalid("databases", "database identifier must not be empty"));
        }
        if section.path.as_os_str().is_empty() {
            return Err(invalid(
                format!("databases.{id}.path"),
                "database path must not be empty",
            ));
        }
    }

    Ok(())
}

fn validate_gateway(config: &Config) -> ConfigResult<()> {
    let g = &config.gateway;

    if g.pending_db.as_os_str().is_empty() {
        return Err(invalid("gateway.pending_db", "path must not be empty"));
    }

    if g.context_capacity == 0 {
        return Err(invalid(
            "gateway.context_capacity",
            "context capacity must be at least 1",
        ));
    }

    if g.prompt_turns > g.context_capacity {
        return Err(invalid(
            "gateway.prompt_turns",
            format!(
                "prompt_turns ({}) cannot exceed context_capacity ({})",
                g.prompt_turns, g.context_capacity
            ),
        ));
    }

    Ok(())
}

fn validate_safety(config: &Config) -> ConfigResult<()> {
    if let Some(index) = config
        .safety
        .denylist
        .iter()
        .position(|entry| entry.trim().is_empty())
    {
        return Err(invalid(
            format!("safety.denylist[{index}]"),
            "denylist entries must not be empty",
        ));
    }
    Ok(())
}

fn validate_risk(config: &Config) -> ConfigResult<()> {
    for id in config.risk.sensitive_domains.keys() {
        if !config.databases.contains_key(id) {
            return Err(invalid(
                format!("risk.sensitive_domains.{id}"),
                format!("'{id}' is not a configured database"),
            ));
        }
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.as_str()) {
        return Err(invalid(
            "logging.level",
            format!(
                "unsupported log level '{}'; expected one of: {}",
                config.logging.level,
                valid_levels.join(", ")
            ),
        ));
    }

    let valid_formats = ["pretty", "compact", "json", "full"];
    if !valid_formats.contains(&config.logging.format.as_str()) {
        return Err(invalid(
            "logging.format",
            format!(
                "unsupported log format '{}'; expected one of: {}",
                config.logging.format,
                valid_formats.join(", ")
            ),
        ));
    }

    if config
        .logging
        .dir
        .as_ref()
        .is_some_and(|dir| dir.as_os_str().is_empty())
    {
        return Err(invalid("logging.dir", "log directory must not be empty"));
    }

    Ok(())
}
