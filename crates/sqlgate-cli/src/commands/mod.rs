//! CLI command implementations.

pub(crate) mod config;
pub(crate) mod databases;
pub(crate) mod decide;
pub(crate) mod pending;
pub(crate) mod stats;
pub(crate) mod submit;

use serde::Serialize;

/// How command results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    /// Colored tables for a terminal.
    Pretty,
    /// One JSON document on stdout.
    Json,
}

impl OutputFormat {
    pub(crate) fn parse(raw: &str) -> Self {
        match raw {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Print a value as pretty JSON.
pub(crate) fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Shorten a statement to fit a table column.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_owned();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::parse("json"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("pretty"), OutputFormat::Pretty);
        assert_eq!(OutputFormat::parse("yaml"), OutputFormat::Pretty);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("SELECT 1;", 20), "SELECT 1;");
        assert_eq!(truncate("SELECT * FROM employees;", 10), "SELECT ...");
    }
}
