//! Source-annotated display for `config show`.

use std::fmt::{self, Write as _};

use crate::merge::FieldSources;
use crate::types::Config;

/// A resolved configuration together with source annotations.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The final merged configuration.
    pub config: Config,
    /// Dotted field path → which layer set the value.
    pub field_sources: FieldSources,
    /// Config file paths that were loaded, lowest precedence first.
    pub loaded_files: Vec<String>,
}

/// Output format for `config show`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowFormat {
    /// TOML with inline comments showing source.
    Toml,
    /// JSON.
    Json,
}

impl ResolvedConfig {
    /// Render the configuration, optionally restricted to one section.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the section does not exist.
    pub fn show(&self, format: ShowFormat, section: Option<&str>) -> Result<String, fmt::Error> {
        let tree = self.section_tree(section)?;
        match format {
            ShowFormat::Json => serde_json::to_string_pretty(&tree).map_err(|_| fmt::Error),
            ShowFormat::Toml => self.annotated_toml(&tree, section),
        }
    }

    fn section_tree(&self, section: Option<&str>) -> Result<toml::Value, fmt::Error> {
        let root = toml::Value::try_from(&self.config).map_err(|_| fmt::Error)?;
        match section {
            None => Ok(root),
            Some(name) => root.get(name).cloned().ok_or(fmt::Error),
        }
    }

    fn annotated_toml(&self, tree: &toml::Value, section: Option<&str>) -> Result<String, fmt::Error> {
        let body = toml::to_string_pretty(tree).map_err(|_| fmt::Error)?;

        let mut output = String::from("# Resolved sqlgate configuration\n");
        if !self.loaded_files.is_empty() {
            output.push_str("# Loaded files (lowest precedence first):\n");
            for path in &self.loaded_files {
                writeln!(output, "#   {path}")?;
            }
        }
        output.push('\n');

        // Track the current [table] header so keys resolve to full dotted paths.
        let mut table = section.unwrap_or("").to_owned();
        for line in body.lines() {
            let trimmed = line.trim();
            if let Some(header) = trimmed.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
                table = match section {
                    Some(s) => format!("{s}.{header}"),
                    None => header.to_owned(),
                };
                writeln!(output, "{line}")?;
                continue;
            }

            match self.annotation(trimmed, &table) {
                Some(layer) => writeln!(output, "{line}  # [{layer}]")?,
                None => writeln!(output, "{line}")?,
            }
        }

        Ok(output)
    }

    fn annotation(&self, line: &str, table: &str) -> Option<String> {
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let key = line.split('=').next()?.trim();
        let path = if table.is_empty() {
            key.to_owned()
        } else {
            format!("{table}.{key}")
        };
        self.field_sources.get(&path).map(ToString::to_string)
    }
}
