//! Config command - show the resolved configuration.

use sqlgate_config::{ResolvedConfig, ShowFormat};

use crate::theme::Theme;

/// Print the resolved configuration with source annotations.
pub(crate) fn show_config(
    resolved: &ResolvedConfig,
    format: &str,
    section: Option<&str>,
) -> anyhow::Result<()> {
    let show_format = match format {
        "json" => ShowFormat::Json,
        _ => ShowFormat::Toml,
    };

    match resolved.show(show_format, section) {
        Ok(output) => {
            println!("{output}");
            Ok(())
        },
        Err(_) => {
            let what = section.map_or_else(
                || "configuration".to_owned(),
                |s| format!("section '{s}'"),
            );
            println!("{}", Theme::error(&format!("Could not render {what}")));
            anyhow::bail!("failed to render {what}")
        },
    }
}

/// Validate the configuration and report where it came from.
pub(crate) fn validate_config(resolved: &ResolvedConfig) -> anyhow::Result<()> {
    sqlgate_config::validate::validate(&resolved.config)?;
    println!("{}", Theme::success("Configuration is valid"));
    for path in &resolved.loaded_files {
        println!("  {}", Theme::dimmed(path));
    }
    Ok(())
}
