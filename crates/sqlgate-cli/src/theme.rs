//! CLI theme and styling.

use colored::Colorize;
use sqlgate_approval::PendingStatus;
use sqlgate_core::RiskLevel;

/// CLI theme configuration.
pub(crate) struct Theme;

impl Theme {
    /// Format a header.
    pub(crate) fn header(text: &str) -> String {
        format!("{}", text.bold().cyan())
    }

    /// Format a success message.
    pub(crate) fn success(text: &str) -> String {
        format!("{} {}", "✓".green(), text)
    }

    /// Format an error message.
    pub(crate) fn error(text: &str) -> String {
        format!("{} {}", "✗".red(), text.red())
    }

    /// Format a warning message.
    pub(crate) fn warning(text: &str) -> String {
        format!("{} {}", "!".yellow(), text.yellow())
    }

    /// Format an info message.
    pub(crate) fn info(text: &str) -> String {
        format!("{} {}", "i".blue(), text)
    }

    /// Format a dimmed message.
    pub(crate) fn dimmed(text: &str) -> String {
        format!("{}", text.dimmed())
    }

    /// Format a separator line.
    pub(crate) fn separator() -> String {
        "━".repeat(50).dimmed().to_string()
    }

    /// Color a risk level by severity.
    pub(crate) fn risk(level: RiskLevel) -> String {
        let text = level.to_string();
        match level {
            RiskLevel::Low => text.green().to_string(),
            RiskLevel::Medium => text.yellow().to_string(),
            RiskLevel::High => text.red().to_string(),
            RiskLevel::Critical => text.red().bold().to_string(),
        }
    }

    /// Color a pending status.
    pub(crate) fn status(status: PendingStatus) -> String {
        let text = status.as_str();
        match status {
            PendingStatus::Pending => text.yellow().to_string(),
            PendingStatus::Approved => text.green().to_string(),
            PendingStatus::Rejected => text.red().to_string(),
        }
    }

    /// Format a SQL statement.
    pub(crate) fn sql(text: &str) -> String {
        format!("{}", text.bright_white())
    }
}
