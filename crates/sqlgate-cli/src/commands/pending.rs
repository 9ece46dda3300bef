//! Pending command - inspect the approval queue.

use colored::Colorize;
use sqlgate_approval::{Gateway, OperationId, PendingStatus};

use super::{OutputFormat, print_json, truncate};
use crate::theme::Theme;

/// List operations, optionally filtered by status.
pub(crate) fn list_pending(
    gateway: &Gateway,
    status: Option<PendingStatus>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let operations = gateway.list(status)?;

    if format == OutputFormat::Json {
        return print_json(&operations);
    }

    if operations.is_empty() {
        println!("{}", Theme::info("No operations found"));
        return Ok(());
    }

    let title = status.map_or_else(
        || "All Operations".to_owned(),
        |s| format!("{} Operations", s.as_str()),
    );
    println!("\n{}", Theme::header(&title));
    println!(
        "{:>6} {:>10} {:>12} {:>10} {:>9} {}",
        "ID".dimmed(),
        "STATUS".dimmed(),
        "DATABASE".dimmed(),
        "KIND".dimmed(),
        "RISK".dimmed(),
        "SQL".dimmed()
    );
    println!("{}", Theme::separator());

    for op in operations {
        let risk = op
            .risk_assessment()
            .map_or_else(|| "-".to_owned(), |a| Theme::risk(a.level));
        println!(
            "{:>6} {:>10} {:>12} {:>10} {:>9} {}",
            format!("#{}", op.id),
            Theme::status(op.status),
            op.target_database,
            op.operation_kind,
            risk,
            truncate(&op.sql_text, 60)
        );
    }

    println!();
    Ok(())
}

/// Show one operation with its assessment and affected tables.
pub(crate) fn show_pending(gateway: &Gateway, id: OperationId, format: OutputFormat) -> anyhow::Result<()> {
    let details = gateway.details(id)?;

    if format == OutputFormat::Json {
        return print_json(&details);
    }

    let op = &details.operation;
    println!("\n{}", Theme::header(&format!("Operation #{}", op.id)));
    println!("{}", Theme::separator());
    println!("  Status:    {}", Theme::status(op.status));
    println!("  Database:  {}", op.target_database);
    println!("  Kind:      {}", op.operation_kind);
    if let Some(text) = op.natural_language() {
        println!("  Request:   {text}");
    }
    println!("  SQL:       {}", Theme::sql(&op.sql_text));
    println!("  Created:   {}", op.created_at.0.format("%Y-%m-%d %H:%M:%S UTC"));
    if let Some(decided) = &op.decided_at {
        println!("  Decided:   {}", decided.0.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(executed) = &op.executed_sql {
        println!("  Executed:  {}", Theme::sql(executed));
    }

    println!("\n  Risk:      {}", Theme::risk(details.assessment.level));
    for factor in &details.assessment.factors {
        println!("    - {factor}");
    }
    println!("  {}", Theme::dimmed(&details.recommendation));

    if !details.affected_tables.is_empty() {
        println!("\n  Tables:    {}", details.affected_tables.join(", "));
    }

    println!();
    Ok(())
}
