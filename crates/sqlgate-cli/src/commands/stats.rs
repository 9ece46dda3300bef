//! Stats command - queue counts.

use colored::Colorize;
use sqlgate_approval::Gateway;

use super::{OutputFormat, print_json, truncate};
use crate::theme::Theme;

/// Print aggregate counts and the most recent operations.
pub(crate) fn show_stats(gateway: &Gateway, format: OutputFormat) -> anyhow::Result<()> {
    let stats = gateway.statistics()?;

    if format == OutputFormat::Json {
        return print_json(&stats);
    }

    println!("\n{}", Theme::header("Approval Queue"));
    println!("{}", Theme::separator());
    println!("  Total:     {}", stats.total);
    println!("  Pending:   {}", stats.pending.to_string().yellow());
    println!("  Approved:  {}", stats.approved.to_string().green());
    println!("  Rejected:  {}", stats.rejected.to_string().red());

    if !stats.by_operation.is_empty() {
        println!("\n  {}", "By operation".dimmed());
        for (kind, count) in &stats.by_operation {
            println!("  {kind:>10} {count}");
        }
    }

    if !stats.by_database.is_empty() {
        println!("\n  {}", "By database".dimmed());
        for (db, count) in &stats.by_database {
            println!("  {db:>10} {count}");
        }
    }

    if !stats.recent.is_empty() {
        println!("\n  {}", "Recent".dimmed());
        for op in &stats.recent {
            println!(
                "  {:>6} {:>10} {}",
                format!("#{}", op.id),
                Theme::status(op.status),
                truncate(&op.sql_text, 50)
            );
        }
    }

    println!();
    Ok(())
}
