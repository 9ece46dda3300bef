//! Databases command - list configured databases.

use colored::Colorize;
use serde::Serialize;
use sqlgate_core::DatabaseRegistry;
use sqlgate_storage::{SqliteExecutor, TableSummary};
use std::sync::Arc;
use tracing::warn;

use super::{OutputFormat, print_json};
use crate::theme::Theme;

#[derive(Serialize)]
struct DatabaseReport {
    id: String,
    path: String,
    tables: Vec<TableSummary>,
    error: Option<String>,
}

/// List every configured database with its tables. A database that cannot
/// be read is reported, not fatal.
pub(crate) async fn list_databases(registry: DatabaseRegistry, format: OutputFormat) -> anyhow::Result<()> {
    let registry = Arc::new(registry);
    let executor = SqliteExecutor::new(Arc::clone(&registry));

    let mut reports = Vec::with_capacity(registry.len());
    for descriptor in registry.list() {
        let (tables, error) = match executor.describe(&descriptor.id).await {
            Ok(tables) => (tables, None),
            Err(e) => {
                warn!(database = %descriptor.id, error = %e, "could not describe database");
                (Vec::new(), Some(e.to_string()))
            },
        };
        reports.push(DatabaseReport {
            id: descriptor.id.to_string(),
            path: descriptor.path.display().to_string(),
            tables,
            error,
        });
    }

    if format == OutputFormat::Json {
        return print_json(&reports);
    }

    if reports.is_empty() {
        println!("{}", Theme::info("No databases configured"));
        return Ok(());
    }

    println!("\n{}", Theme::header("Databases"));
    println!("{}", Theme::separator());
    for report in reports {
        println!("  {} {}", report.id.bold(), report.path.dimmed());
        if let Some(error) = report.error {
            println!("    {}", Theme::error(&error));
            continue;
        }
        for table in report.tables {
            println!("    {:<24} {:>8} rows", table.name, table.row_count);
        }
    }
    println!();
    Ok(())
}
