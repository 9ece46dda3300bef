//! Approve and reject commands.

use sqlgate_approval::{DecisionOutcome, Gateway, OperationId};

use super::{OutputFormat, print_json};
use crate::theme::Theme;

/// Approve an operation, optionally running a replacement statement.
pub(crate) async fn approve(
    gateway: &Gateway,
    id: OperationId,
    replacement: Option<&str>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let outcome = match replacement {
        Some(sql) => gateway.approve_with_modification(id, sql).await?,
        None => gateway.decide(id, true).await?,
    };
    report(&outcome, format)
}

/// Reject an operation. Nothing executes.
pub(crate) async fn reject(gateway: &Gateway, id: OperationId, format: OutputFormat) -> anyhow::Result<()> {
    let outcome = gateway.decide(id, false).await?;
    report(&outcome, format)
}

fn report(outcome: &DecisionOutcome, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return print_json(outcome);
    }

    match outcome {
        DecisionOutcome::Approved {
            id,
            rows_affected,
            executed_sql,
            modified,
        } => {
            println!(
                "{}",
                Theme::success(&format!("Approved #{id}: {rows_affected} row(s) affected"))
            );
            if *modified {
                println!("  Executed modified SQL: {}", Theme::sql(executed_sql));
            }
        },
        DecisionOutcome::Rejected { id } => {
            println!("{}", Theme::success(&format!("Rejected #{id}")));
        },
        DecisionOutcome::AlreadyProcessed { operation } => {
            println!(
                "{}",
                Theme::warning(&format!(
                    "Operation #{} was already {}; nothing changed",
                    operation.id,
                    operation.status.as_str().to_lowercase()
                ))
            );
        },
    }
    Ok(())
}
