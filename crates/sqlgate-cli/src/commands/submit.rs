//! Submit command - send a statement through the gateway.

use colored::Colorize;
use sqlgate_approval::{Gateway, GatewayError, SubmitOutcome};
use sqlgate_storage::Row;

use super::{OutputFormat, print_json};
use crate::theme::Theme;

/// Submit a statement. Reads run now, mutations are queued.
pub(crate) async fn submit(
    gateway: &Gateway,
    database: &str,
    text: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let outcome = match gateway.submit(text, database).await {
        Ok(outcome) => outcome,
        Err(e) => {
            if format == OutputFormat::Pretty {
                print_rejection(&e);
            }
            return Err(e.into());
        },
    };

    if format == OutputFormat::Json {
        return print_json(&outcome);
    }

    match &outcome {
        SubmitOutcome::Executed { candidate, rows } => {
            println!("{}", Theme::info(&Theme::sql(&candidate.sql_text)));
            print_rows(rows);
        },
        SubmitOutcome::PendingApproval { id, assessment, .. } => {
            println!(
                "{}",
                Theme::success(&format!("Queued as #{id}, awaiting approval"))
            );
            println!("  Risk: {}", Theme::risk(assessment.level));
            for factor in &assessment.factors {
                println!("    - {factor}");
            }
            println!("  {}", Theme::dimmed(&assessment.recommendation));
        },
    }
    Ok(())
}

fn print_rejection(error: &GatewayError) {
    println!("{}", Theme::error(&error.to_string()));
    for suggestion in error.suggestions() {
        println!("  - {suggestion}");
    }
}

fn print_rows(rows: &[Row]) {
    let Some(first) = rows.first() else {
        println!("{}", Theme::dimmed("(no rows)"));
        return;
    };

    let columns: Vec<&String> = first.keys().collect();
    let header: Vec<&str> = columns.iter().map(|c| c.as_str()).collect();
    println!("{}", header.join(" | ").dimmed());
    println!("{}", Theme::separator());

    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| match row.get(c.as_str()) {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(serde_json::Value::Null) | None => "NULL".to_owned(),
                Some(other) => other.to_string(),
            })
            .collect();
        println!("{}", cells.join(" | "));
    }
    println!("{}", Theme::dimmed(&format!("({} row(s))", rows.len())));
}
