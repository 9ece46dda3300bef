//! sqlgate CLI - operator console for the SQL approval gateway.
//!
//! Submits statements, lists the approval queue and records approve or
//! reject decisions against the durable pending store.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use sqlgate_approval::{OperationId, PendingStatus};

mod commands;
mod config_bridge;
mod theme;

use commands::{OutputFormat, config, databases, decide, pending, stats, submit};

/// sqlgate - human-in-the-loop gateway for generated SQL
#[derive(Parser)]
#[command(name = "sqlgate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format: pretty (default) or json
    #[arg(long, global = true, default_value = "pretty")]
    format: String,

    /// Path to an explicit configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a SQL statement; reads run now, mutations are queued
    Submit {
        /// Target database
        #[arg(short, long)]
        db: String,
        /// Statement text
        sql: String,
    },

    /// Inspect the approval queue
    Pending {
        #[command(subcommand)]
        command: PendingCommands,
    },

    /// Approve a pending operation and execute it
    Approve {
        /// Operation id (e.g. 7 or #7)
        id: OperationId,
        /// Run this statement instead of the queued one
        #[arg(long)]
        sql: Option<String>,
    },

    /// Reject a pending operation
    Reject {
        /// Operation id (e.g. 7 or #7)
        id: OperationId,
    },

    /// Show queue statistics
    Stats,

    /// List configured databases and their tables
    Databases,

    /// View and validate configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusFilter {
    Pending,
    Approved,
    Rejected,
    All,
}

impl StatusFilter {
    fn as_status(self) -> Option<PendingStatus> {
        match self {
            Self::Pending => Some(PendingStatus::Pending),
            Self::Approved => Some(PendingStatus::Approved),
            Self::Rejected => Some(PendingStatus::Rejected),
            Self::All => None,
        }
    }
}

#[derive(Subcommand)]
enum PendingCommands {
    /// List operations
    List {
        /// Status to show
        #[arg(short, long, value_enum, default_value = "pending")]
        status: StatusFilter,
    },
    /// Show one operation with its risk assessment
    Show {
        /// Operation id
        id: OperationId,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show resolved configuration with source annotations
    Show {
        /// Output format (toml or json)
        #[arg(short, long, default_value = "toml")]
        format: String,
        /// Show only a specific section (e.g. gateway, databases, safety)
        #[arg(short, long)]
        section: Option<String>,
    },
    /// Validate the current configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let resolved = sqlgate_config::Config::load(cli.config.as_deref())?;

    // Set up logging from config, with --verbose override.
    let mut log_config = config_bridge::to_log_config(&resolved.config);
    if cli.verbose {
        "debug".clone_into(&mut log_config.level);
    }
    if let Err(e) = sqlgate_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let output_format = OutputFormat::parse(&cli.format);

    match cli.command {
        Commands::Submit { db, sql } => {
            let gateway = config_bridge::build_gateway(&resolved.config)?;
            submit::submit(&gateway, &db, &sql, output_format).await?;
        },
        Commands::Pending { command } => {
            let gateway = config_bridge::build_gateway(&resolved.config)?;
            match command {
                PendingCommands::List { status } => {
                    pending::list_pending(&gateway, status.as_status(), output_format)?;
                },
                PendingCommands::Show { id } => pending::show_pending(&gateway, id, output_format)?,
            }
        },
        Commands::Approve { id, sql } => {
            let gateway = config_bridge::build_gateway(&resolved.config)?;
            decide::approve(&gateway, id, sql.as_deref(), output_format).await?;
        },
        Commands::Reject { id } => {
            let gateway = config_bridge::build_gateway(&resolved.config)?;
            decide::reject(&gateway, id, output_format).await?;
        },
        Commands::Stats => {
            let gateway = config_bridge::build_gateway(&resolved.config)?;
            stats::show_stats(&gateway, output_format)?;
        },
        Commands::Databases => {
            databases::list_databases(config_bridge::to_registry(&resolved.config), output_format)
                .await?;
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show { format, section } => {
                config::show_config(&resolved, &format, section.as_deref())?;
            },
            ConfigCommands::Validate => config::validate_config(&resolved)?,
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_approve_accepts_hash_prefixed_id() {
        let cli = Cli::try_parse_from(["sqlgate", "approve", "#7", "--sql", "DELETE FROM t WHERE id = 1"])
            .unwrap();
        match cli.command {
            Commands::Approve { id, sql } => {
                assert_eq!(id, OperationId(7));
                assert_eq!(sql.as_deref(), Some("DELETE FROM t WHERE id = 1"));
            },
            _ => panic!("expected approve"),
        }
    }

    #[test]
    fn test_pending_list_defaults_to_pending() {
        let cli = Cli::try_parse_from(["sqlgate", "pending", "list"]).unwrap();
        match cli.command {
            Commands::Pending {
                command: PendingCommands::List { status },
            } => assert_eq!(status.as_status(), Some(PendingStatus::Pending)),
            _ => panic!("expected pending list"),
        }
    }

    #[test]
    fn test_status_all_has_no_filter() {
        let cli = Cli::try_parse_from(["sqlgate", "pending", "list", "--status", "all"]).unwrap();
        match cli.command {
            Commands::Pending {
                command: PendingCommands::List { status },
            } => assert!(status.as_status().is_none()),
            _ => panic!("expected pending list"),
        }
    }
}
