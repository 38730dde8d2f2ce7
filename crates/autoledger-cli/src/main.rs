//! Autoledger CLI - Automatic transactions from payment notifications
//!
//! Usage:
//!   autoledger init                         Initialize database
//!   autoledger notify --package P --text T  Feed a notification
//!   autoledger repeats run                  Materialize due repeat rules
//!   autoledger daemon                       Run the background scheduler

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = cli.config.as_deref();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, config, cli.no_encrypt),
        Commands::Notify {
            package,
            title,
            text,
            big_title,
            big_text,
            id,
            key,
            group,
            post_time,
            no_consume,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let payload = commands::build_payload(
                &package,
                commands::NotificationText {
                    title,
                    text,
                    big_title,
                    big_text,
                },
                id,
                key,
                group,
                post_time,
            );
            commands::cmd_notify(&db, &payload, !no_consume).await
        }
        Commands::Consume => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_consume(&db).await
        }
        Commands::Repeats { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None => commands::cmd_repeats_list(&db, false),
                Some(RepeatsAction::List { all }) => commands::cmd_repeats_list(&db, all),
                Some(RepeatsAction::Run { date }) => {
                    commands::cmd_repeats_run(&db, date.as_deref()).await
                }
                Some(RepeatsAction::Add {
                    name,
                    amount,
                    kind,
                    repeat_type,
                    first_date,
                    note,
                    categories,
                }) => commands::cmd_repeats_add(
                    &db,
                    commands::RepeatArgs {
                        name,
                        amount,
                        kind,
                        repeat_type,
                        first_date,
                        note,
                        categories,
                    },
                ),
                Some(RepeatsAction::Archive { id }) => commands::cmd_repeats_archive(&db, id),
                Some(RepeatsAction::Deactivate { id }) => {
                    commands::cmd_repeats_set_active(&db, id, false)
                }
                Some(RepeatsAction::Activate { id }) => {
                    commands::cmd_repeats_set_active(&db, id, true)
                }
                Some(RepeatsAction::SetType { id, repeat_type }) => {
                    commands::cmd_repeats_set_type(&db, id, &repeat_type)
                }
            }
        }
        Commands::Watches { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None | Some(WatchesAction::List) => commands::cmd_watches_list(&db),
                Some(WatchesAction::Add {
                    name,
                    packages,
                    patterns,
                    kind,
                }) => commands::cmd_watches_add(&db, &name, packages, patterns, &kind),
                Some(WatchesAction::Disable { id }) => {
                    commands::cmd_watches_set_enabled(&db, id, false)
                }
                Some(WatchesAction::Enable { id }) => {
                    commands::cmd_watches_set_enabled(&db, id, true)
                }
            }
        }
        Commands::Automatics { all, json } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_automatics_list(&db, all, json)
        }
        Commands::Transactions { limit, json } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_transactions_list(&db, limit, json)
        }
        Commands::Daemon => commands::cmd_daemon(&cli.db, config, cli.no_encrypt).await,
        Commands::Status => commands::cmd_status(&cli.db, config, cli.no_encrypt),
    }
}
