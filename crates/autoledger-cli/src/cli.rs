//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Autoledger - Turn payment notifications into ledger transactions
#[derive(Parser)]
#[command(name = "autoledger")]
#[command(about = "Automatic and recurring transactions for your ledger", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "autoledger.db", global = true)]
    pub db: PathBuf,

    /// Config file (defaults to the user override, then the built-in config)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set AUTOLEDGER_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database and seed configured watches
    Init,

    /// Feed one posted notification through the extraction pipeline
    Notify {
        /// Package name of the posting app
        #[arg(short, long)]
        package: String,

        /// Notification title
        #[arg(long, default_value = "")]
        title: String,

        /// Notification text
        #[arg(long, default_value = "")]
        text: String,

        /// Expanded title
        #[arg(long, default_value = "")]
        big_title: String,

        /// Expanded text
        #[arg(long, default_value = "")]
        big_text: String,

        /// Notification id
        #[arg(long, default_value = "0")]
        id: i32,

        /// Notification key (defaults to one derived from package and id)
        #[arg(long)]
        key: Option<String>,

        /// Notification group
        #[arg(long, default_value = "")]
        group: String,

        /// Post time in epoch milliseconds (defaults to now)
        #[arg(long)]
        post_time: Option<i64>,

        /// Record only; leave consumption to the next `consume` or daemon start
        #[arg(long)]
        no_consume: bool,
    },

    /// Turn unconsumed automatic records into transactions
    Consume,

    /// Manage and run repeat rules
    Repeats {
        #[command(subcommand)]
        action: Option<RepeatsAction>,
    },

    /// Manage notification watches
    Watches {
        #[command(subcommand)]
        action: Option<WatchesAction>,
    },

    /// List automatic records
    Automatics {
        /// Include consumed records
        #[arg(long)]
        all: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List recent ledger transactions
    Transactions {
        /// Number of transactions to show
        #[arg(short, long, default_value = "20")]
        limit: i64,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Run the background scheduler until Ctrl-C
    Daemon,

    /// Show database and scheduler status
    Status,
}

#[derive(Subcommand)]
pub enum RepeatsAction {
    /// Materialize repeat rules due on a date
    Run {
        /// Date to run for (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Add a repeat rule
    Add {
        /// Transaction name
        #[arg(short, long)]
        name: String,

        /// Amount in dollars (e.g. 12.50)
        #[arg(short, long)]
        amount: String,

        /// spend or earn
        #[arg(short, long, default_value = "spend")]
        kind: String,

        /// daily, weekly, monthly, yearly
        #[arg(short = 't', long = "type", default_value = "monthly")]
        repeat_type: String,

        /// First date (YYYY-MM-DD, defaults to today); anchors weekday/day
        #[arg(long)]
        first_date: Option<String>,

        /// Note copied onto each transaction
        #[arg(long, default_value = "")]
        note: String,

        /// Comma-separated category ids
        #[arg(long)]
        categories: Option<String>,
    },

    /// List repeat rules
    List {
        /// Include archived rules
        #[arg(long)]
        all: bool,
    },

    /// Archive a rule permanently
    Archive { id: i64 },

    /// Pause a rule
    Deactivate { id: i64 },

    /// Resume a paused rule
    Activate { id: i64 },

    /// Change how often a rule fires (only before it has fired)
    SetType {
        id: i64,

        /// daily, weekly, monthly, yearly
        repeat_type: String,
    },
}

#[derive(Subcommand)]
pub enum WatchesAction {
    /// Add a notification watch
    Add {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// Package to act on (repeatable)
        #[arg(short, long = "package", required = true)]
        packages: Vec<String>,

        /// Regex the notification text must match (repeatable)
        #[arg(short = 'r', long = "pattern", required = true)]
        patterns: Vec<String>,

        /// spend or earn
        #[arg(short, long, default_value = "spend")]
        kind: String,
    },

    /// List watches
    List,

    /// Disable a watch
    Disable { id: i64 },

    /// Re-enable a watch
    Enable { id: i64 },
}
