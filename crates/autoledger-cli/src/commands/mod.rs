//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db)
//! - `notify` - Feeding notifications and consuming automatic records
//! - `repeats` - Repeat rule management and runs
//! - `watches` - Notification watch management
//! - `transactions` - Ledger and automatic record listings
//! - `daemon` - Background scheduler
//! - `status` - Status command

pub mod core;
pub mod daemon;
pub mod notify;
pub mod repeats;
pub mod status;
pub mod transactions;
pub mod watches;

// Re-export command functions for main.rs
pub use core::*;
pub use daemon::*;
pub use notify::*;
pub use repeats::*;
pub use status::*;
pub use transactions::*;
pub use watches::*;

use anyhow::{bail, Context, Result};
use autoledger_core::TransactionKind;
use chrono::NaiveDate;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Render cents as a signed, colored dollar amount
pub fn format_amount(cents: i64, kind: TransactionKind) -> String {
    let dollars = format!("${}.{:02}", cents / 100, cents % 100);
    match kind {
        TransactionKind::Spend => format!("\x1b[31m{}\x1b[0m", dollars), // Red for spend
        TransactionKind::Earn => format!("\x1b[32m+{}\x1b[0m", dollars), // Green for earn
    }
}

/// Parse a dollar amount like `12`, `12.5`, `$1,204.50` into cents
pub fn parse_dollars(s: &str) -> Result<i64> {
    let cleaned: String = s
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',')
        .collect();

    if cleaned.starts_with('-') {
        bail!("Amount must not be negative: {}", s);
    }

    let (whole, frac) = match cleaned.split_once('.') {
        Some((w, f)) => (w, f),
        None => (cleaned.as_str(), ""),
    };
    if whole.is_empty() && frac.is_empty() {
        bail!("Empty amount: {}", s);
    }
    if frac.len() > 2 {
        bail!("Amount has more than two decimals: {}", s);
    }
    if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
        bail!("Invalid amount: {}", s);
    }

    let whole: i64 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .with_context(|| format!("Invalid amount: {}", s))?
    };
    let frac: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().with_context(|| format!("Invalid amount: {}", s))? * 10,
        _ => frac.parse().with_context(|| format!("Invalid amount: {}", s))?,
    };
    Ok(whole * 100 + frac)
}

/// Parse a YYYY-MM-DD date
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

pub fn parse_kind(s: &str) -> Result<TransactionKind> {
    s.parse::<TransactionKind>().map_err(anyhow::Error::msg)
}
