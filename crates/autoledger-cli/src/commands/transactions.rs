//! Transaction and automatic record listings

use anyhow::Result;
use autoledger_core::db::Database;

use super::{format_amount, truncate};

pub fn cmd_transactions_list(db: &Database, limit: i64, json: bool) -> Result<()> {
    let transactions = db.list_ledger_transactions(limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&transactions)?);
        return Ok(());
    }

    if transactions.is_empty() {
        println!("No transactions yet. They appear once notifications are consumed");
        println!("or repeat rules fall due.");
        return Ok(());
    }

    println!();
    println!("📝 Recent Transactions");
    println!("   ─────────────────────────────────────────────────────────────");

    for tx in transactions {
        let source = match (&tx.automatic_id, tx.repeat_id) {
            (Some(_), _) => "auto",
            (None, Some(_)) => "repeat",
            (None, None) => "",
        };
        println!(
            "   {} │ {:>10} │ {:<6} │ {}",
            tx.date.format("%Y-%m-%d %H:%M"),
            format_amount(tx.amount_cents, tx.kind),
            source,
            truncate(&tx.name, 40)
        );
    }

    Ok(())
}

pub fn cmd_automatics_list(db: &Database, include_used: bool, json: bool) -> Result<()> {
    let records = db.list_automatics(include_used)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        if include_used {
            println!("No automatic records.");
        } else {
            println!("No automatic records waiting (use --all to include consumed ones).");
        }
        return Ok(());
    }

    println!();
    println!("📥 Automatic Records");
    println!("   ─────────────────────────────────────────────────────────────");

    for r in records {
        let state = if r.used { "used" } else { "new " };
        println!(
            "   {} │ {} │ {:>10} │ {} │ {}",
            &r.id[..8.min(r.id.len())],
            state,
            format_amount(r.amount_cents, r.kind),
            truncate(&r.title, 24),
            truncate(&r.match_text, 40)
        );
    }

    Ok(())
}
