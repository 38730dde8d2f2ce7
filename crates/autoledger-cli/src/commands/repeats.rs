//! Repeat rule command implementations

use std::sync::Arc;

use anyhow::{Context, Result};
use autoledger_core::{
    db::Database, NewRepeatRule, RepeatMaterializer, RepeatType, TransactionTemplate,
};
use chrono::Local;

use super::{format_amount, parse_date, parse_dollars, parse_kind, truncate};

/// Arguments of `repeats add`, as given on the command line
pub struct RepeatArgs {
    pub name: String,
    pub amount: String,
    pub kind: String,
    pub repeat_type: String,
    pub first_date: Option<String>,
    pub note: String,
    pub categories: Option<String>,
}

fn parse_repeat_type(s: &str) -> Result<RepeatType> {
    s.parse::<RepeatType>().map_err(anyhow::Error::msg)
}

fn parse_categories(s: Option<&str>) -> Result<Vec<i64>> {
    let Some(s) = s else {
        return Ok(Vec::new());
    };
    s.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| {
            c.parse::<i64>()
                .with_context(|| format!("Invalid category id: {}", c))
        })
        .collect()
}

pub fn cmd_repeats_add(db: &Database, args: RepeatArgs) -> Result<()> {
    let first_date = match args.first_date.as_deref() {
        Some(d) => parse_date(d)?,
        None => Local::now().date_naive(),
    };

    let rule = NewRepeatRule {
        template: TransactionTemplate {
            name: args.name,
            note: args.note,
            amount_cents: parse_dollars(&args.amount)?,
            kind: parse_kind(&args.kind)?,
            categories: parse_categories(args.categories.as_deref())?,
            source_id: None,
        },
        repeat_type: parse_repeat_type(&args.repeat_type)?,
        first_date,
    };

    let id = db
        .create_repeat_rule(&rule)
        .context("Failed to create repeat rule")?;
    println!(
        "✅ Added repeat rule {} ({} {}, from {})",
        id, rule.template.name, rule.repeat_type, rule.first_date
    );
    Ok(())
}

pub fn cmd_repeats_list(db: &Database, include_archived: bool) -> Result<()> {
    let rules = db.list_repeat_rules(include_archived)?;

    if rules.is_empty() {
        println!("No repeat rules. Add one with:");
        println!("  autoledger repeats add --name Rent --amount 1500 --type monthly");
        return Ok(());
    }

    println!();
    println!("🔁 Repeat Rules");
    println!("   ─────────────────────────────────────────────────────────────");

    for rule in rules {
        let state = if rule.archived {
            "archived"
        } else if !rule.active {
            "paused"
        } else {
            "active"
        };
        println!(
            "   {:>4} │ {:<14} │ {} │ {:>10} │ {:<8} │ {}",
            rule.id,
            rule.repeat_type.as_str(),
            rule.first_date,
            format_amount(rule.template.amount_cents, rule.template.kind),
            state,
            truncate(&rule.template.name, 30)
        );
    }

    Ok(())
}

pub async fn cmd_repeats_run(db: &Database, date: Option<&str>) -> Result<()> {
    let today = match date {
        Some(d) => parse_date(d)?,
        None => Local::now().date_naive(),
    };

    let summary = RepeatMaterializer::new(Arc::new(db.clone()))
        .materialize_due_repeats(today)
        .await
        .context("Failed to read repeat rules")?;

    println!(
        "✅ Repeats for {}: {} rule(s) checked, {} created, {} not due, {} failed",
        today, summary.visited, summary.created, summary.skipped, summary.failed
    );
    Ok(())
}

pub fn cmd_repeats_archive(db: &Database, id: i64) -> Result<()> {
    db.archive_repeat_rule(id)
        .with_context(|| format!("Failed to archive repeat rule {}", id))?;
    println!("📦 Archived repeat rule {}", id);
    Ok(())
}

pub fn cmd_repeats_set_active(db: &Database, id: i64, active: bool) -> Result<()> {
    db.set_repeat_active(id, active)
        .with_context(|| format!("Failed to update repeat rule {}", id))?;
    if active {
        println!("▶️  Resumed repeat rule {}", id);
    } else {
        println!("⏸️  Paused repeat rule {}", id);
    }
    Ok(())
}

pub fn cmd_repeats_set_type(db: &Database, id: i64, repeat_type: &str) -> Result<()> {
    let repeat_type = parse_repeat_type(repeat_type)?;
    db.update_repeat_type(id, repeat_type)
        .with_context(|| format!("Failed to change repeat rule {}", id))?;
    println!("✅ Repeat rule {} now repeats {}", id, repeat_type);
    Ok(())
}
