//! Notification watch command implementations

use anyhow::{Context, Result};
use autoledger_core::{db::Database, NewNotificationWatch};

use super::{parse_kind, truncate};

pub fn cmd_watches_add(
    db: &Database,
    name: &str,
    packages: Vec<String>,
    patterns: Vec<String>,
    kind: &str,
) -> Result<()> {
    let watch = NewNotificationWatch {
        name: name.to_string(),
        act_on_package_names: packages,
        match_regexes: patterns,
        kind: parse_kind(kind)?,
    };

    let id = db.save_watch(&watch).context("Failed to save watch")?;
    println!(
        "✅ Added watch {} ({}) on {}",
        id,
        watch.name,
        watch.act_on_package_names.join(", ")
    );
    Ok(())
}

pub fn cmd_watches_list(db: &Database) -> Result<()> {
    let watches = db.list_watches(false)?;

    if watches.is_empty() {
        println!("No notification watches. Add one with:");
        println!("  autoledger watches add --name Bank --package com.example.bank --pattern 'Card used'");
        return Ok(());
    }

    println!();
    println!("👀 Notification Watches");
    println!("   ─────────────────────────────────────────────────────────────");

    for w in watches {
        let state = if w.enabled { "on " } else { "off" };
        println!(
            "   {:>4} │ {} │ {:<5} │ {} │ {}",
            w.id,
            state,
            w.kind.as_str(),
            truncate(&w.name, 24),
            truncate(&w.act_on_package_names.join(", "), 40)
        );
        for pattern in &w.match_regexes {
            println!("          └ {}", pattern);
        }
    }

    Ok(())
}

pub fn cmd_watches_set_enabled(db: &Database, id: i64, enabled: bool) -> Result<()> {
    db.set_watch_enabled(id, enabled)
        .with_context(|| format!("Failed to update watch {}", id))?;
    if enabled {
        println!("✅ Enabled watch {}", id);
    } else {
        println!("🚫 Disabled watch {}", id);
    }
    Ok(())
}
