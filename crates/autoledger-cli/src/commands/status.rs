//! Status command implementation

use std::path::Path;

use anyhow::Result;

use super::{load_config, open_db};

pub fn cmd_status(db_path: &Path, config_path: Option<&Path>, no_encrypt: bool) -> Result<()> {
    use autoledger_core::db::DB_KEY_ENV;
    use std::fs;

    println!();
    println!("📊 Autoledger Status");
    println!("   ─────────────────────────────────────────────────────────────");

    // Database path
    println!("   Database: {}", db_path.display());

    // Check if database file exists and get size
    if db_path.exists() {
        if let Ok(metadata) = fs::metadata(db_path) {
            let size_kb = metadata.len() as f64 / 1024.0;
            if size_kb < 1024.0 {
                println!("   Size: {:.1} KB", size_kb);
            } else {
                println!("   Size: {:.1} MB", size_kb / 1024.0);
            }
        }
    } else {
        println!("   Size: (database not initialized)");
    }

    // Check encryption status
    let has_key = std::env::var(DB_KEY_ENV).is_ok();
    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else if has_key {
        println!("   🔒 Encryption: ENABLED ({}=***)", DB_KEY_ENV);
    } else {
        println!("   ❌ Encryption: REQUIRED but {} not set", DB_KEY_ENV);
    }

    // Scheduler settings
    match load_config(config_path) {
        Ok(config) => {
            let source = config
                .source
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "built-in defaults".to_string());
            println!("   Config: {}", source);
            match config.scheduler.repeat_interval {
                Some(every) => println!("   Periodic repeats: every {} hours", every.as_secs() / 3600),
                None => println!("   Periodic repeats: disabled"),
            }
        }
        Err(e) => println!("   ❌ Config error: {:#}", e),
    }

    // Try to open the database and show stats
    if db_path.exists() {
        match open_db(db_path, no_encrypt) {
            Ok(db) => {
                if let Ok(stats) = db.stats() {
                    println!();
                    println!(
                        "   Automatic records: {} ({} waiting)",
                        stats.automatics_total, stats.automatics_unused
                    );
                    println!("   Repeat rules: {}", stats.repeat_rules);
                    println!("   Transactions: {}", stats.transactions);
                    println!("   Notification watches: {}", stats.watches);
                }
            }
            Err(e) => {
                println!();
                println!("   ❌ Error opening database: {}", e);
                if !no_encrypt && !has_key {
                    println!("      Set {} or use --no-encrypt", DB_KEY_ENV);
                }
            }
        }
    }

    println!();
    Ok(())
}
