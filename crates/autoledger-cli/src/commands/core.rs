//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `cmd_init` - Initialize the database and seed configured watches

use std::path::Path;

use anyhow::{Context, Result};
use autoledger_core::{db::Database, AppConfig};

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Load config, honoring an explicit --config path
pub fn load_config(config_path: Option<&Path>) -> Result<AppConfig> {
    AppConfig::load(config_path).context("Failed to load config")
}

pub fn cmd_init(db_path: &Path, config_path: Option<&Path>, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path, no_encrypt)?;
    let config = load_config(config_path)?;
    seed_watches(&db, &config)?;

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Add a repeat rule: autoledger repeats add --name Rent --amount 1500");
    println!("  2. Start the scheduler: autoledger daemon");

    Ok(())
}

/// Seed watches from config, skipping names already present
pub fn seed_watches(db: &Database, config: &AppConfig) -> Result<usize> {
    let added = db
        .seed_watches(&config.watches)
        .context("Failed to seed watches from config")?;
    if added > 0 {
        println!("   Seeded {} notification watch(es) from config", added);
    }
    Ok(added)
}
