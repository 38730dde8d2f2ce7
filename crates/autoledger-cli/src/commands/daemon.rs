//! Daemon command: runs the scheduler until interrupted

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use autoledger_core::{JobOutcome, Scheduler};
use tracing::info;

use super::{load_config, open_db, seed_watches};

pub async fn cmd_daemon(db_path: &Path, config_path: Option<&Path>, no_encrypt: bool) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;
    let config = load_config(config_path)?;
    seed_watches(&db, &config)?;

    println!("🚀 Starting Autoledger scheduler...");
    println!("   Database: {}", db_path.display());
    match &config.source {
        Some(path) => println!("   Config: {}", path.display()),
        None => println!("   Config: built-in defaults"),
    }
    match config.scheduler.repeat_interval {
        Some(every) => println!("   Repeats: every {} hours", every.as_secs() / 3600),
        None => println!("   Repeats: periodic run disabled"),
    }
    println!("   Press Ctrl-C to stop");

    let (scheduler, mut outcomes) = Scheduler::with_outcomes(Arc::new(db), config.scheduler);
    scheduler.start().await.context("Failed to start scheduler")?;

    let mut failures = 0usize;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some((_, outcome)) = outcomes.recv() => {
                if matches!(outcome, JobOutcome::Failed(_)) {
                    failures += 1;
                }
            }
        }
    }

    info!("Shutting down scheduler");
    scheduler.shutdown().await.context("Failed to stop scheduler")?;
    println!();
    println!("👋 Scheduler stopped ({} failed job run(s) this session)", failures);

    Ok(())
}
