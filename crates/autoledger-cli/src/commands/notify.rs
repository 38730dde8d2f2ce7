//! Notification intake and consumption commands

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use autoledger_core::{
    db::Database, AutomaticMaterializer, JobKind, JobOutcome, JobQueue, NotificationFields,
    NotificationMeta, NotificationPayload, NotificationPipeline, RecordOutcome, Scheduler,
    SchedulerConfig,
};
use chrono::Utc;
use tracing::info;

use super::format_amount;

/// How long `notify` waits for the consumption job it triggered
const CONSUME_WAIT: Duration = Duration::from_secs(30);

/// The text fields of a notification given on the command line
pub struct NotificationText {
    pub title: String,
    pub text: String,
    pub big_title: String,
    pub big_text: String,
}

pub fn build_payload(
    package: &str,
    text: NotificationText,
    id: i32,
    key: Option<String>,
    group: String,
    post_time: Option<i64>,
) -> NotificationPayload {
    NotificationPayload {
        meta: NotificationMeta {
            id,
            key: key.unwrap_or_else(|| format!("0|{}|{}|null|0", package, id)),
            group,
            package_name: package.to_string(),
            post_time_epoch_millis: post_time.unwrap_or_else(|| Utc::now().timestamp_millis()),
        },
        fields: NotificationFields {
            title: text.title,
            big_title: text.big_title,
            text: text.text,
            big_text: text.big_text,
        },
    }
}

/// Job queue for one-off commands that leave consumption for later
struct DeferredJobs;

#[async_trait]
impl JobQueue for DeferredJobs {
    async fn enqueue(&self, kind: JobKind) -> autoledger_core::Result<()> {
        info!(job = %kind, "Deferred until the next consume or daemon start");
        Ok(())
    }

    async fn cancel(&self, _kind: JobKind) -> autoledger_core::Result<()> {
        Ok(())
    }
}

pub async fn cmd_notify(db: &Database, payload: &NotificationPayload, consume: bool) -> Result<()> {
    let store = Arc::new(db.clone());

    // Only the one-shot job the pipeline enqueues should run here
    let config = SchedulerConfig {
        repeat_interval: None,
        catch_up_on_start: false,
        consume_on_start: false,
    };
    let (scheduler, mut outcomes) = Scheduler::with_outcomes(store.clone(), config);

    let jobs: Arc<dyn JobQueue> = if consume {
        Arc::new(scheduler)
    } else {
        Arc::new(DeferredJobs)
    };
    let pipeline = NotificationPipeline::new(store, jobs);

    let outcome = pipeline
        .process(payload)
        .await
        .context("Failed to process notification")?;

    let record = match outcome {
        None => {
            println!("No payment found in notification from {}", payload.meta.package_name);
            return Ok(());
        }
        Some(RecordOutcome::AlreadyExists(r)) => {
            println!("Already recorded as {} (nothing to do)", r.id);
            return Ok(());
        }
        Some(RecordOutcome::Inserted(r)) | Some(RecordOutcome::Updated(r)) => r,
    };

    println!(
        "📥 Recorded {} │ {} │ {}",
        record.id,
        format_amount(record.amount_cents, record.kind),
        record.title
    );

    if consume {
        match tokio::time::timeout(CONSUME_WAIT, outcomes.recv()).await {
            Ok(Some((_, JobOutcome::Success))) => println!("✅ Added to ledger"),
            Ok(Some((_, JobOutcome::Failed(reason)))) => {
                println!("⚠️  Consumption failed: {}", reason);
                println!("   The record stays queued; run `autoledger consume` to retry");
            }
            Ok(Some((_, JobOutcome::Cancelled))) | Ok(None) | Err(_) => {
                println!("⚠️  Consumption did not finish; run `autoledger consume`");
            }
        }
    }

    Ok(())
}

pub async fn cmd_consume(db: &Database) -> Result<()> {
    let summary = AutomaticMaterializer::new(Arc::new(db.clone()))
        .materialize_unconsumed()
        .await
        .context("Failed to read automatic records")?;

    if summary.processed == 0 {
        println!("No automatic records waiting.");
        return Ok(());
    }

    println!(
        "✅ Consumed {} record(s): {} created, {} skipped, {} failed",
        summary.processed, summary.created, summary.skipped, summary.failed
    );
    Ok(())
}
