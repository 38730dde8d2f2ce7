//! Automatic records: recording extracted payments and turning them into transactions

use std::sync::Arc;

use chrono::{Local, NaiveDateTime, TimeZone, Utc};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::jobs::{contain_panic, JobKind, JobQueue};
use crate::models::{AutomaticRecord, NewLedgerTransaction, NotificationMeta, PaymentCandidate};
use crate::store::{InsertResult, LedgerStore};

/// What happened to an extracted payment
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Inserted(AutomaticRecord),
    Updated(AutomaticRecord),
    /// The notification was already recorded; nothing was written
    AlreadyExists(AutomaticRecord),
}

/// Deduplicating writer for automatic records
///
/// The lookup and insert for one notification run under a mutex owned by
/// this instance, so two deliveries of the same notification cannot both
/// insert.
pub struct AutomaticStore {
    store: Arc<dyn LedgerStore>,
    jobs: Arc<dyn JobQueue>,
    lock: Mutex<()>,
}

impl AutomaticStore {
    pub fn new(store: Arc<dyn LedgerStore>, jobs: Arc<dyn JobQueue>) -> Self {
        Self {
            store,
            jobs,
            lock: Mutex::new(()),
        }
    }

    /// Persist an extracted payment unless its notification was seen before
    ///
    /// A new record enqueues a one-shot consumption job. Duplicates are
    /// logged and left alone.
    pub async fn record_notification(
        &self,
        candidate: &PaymentCandidate,
        notification: &NotificationMeta,
    ) -> Result<RecordOutcome> {
        let record = AutomaticRecord::from_candidate(candidate, notification, Utc::now());
        let key = record.dedup_key();

        let outcome = {
            let _guard = self.lock.lock().await;

            if let Some(existing) = self.store.find_automatic(&key).await? {
                warn!(
                    id = %existing.id,
                    package = %key.package_name,
                    notification_id = key.notification_id,
                    "Notification already recorded, skipping"
                );
                return Ok(RecordOutcome::AlreadyExists(existing));
            }

            match self.store.insert_automatic(&record).await {
                InsertResult::Inserted(r) => RecordOutcome::Inserted(r),
                InsertResult::Updated(r) => RecordOutcome::Updated(r),
                // Another process recorded the same notification after our lookup
                InsertResult::Failed(e) if is_unique_violation(&e) => {
                    match self.store.find_automatic(&key).await? {
                        Some(existing) => {
                            warn!(
                                id = %existing.id,
                                package = %key.package_name,
                                notification_id = key.notification_id,
                                "Notification recorded concurrently, skipping"
                            );
                            return Ok(RecordOutcome::AlreadyExists(existing));
                        }
                        None => return Err(e),
                    }
                }
                InsertResult::Failed(e) => {
                    error!(
                        package = %key.package_name,
                        notification_id = key.notification_id,
                        "Failed to store automatic record: {}",
                        e
                    );
                    return Err(e);
                }
            }
        };

        if let RecordOutcome::Inserted(r) | RecordOutcome::Updated(r) = &outcome {
            info!(
                id = %r.id,
                amount_cents = r.amount_cents,
                kind = %r.kind,
                "Recorded automatic transaction"
            );
            // The record is safe on disk; a lost enqueue is picked up by the next consume run
            if let Err(e) = self.jobs.enqueue(JobKind::ConsumeAutomatics).await {
                warn!("Failed to enqueue automatic consumption: {}", e);
            }
        }

        Ok(outcome)
    }
}

fn is_unique_violation(e: &Error) -> bool {
    matches!(
        e,
        Error::Database(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Counts from one materialization pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializeSummary {
    pub processed: usize,
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Converts unconsumed automatic records into ledger transactions
#[derive(Clone)]
pub struct AutomaticMaterializer {
    store: Arc<dyn LedgerStore>,
}

impl AutomaticMaterializer {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Process every unconsumed record
    ///
    /// A record that fails or panics is logged and left unconsumed for the
    /// next run; it never stops the rest of the pass. Only a failure to list records is
    /// returned as an error.
    pub async fn materialize_unconsumed(&self) -> Result<MaterializeSummary> {
        let records = self.store.query_unused_automatics().await?;
        let mut summary = MaterializeSummary::default();

        for record in records {
            summary.processed += 1;
            match contain_panic(self.materialize_one(&record)).await {
                Ok(true) => summary.created += 1,
                Ok(false) => summary.skipped += 1,
                Err(e) => {
                    summary.failed += 1;
                    error!(
                        id = %record.id,
                        title = %record.title,
                        amount_cents = record.amount_cents,
                        "Failed to materialize automatic record: {}",
                        e
                    );
                }
            }
        }

        info!(
            processed = summary.processed,
            created = summary.created,
            skipped = summary.skipped,
            failed = summary.failed,
            "Automatic materialization finished"
        );
        Ok(summary)
    }

    /// Returns `Ok(true)` when a transaction was written
    async fn materialize_one(&self, record: &AutomaticRecord) -> Result<bool> {
        // Another pass may have consumed it since the listing
        let Some(mut current) = self.store.get_automatic(&record.id).await? else {
            warn!(id = %record.id, "Automatic record disappeared before consumption");
            return Ok(false);
        };
        if current.used {
            debug!(id = %current.id, "Automatic record already consumed");
            return Ok(false);
        }

        // A previous pass wrote the transaction but failed to flag the record
        let created = match self.store.find_transaction_by_automatic(&current.id).await? {
            Some(existing) => {
                debug!(id = %current.id, tx = existing.id, "Transaction already exists");
                false
            }
            None => {
                let tx = self
                    .store
                    .insert_transaction(&transaction_for(&current))
                    .await
                    .into_result()?;
                debug!(id = %current.id, tx = tx.id, "Inserted transaction for automatic record");
                true
            }
        };

        current.used = true;
        if let InsertResult::Failed(e) = self.store.insert_automatic(&current).await {
            return Err(Error::Job(format!(
                "transaction written but record {} not marked used: {}",
                current.id, e
            )));
        }

        Ok(created)
    }
}

/// Local date-time of a notification's post time
fn posted_at(record: &AutomaticRecord) -> NaiveDateTime {
    Local
        .timestamp_millis_opt(record.notification.post_time_epoch_millis)
        .single()
        .map(|dt| dt.naive_local())
        .unwrap_or_else(|| record.created_at.with_timezone(&Local).naive_local())
}

/// The ledger transaction written for an automatic record
pub fn transaction_for(record: &AutomaticRecord) -> NewLedgerTransaction {
    let n = &record.notification;
    NewLedgerTransaction {
        name: record.title.clone(),
        note: format!(
            "Automatically imported from {}: \"{}\" (notification id {}, key {}, group {})",
            n.package_name, record.match_text, n.id, n.key, n.group
        ),
        kind: record.kind,
        amount_cents: record.amount_cents,
        date: posted_at(record),
        categories: Vec::new(),
        automatic_id: Some(record.id.clone()),
        automatic_created_at: Some(record.created_at),
        repeat_id: None,
        source_id: None,
    }
}
