//! Test doubles for the store and job queue ports

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::jobs::{JobKind, JobQueue};
use crate::models::{
    AutomaticRecord, DedupKey, LedgerTransaction, NewLedgerTransaction, NotificationWatch,
    RepeatRule,
};
use crate::store::{InsertResult, LedgerStore};

/// Job queue that only remembers what was asked of it
#[derive(Default)]
pub struct RecordingJobQueue {
    enqueued: Mutex<Vec<JobKind>>,
    cancelled: Mutex<Vec<JobKind>>,
}

impl RecordingJobQueue {
    pub fn enqueued(&self) -> Vec<JobKind> {
        self.enqueued.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn cancelled(&self) -> Vec<JobKind> {
        self.cancelled.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl JobQueue for RecordingJobQueue {
    async fn enqueue(&self, kind: JobKind) -> Result<()> {
        if let Ok(mut v) = self.enqueued.lock() {
            v.push(kind);
        }
        Ok(())
    }

    async fn cancel(&self, kind: JobKind) -> Result<()> {
        if let Ok(mut v) = self.cancelled.lock() {
            v.push(kind);
        }
        Ok(())
    }
}

/// A `Database`-backed store that fails on demand
#[derive(Clone)]
pub struct FlakyStore {
    db: Database,
    fail_listing: bool,
    panic_on_listing: bool,
    fail_transactions_named: Option<String>,
    fail_history_for: Option<i64>,
    panic_history_for: Option<i64>,
    panic_transactions_named: Option<String>,
    list_all_repeats: bool,
    hidden_lookups: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            fail_listing: false,
            panic_on_listing: false,
            fail_transactions_named: None,
            fail_history_for: None,
            panic_history_for: None,
            panic_transactions_named: None,
            list_all_repeats: false,
            hidden_lookups: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Listing unused automatics or active repeats returns an error
    pub fn fail_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    /// Listing unused automatics or active repeats panics
    pub fn panic_on_listing(mut self) -> Self {
        self.panic_on_listing = true;
        self
    }

    /// Inserting a transaction with this name fails
    pub fn fail_transactions_named(mut self, name: &str) -> Self {
        self.fail_transactions_named = Some(name.to_string());
        self
    }

    /// Reading transaction history for this repeat rule fails
    pub fn fail_history_for(mut self, repeat_id: i64) -> Self {
        self.fail_history_for = Some(repeat_id);
        self
    }

    /// Reading transaction history for this repeat rule panics
    pub fn panic_on_history_for(mut self, repeat_id: i64) -> Self {
        self.panic_history_for = Some(repeat_id);
        self
    }

    /// Inserting a transaction with this name panics
    pub fn panic_on_transactions_named(mut self, name: &str) -> Self {
        self.panic_transactions_named = Some(name.to_string());
        self
    }

    /// `query_active_repeats` returns every rule, paused and archived included
    pub fn list_all_repeats(mut self) -> Self {
        self.list_all_repeats = true;
        self
    }

    /// The next `count` dedup lookups miss, as if another process wrote the
    /// record right after the lookup
    pub fn hide_lookups(self, count: usize) -> Self {
        self.hidden_lookups.store(count, Ordering::SeqCst);
        self
    }

    fn check_listing(&self) -> Result<()> {
        if self.panic_on_listing {
            panic!("injected listing panic");
        }
        if self.fail_listing {
            return Err(Error::Job("injected listing failure".to_string()));
        }
        Ok(())
    }

    fn check_history(&self, repeat_id: i64) -> Result<()> {
        if self.panic_history_for == Some(repeat_id) {
            panic!("injected history panic for {}", repeat_id);
        }
        if self.fail_history_for == Some(repeat_id) {
            return Err(Error::Job(format!("injected history failure for {}", repeat_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for FlakyStore {
    async fn query_unused_automatics(&self) -> Result<Vec<AutomaticRecord>> {
        self.check_listing()?;
        self.db.query_unused_automatics().await
    }

    async fn get_automatic(&self, id: &str) -> Result<Option<AutomaticRecord>> {
        self.db.get_automatic(id)
    }

    async fn find_automatic(&self, key: &DedupKey) -> Result<Option<AutomaticRecord>> {
        let hidden = self
            .hidden_lookups
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if hidden {
            return Ok(None);
        }
        self.db.find_automatic(key).await
    }

    async fn insert_automatic(&self, record: &AutomaticRecord) -> InsertResult<AutomaticRecord> {
        self.db.insert_automatic(record).await
    }

    async fn query_active_repeats(&self) -> Result<Vec<RepeatRule>> {
        self.check_listing()?;
        if self.list_all_repeats {
            return self.db.list_repeat_rules(true);
        }
        self.db.query_active_repeats().await
    }

    async fn query_transactions_by_repeat(&self, repeat_id: i64) -> Result<Vec<LedgerTransaction>> {
        self.check_history(repeat_id)?;
        self.db.query_transactions_by_repeat(repeat_id).await
    }

    async fn query_transaction_by_repeat_on_date(
        &self,
        repeat_id: i64,
        date: NaiveDate,
    ) -> Result<Option<LedgerTransaction>> {
        self.check_history(repeat_id)?;
        self.db.query_transaction_by_repeat_on_date(repeat_id, date).await
    }

    async fn find_transaction_by_automatic(
        &self,
        automatic_id: &str,
    ) -> Result<Option<LedgerTransaction>> {
        self.db.find_transaction_by_automatic(automatic_id)
    }

    async fn insert_transaction(
        &self,
        tx: &NewLedgerTransaction,
    ) -> InsertResult<LedgerTransaction> {
        if self.panic_transactions_named.as_deref() == Some(tx.name.as_str()) {
            panic!("injected insert panic for {}", tx.name);
        }
        if self.fail_transactions_named.as_deref() == Some(tx.name.as_str()) {
            return InsertResult::Failed(Error::InvalidData(format!(
                "injected insert failure for {}",
                tx.name
            )));
        }
        self.db.insert_transaction(tx).await
    }

    async fn list_enabled_watches(&self) -> Result<Vec<NotificationWatch>> {
        self.db.list_enabled_watches().await
    }
}
