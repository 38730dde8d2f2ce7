//! Data-access port consumed by the pipelines
//!
//! The extraction and materialization code only talks to storage through
//! [`LedgerStore`]. [`crate::db::Database`] is the SQLite implementation;
//! hosts may provide their own.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::models::{
    AutomaticRecord, DedupKey, LedgerTransaction, NewLedgerTransaction, NotificationWatch,
    RepeatRule,
};

/// Outcome of a write through the store
#[derive(Debug)]
pub enum InsertResult<T> {
    /// A new row was created
    Inserted(T),
    /// An existing row was replaced
    Updated(T),
    Failed(Error),
}

impl<T> InsertResult<T> {
    /// Collapse into a plain `Result`, dropping the inserted/updated distinction
    pub fn into_result(self) -> Result<T> {
        match self {
            Self::Inserted(data) | Self::Updated(data) => Ok(data),
            Self::Failed(e) => Err(e),
        }
    }
}

impl<T> From<Result<T>> for InsertResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::Inserted(data),
            Err(e) => Self::Failed(e),
        }
    }
}

/// Storage operations the pipelines depend on
///
/// Implementations must be Send + Sync so one store can be shared by the
/// notification handler and every background job.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Automatic records with `used = false`, oldest first
    async fn query_unused_automatics(&self) -> Result<Vec<AutomaticRecord>>;

    /// Fetch one automatic record by id
    async fn get_automatic(&self, id: &str) -> Result<Option<AutomaticRecord>>;

    /// Look up an automatic record by its dedup tuple
    async fn find_automatic(&self, key: &DedupKey) -> Result<Option<AutomaticRecord>>;

    /// Insert a record, or update it when a record with the same id exists
    async fn insert_automatic(&self, record: &AutomaticRecord) -> InsertResult<AutomaticRecord>;

    /// Rules that are active and not archived
    async fn query_active_repeats(&self) -> Result<Vec<RepeatRule>>;

    /// Transactions created by a rule, most recently created first
    async fn query_transactions_by_repeat(&self, repeat_id: i64) -> Result<Vec<LedgerTransaction>>;

    /// The rule's transaction dated on `date`, if any
    async fn query_transaction_by_repeat_on_date(
        &self,
        repeat_id: i64,
        date: NaiveDate,
    ) -> Result<Option<LedgerTransaction>>;

    /// The transaction written for an automatic record, if any
    async fn find_transaction_by_automatic(
        &self,
        automatic_id: &str,
    ) -> Result<Option<LedgerTransaction>>;

    /// Insert a ledger transaction
    async fn insert_transaction(&self, tx: &NewLedgerTransaction)
        -> InsertResult<LedgerTransaction>;

    /// Enabled user notification watches, ordered by id
    async fn list_enabled_watches(&self) -> Result<Vec<NotificationWatch>>;
}
