//! `LedgerStore` over the SQLite database

use async_trait::async_trait;
use chrono::NaiveDate;

use super::automatics::UpsertKind;
use super::Database;
use crate::error::{Error, Result};
use crate::models::{
    AutomaticRecord, DedupKey, LedgerTransaction, NewLedgerTransaction, NotificationWatch,
    RepeatRule,
};
use crate::store::{InsertResult, LedgerStore};

#[async_trait]
impl LedgerStore for Database {
    async fn query_unused_automatics(&self) -> Result<Vec<AutomaticRecord>> {
        self.list_automatics(false)
    }

    async fn get_automatic(&self, id: &str) -> Result<Option<AutomaticRecord>> {
        Database::get_automatic(self, id)
    }

    async fn find_automatic(&self, key: &DedupKey) -> Result<Option<AutomaticRecord>> {
        self.find_automatic_by_key(key)
    }

    async fn insert_automatic(&self, record: &AutomaticRecord) -> InsertResult<AutomaticRecord> {
        match self.upsert_automatic(record) {
            Ok(UpsertKind::Inserted) => InsertResult::Inserted(record.clone()),
            Ok(UpsertKind::Updated) => InsertResult::Updated(record.clone()),
            Err(e) => InsertResult::Failed(e),
        }
    }

    async fn query_active_repeats(&self) -> Result<Vec<RepeatRule>> {
        self.list_active_repeat_rules()
    }

    async fn query_transactions_by_repeat(&self, repeat_id: i64) -> Result<Vec<LedgerTransaction>> {
        self.list_transactions_by_repeat(repeat_id)
    }

    async fn query_transaction_by_repeat_on_date(
        &self,
        repeat_id: i64,
        date: NaiveDate,
    ) -> Result<Option<LedgerTransaction>> {
        self.find_transaction_by_repeat_on_date(repeat_id, date)
    }

    async fn find_transaction_by_automatic(
        &self,
        automatic_id: &str,
    ) -> Result<Option<LedgerTransaction>> {
        Database::find_transaction_by_automatic(self, automatic_id)
    }

    async fn insert_transaction(
        &self,
        tx: &NewLedgerTransaction,
    ) -> InsertResult<LedgerTransaction> {
        let inserted = self.insert_ledger_transaction(tx).and_then(|id| {
            self.get_ledger_transaction(id)?
                .ok_or_else(|| Error::NotFound(format!("Transaction {} after insert", id)))
        });
        inserted.into()
    }

    async fn list_enabled_watches(&self) -> Result<Vec<NotificationWatch>> {
        self.list_watches(true)
    }
}
