//! Ledger transaction operations

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{column_error, parse_datetime, Database, DATETIME_FORMAT};
use crate::error::Result;
use crate::models::{LedgerTransaction, NewLedgerTransaction, TransactionKind};

const TRANSACTION_COLUMNS: &str = "id, name, note, kind, amount_cents, date, categories, \
     automatic_id, automatic_created_at, repeat_id, source_id, created_at";

fn row_to_transaction(row: &Row<'_>) -> rusqlite::Result<LedgerTransaction> {
    let kind: String = row.get(3)?;
    let date: String = row.get(5)?;
    let categories: String = row.get(6)?;
    let automatic_created_at: Option<String> = row.get(8)?;
    let created_at: String = row.get(11)?;

    Ok(LedgerTransaction {
        id: row.get(0)?,
        name: row.get(1)?,
        note: row.get(2)?,
        kind: kind.parse().unwrap_or(TransactionKind::Spend),
        amount_cents: row.get(4)?,
        date: NaiveDateTime::parse_from_str(&date, DATETIME_FORMAT)
            .map_err(|e| column_error(5, e))?,
        categories: serde_json::from_str(&categories).map_err(|e| column_error(6, e))?,
        automatic_id: row.get(7)?,
        automatic_created_at: automatic_created_at
            .map(|s| DateTime::parse_from_rfc3339(&s).map(|dt| dt.with_timezone(&Utc)))
            .transpose()
            .map_err(|e| column_error(8, e))?,
        repeat_id: row.get(9)?,
        source_id: row.get(10)?,
        created_at: parse_datetime(&created_at),
    })
}

impl Database {
    /// Insert a ledger transaction, returning its new id
    ///
    /// Fails on a second transaction for the same automatic record
    /// (`automatic_id` is UNIQUE).
    pub fn insert_ledger_transaction(&self, tx: &NewLedgerTransaction) -> Result<i64> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO transactions (name, note, kind, amount_cents, date, categories,
                automatic_id, automatic_created_at, repeat_id, source_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                tx.name,
                tx.note,
                tx.kind.as_str(),
                tx.amount_cents,
                tx.date.format(DATETIME_FORMAT).to_string(),
                serde_json::to_string(&tx.categories)?,
                tx.automatic_id,
                tx.automatic_created_at.map(|dt| dt.to_rfc3339()),
                tx.repeat_id,
                tx.source_id,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Get a transaction by id
    pub fn get_ledger_transaction(&self, id: i64) -> Result<Option<LedgerTransaction>> {
        let conn = self.conn()?;
        let tx = conn
            .query_row(
                &format!("SELECT {} FROM transactions WHERE id = ?", TRANSACTION_COLUMNS),
                params![id],
                row_to_transaction,
            )
            .optional()?;
        Ok(tx)
    }

    /// List transactions, newest first
    pub fn list_ledger_transactions(&self, limit: i64) -> Result<Vec<LedgerTransaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions ORDER BY date DESC, id DESC LIMIT ?",
            TRANSACTION_COLUMNS
        ))?;
        let txs = stmt
            .query_map(params![limit], row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(txs)
    }

    /// All transactions created by a repeat rule, most recently created first
    pub fn list_transactions_by_repeat(&self, repeat_id: i64) -> Result<Vec<LedgerTransaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions WHERE repeat_id = ? ORDER BY created_at DESC, id DESC",
            TRANSACTION_COLUMNS
        ))?;
        let txs = stmt
            .query_map(params![repeat_id], row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(txs)
    }

    /// The transaction a repeat rule created for a given calendar day, if any
    pub fn find_transaction_by_repeat_on_date(
        &self,
        repeat_id: i64,
        date: NaiveDate,
    ) -> Result<Option<LedgerTransaction>> {
        let conn = self.conn()?;
        let tx = conn
            .query_row(
                &format!(
                    "SELECT {} FROM transactions WHERE repeat_id = ? AND substr(date, 1, 10) = ? \
                     ORDER BY id DESC LIMIT 1",
                    TRANSACTION_COLUMNS
                ),
                params![repeat_id, date.to_string()],
                row_to_transaction,
            )
            .optional()?;
        Ok(tx)
    }

    /// The transaction written for an automatic record, if any
    pub fn find_transaction_by_automatic(
        &self,
        automatic_id: &str,
    ) -> Result<Option<LedgerTransaction>> {
        let conn = self.conn()?;
        let tx = conn
            .query_row(
                &format!(
                    "SELECT {} FROM transactions WHERE automatic_id = ?",
                    TRANSACTION_COLUMNS
                ),
                params![automatic_id],
                row_to_transaction,
            )
            .optional()?;
        Ok(tx)
    }
}
