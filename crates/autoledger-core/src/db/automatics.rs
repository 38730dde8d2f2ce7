//! Automatic record operations

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{column_error, Database};
use crate::error::Result;
use crate::models::{AutomaticRecord, DedupKey, NotificationMeta, TransactionKind};

const AUTOMATIC_COLUMNS: &str = "id, created_at, categories, notification_id, notification_key, \
     notification_group, package_name, post_time, match_text, amount_cents, title, kind, used, \
     account, date, merchant, description";

/// Whether an upsert created a row or replaced one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertKind {
    Inserted,
    Updated,
}

fn row_to_automatic(row: &Row<'_>) -> rusqlite::Result<AutomaticRecord> {
    let created_at: String = row.get(1)?;
    let categories: String = row.get(2)?;
    let kind: String = row.get(11)?;

    Ok(AutomaticRecord {
        id: row.get(0)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| column_error(1, e))?
            .with_timezone(&Utc),
        categories: serde_json::from_str(&categories).map_err(|e| column_error(2, e))?,
        notification: NotificationMeta {
            id: row.get(3)?,
            key: row.get(4)?,
            group: row.get(5)?,
            package_name: row.get(6)?,
            post_time_epoch_millis: row.get(7)?,
        },
        match_text: row.get(8)?,
        amount_cents: row.get(9)?,
        title: row.get(10)?,
        kind: kind.parse().unwrap_or(TransactionKind::Spend),
        used: row.get(12)?,
        account: row.get(13)?,
        date: row.get(14)?,
        merchant: row.get(15)?,
        description: row.get(16)?,
    })
}

impl Database {
    /// Insert a record, or overwrite the mutable fields of an existing one with the same id
    pub fn upsert_automatic(&self, record: &AutomaticRecord) -> Result<UpsertKind> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let exists: bool = tx
            .query_row(
                "SELECT 1 FROM automatic_records WHERE id = ?",
                params![record.id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();

        let categories = serde_json::to_string(&record.categories)?;

        if exists {
            tx.execute(
                r#"
                UPDATE automatic_records
                SET categories = ?, amount_cents = ?, title = ?, kind = ?, used = ?,
                    account = ?, date = ?, merchant = ?, description = ?
                WHERE id = ?
                "#,
                params![
                    categories,
                    record.amount_cents,
                    record.title,
                    record.kind.as_str(),
                    record.used,
                    record.account,
                    record.date,
                    record.merchant,
                    record.description,
                    record.id,
                ],
            )?;
        } else {
            tx.execute(
                r#"
                INSERT INTO automatic_records (id, dedup_hash, created_at, categories, notification_id,
                    notification_key, notification_group, package_name, post_time, match_text,
                    amount_cents, title, kind, used, account, date, merchant, description)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
                params![
                    record.id,
                    record.dedup_key().hash(),
                    record.created_at.to_rfc3339(),
                    categories,
                    record.notification.id,
                    record.notification.key,
                    record.notification.group,
                    record.notification.package_name,
                    record.notification.post_time_epoch_millis,
                    record.match_text,
                    record.amount_cents,
                    record.title,
                    record.kind.as_str(),
                    record.used,
                    record.account,
                    record.date,
                    record.merchant,
                    record.description,
                ],
            )?;
        }

        tx.commit()?;
        Ok(if exists {
            UpsertKind::Updated
        } else {
            UpsertKind::Inserted
        })
    }

    /// Get a record by id
    pub fn get_automatic(&self, id: &str) -> Result<Option<AutomaticRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!("SELECT {} FROM automatic_records WHERE id = ?", AUTOMATIC_COLUMNS),
                params![id],
                row_to_automatic,
            )
            .optional()?;
        Ok(record)
    }

    /// Find a record by its notification dedup tuple
    pub fn find_automatic_by_key(&self, key: &DedupKey) -> Result<Option<AutomaticRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!(
                    "SELECT {} FROM automatic_records WHERE dedup_hash = ?",
                    AUTOMATIC_COLUMNS
                ),
                params![key.hash()],
                row_to_automatic,
            )
            .optional()?;
        Ok(record)
    }

    /// List records, oldest first; unconsumed only unless `include_used`
    pub fn list_automatics(&self, include_used: bool) -> Result<Vec<AutomaticRecord>> {
        let conn = self.conn()?;
        let sql = if include_used {
            format!(
                "SELECT {} FROM automatic_records ORDER BY created_at, id",
                AUTOMATIC_COLUMNS
            )
        } else {
            format!(
                "SELECT {} FROM automatic_records WHERE used = 0 ORDER BY created_at, id",
                AUTOMATIC_COLUMNS
            )
        };

        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map([], row_to_automatic)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }
}
