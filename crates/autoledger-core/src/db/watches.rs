//! Notification watch operations

use regex::Regex;
use rusqlite::{params, Row};

use super::{column_error, Database};
use crate::error::{Error, Result};
use crate::models::{NewNotificationWatch, NotificationWatch, TransactionKind};

fn row_to_watch(row: &Row<'_>) -> rusqlite::Result<NotificationWatch> {
    let packages: String = row.get(2)?;
    let regexes: String = row.get(3)?;
    let kind: String = row.get(4)?;

    Ok(NotificationWatch {
        id: row.get(0)?,
        name: row.get(1)?,
        act_on_package_names: serde_json::from_str(&packages).map_err(|e| column_error(2, e))?,
        match_regexes: serde_json::from_str(&regexes).map_err(|e| column_error(3, e))?,
        kind: kind.parse().unwrap_or(TransactionKind::Spend),
        enabled: row.get(5)?,
    })
}

impl Database {
    /// Save a new watch, returning its id
    ///
    /// Every pattern is compiled first so the extraction pipeline never
    /// receives one that cannot compile.
    pub fn save_watch(&self, watch: &NewNotificationWatch) -> Result<i64> {
        if watch.act_on_package_names.is_empty() {
            return Err(Error::InvalidData(format!(
                "Watch '{}' needs at least one package name",
                watch.name
            )));
        }
        if watch.match_regexes.is_empty() {
            return Err(Error::InvalidData(format!(
                "Watch '{}' needs at least one pattern",
                watch.name
            )));
        }
        for pattern in &watch.match_regexes {
            Regex::new(pattern)?;
        }

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO notification_watches (name, package_names, match_regexes, kind) VALUES (?, ?, ?, ?)",
            params![
                watch.name,
                serde_json::to_string(&watch.act_on_package_names)?,
                serde_json::to_string(&watch.match_regexes)?,
                watch.kind.as_str(),
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// List watches ordered by id
    pub fn list_watches(&self, enabled_only: bool) -> Result<Vec<NotificationWatch>> {
        let conn = self.conn()?;
        let sql = if enabled_only {
            "SELECT id, name, package_names, match_regexes, kind, enabled FROM notification_watches WHERE enabled = 1 ORDER BY id"
        } else {
            "SELECT id, name, package_names, match_regexes, kind, enabled FROM notification_watches ORDER BY id"
        };

        let mut stmt = conn.prepare(sql)?;
        let watches = stmt
            .query_map([], row_to_watch)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(watches)
    }

    /// Enable or disable a watch
    pub fn set_watch_enabled(&self, id: i64, enabled: bool) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE notification_watches SET enabled = ? WHERE id = ?",
            params![enabled, id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Notification watch {}", id)));
        }
        Ok(())
    }

    /// Insert config-file watches whose name is not already present
    ///
    /// Returns the number of watches added.
    pub fn seed_watches(&self, watches: &[NewNotificationWatch]) -> Result<usize> {
        let existing: Vec<String> = self
            .list_watches(false)?
            .into_iter()
            .map(|w| w.name)
            .collect();

        let mut added = 0;
        for watch in watches {
            if existing.iter().any(|name| name == &watch.name) {
                continue;
            }
            self.save_watch(watch)?;
            added += 1;
        }
        Ok(added)
    }
}
