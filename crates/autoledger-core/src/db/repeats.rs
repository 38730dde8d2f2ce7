//! Repeat rule operations

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};

use super::{column_error, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{NewRepeatRule, RepeatRule, RepeatType, TransactionKind, TransactionTemplate};

const REPEAT_COLUMNS: &str = "id, name, note, amount_cents, kind, categories, source_id, \
     repeat_type, first_date, active, archived, created_at";

fn row_to_repeat(row: &Row<'_>) -> rusqlite::Result<RepeatRule> {
    let kind: String = row.get(4)?;
    let categories: String = row.get(5)?;
    let repeat_type: String = row.get(7)?;
    let first_date: String = row.get(8)?;
    let created_at: String = row.get(11)?;

    Ok(RepeatRule {
        id: row.get(0)?,
        template: TransactionTemplate {
            name: row.get(1)?,
            note: row.get(2)?,
            amount_cents: row.get(3)?,
            kind: kind.parse().unwrap_or(TransactionKind::Spend),
            categories: serde_json::from_str(&categories).map_err(|e| column_error(5, e))?,
            source_id: row.get(6)?,
        },
        repeat_type: repeat_type.parse().map_err(|e: String| {
            column_error(7, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?,
        first_date: NaiveDate::parse_from_str(&first_date, "%Y-%m-%d")
            .map_err(|e| column_error(8, e))?,
        active: row.get(9)?,
        archived: row.get(10)?,
        created_at: parse_datetime(&created_at),
    })
}

impl Database {
    /// Create a repeat rule, returning its id
    pub fn create_repeat_rule(&self, rule: &NewRepeatRule) -> Result<i64> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO repeat_rules (name, note, amount_cents, kind, categories, source_id, repeat_type, first_date)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                rule.template.name,
                rule.template.note,
                rule.template.amount_cents,
                rule.template.kind.as_str(),
                serde_json::to_string(&rule.template.categories)?,
                rule.template.source_id,
                rule.repeat_type.as_str(),
                rule.first_date.to_string(),
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Get a repeat rule by id
    pub fn get_repeat_rule(&self, id: i64) -> Result<Option<RepeatRule>> {
        let conn = self.conn()?;
        let rule = conn
            .query_row(
                &format!("SELECT {} FROM repeat_rules WHERE id = ?", REPEAT_COLUMNS),
                params![id],
                row_to_repeat,
            )
            .optional()?;
        Ok(rule)
    }

    /// List repeat rules, hiding archived ones unless asked
    pub fn list_repeat_rules(&self, include_archived: bool) -> Result<Vec<RepeatRule>> {
        let conn = self.conn()?;
        let sql = if include_archived {
            format!("SELECT {} FROM repeat_rules ORDER BY id", REPEAT_COLUMNS)
        } else {
            format!(
                "SELECT {} FROM repeat_rules WHERE archived = 0 ORDER BY id",
                REPEAT_COLUMNS
            )
        };

        let mut stmt = conn.prepare(&sql)?;
        let rules = stmt
            .query_map([], row_to_repeat)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rules)
    }

    /// Rules the repeat materializer should visit
    pub fn list_active_repeat_rules(&self) -> Result<Vec<RepeatRule>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM repeat_rules WHERE active = 1 AND archived = 0 ORDER BY id",
            REPEAT_COLUMNS
        ))?;
        let rules = stmt
            .query_map([], row_to_repeat)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rules)
    }

    /// Pause or resume a rule; paused rules are kept but skipped
    pub fn set_repeat_active(&self, id: i64, active: bool) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE repeat_rules SET active = ? WHERE id = ?",
            params![active, id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Repeat rule {}", id)));
        }
        Ok(())
    }

    /// Archive a rule so it is never materialized again
    pub fn archive_repeat_rule(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE repeat_rules SET archived = 1 WHERE id = ?",
            params![id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Repeat rule {}", id)));
        }
        Ok(())
    }

    /// Change how often a rule fires
    ///
    /// Refused once the rule has created a transaction: the new schedule
    /// could fire again for a period the old one already covered.
    pub fn update_repeat_type(&self, id: i64, repeat_type: RepeatType) -> Result<()> {
        let conn = self.conn()?;

        let history: i64 = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE repeat_id = ?",
            params![id],
            |row| row.get(0),
        )?;
        if history > 0 {
            return Err(Error::InvalidData(format!(
                "Repeat rule {} already has {} transaction(s); its repeat type cannot change",
                id, history
            )));
        }

        let updated = conn.execute(
            "UPDATE repeat_rules SET repeat_type = ? WHERE id = ?",
            params![repeat_type.as_str(), id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Repeat rule {}", id)));
        }
        Ok(())
    }
}
