//! Repeat materializer: stamps out recurring transactions when they fall due
//!
//! Eligibility per repeat type, for `today` and the rule's first date:
//! - daily: no transaction for the rule dated today
//! - weekly: same weekday, and the latest transaction is from before today
//! - monthly: same day of month, and the latest transaction is from an
//!   earlier (year, month)
//! - yearly: same day of year, and the latest transaction is from an
//!   earlier year
//!
//! Day-of-month and day-of-year are matched exactly. A rule anchored on the
//! 31st does not fire in shorter months, and a day-of-year anchor drifts by
//! one across leap years.

use std::sync::Arc;

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use tracing::{debug, error, info};

use crate::error::Result;
use crate::jobs::contain_panic;
use crate::models::{LedgerTransaction, NewLedgerTransaction, RepeatRule, RepeatType};
use crate::store::LedgerStore;

/// Counts from one repeat pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepeatSummary {
    pub visited: usize,
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Whether a weekly/monthly/yearly rule is due, given its latest transaction
///
/// The latest transaction is compared by its `date`, so a run for a past
/// date sees the same history a run on that day would have. Daily rules are
/// decided by a date lookup instead; see [`RepeatMaterializer`].
pub fn is_due(rule: &RepeatRule, today: NaiveDate, latest: Option<&LedgerTransaction>) -> bool {
    let first = rule.first_date;
    let prior = latest.map(|tx| tx.date.date());

    match rule.repeat_type {
        RepeatType::Daily => prior.map_or(true, |p| p != today),
        RepeatType::WeeklyOnDay => {
            today.weekday() == first.weekday() && prior.map_or(true, |p| p < today)
        }
        RepeatType::MonthlyOnDay => {
            today.day() == first.day()
                && prior.map_or(true, |p| (p.year(), p.month()) < (today.year(), today.month()))
        }
        RepeatType::YearlyOnDay => {
            today.ordinal() == first.ordinal() && prior.map_or(true, |p| p.year() < today.year())
        }
    }
}

/// The ledger transaction written for a rule at `at`
pub fn transaction_for(rule: &RepeatRule, at: NaiveDateTime) -> NewLedgerTransaction {
    let t = &rule.template;
    NewLedgerTransaction {
        name: t.name.clone(),
        note: t.note.clone(),
        kind: t.kind,
        amount_cents: t.amount_cents,
        date: at,
        categories: t.categories.clone(),
        automatic_id: None,
        automatic_created_at: None,
        repeat_id: Some(rule.id),
        source_id: t.source_id,
    }
}

/// Materializes due repeat rules into ledger transactions
#[derive(Clone)]
pub struct RepeatMaterializer {
    store: Arc<dyn LedgerStore>,
}

impl RepeatMaterializer {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Materialize every rule due on `today`, dated at the current local time
    pub async fn materialize_due_repeats(&self, today: NaiveDate) -> Result<RepeatSummary> {
        self.materialize_due_repeats_at(today.and_time(Local::now().time()))
            .await
    }

    /// Materialize every rule due on `now`'s date, dated exactly `now`
    ///
    /// Running twice for the same day creates nothing the second time. A
    /// rule that fails or panics is logged and counted, and the pass moves on
    /// to the next rule.
    pub async fn materialize_due_repeats_at(&self, now: NaiveDateTime) -> Result<RepeatSummary> {
        let rules = self.store.query_active_repeats().await?;
        let mut summary = RepeatSummary::default();

        for rule in rules {
            summary.visited += 1;
            match contain_panic(self.materialize_rule(&rule, now)).await {
                Ok(true) => summary.created += 1,
                Ok(false) => summary.skipped += 1,
                Err(e) => {
                    summary.failed += 1;
                    error!(
                        repeat_id = rule.id,
                        name = %rule.template.name,
                        "Failed to materialize repeat rule: {}",
                        e
                    );
                }
            }
        }

        info!(
            date = %now.date(),
            visited = summary.visited,
            created = summary.created,
            skipped = summary.skipped,
            failed = summary.failed,
            "Repeat materialization finished"
        );
        Ok(summary)
    }

    async fn materialize_rule(&self, rule: &RepeatRule, now: NaiveDateTime) -> Result<bool> {
        // The store only returns active rules, but a rule may flip between
        // the listing and this point in other callers
        if !rule.active || rule.archived {
            return Ok(false);
        }

        let today = now.date();
        let due = match rule.repeat_type {
            RepeatType::Daily => self
                .store
                .query_transaction_by_repeat_on_date(rule.id, today)
                .await?
                .is_none(),
            _ => {
                let history = self.store.query_transactions_by_repeat(rule.id).await?;
                is_due(rule, today, history.first())
            }
        };

        if !due {
            debug!(repeat_id = rule.id, repeat_type = %rule.repeat_type, "Repeat not due");
            return Ok(false);
        }

        let tx = self
            .store
            .insert_transaction(&transaction_for(rule, now))
            .await
            .into_result()?;
        debug!(repeat_id = rule.id, tx = tx.id, "Inserted repeat transaction");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TransactionKind, TransactionTemplate};
    use chrono::{NaiveTime, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rule(repeat_type: RepeatType, first: NaiveDate) -> RepeatRule {
        RepeatRule {
            id: 1,
            template: TransactionTemplate {
                name: "Rent".to_string(),
                note: String::new(),
                amount_cents: 150_000,
                kind: TransactionKind::Spend,
                categories: vec![3],
                source_id: None,
            },
            repeat_type,
            first_date: first,
            active: true,
            archived: false,
            created_at: Utc::now(),
        }
    }

    fn tx_on(d: NaiveDate) -> LedgerTransaction {
        LedgerTransaction {
            id: 1,
            name: "Rent".to_string(),
            note: String::new(),
            kind: TransactionKind::Spend,
            amount_cents: 150_000,
            date: d.and_time(NaiveTime::from_hms_opt(9, 0, 0).unwrap()),
            categories: vec![],
            automatic_id: None,
            automatic_created_at: None,
            repeat_id: Some(1),
            source_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_monthly_requires_matching_day() {
        let r = rule(RepeatType::MonthlyOnDay, date(2024, 1, 15));
        assert!(is_due(&r, date(2024, 3, 15), None));
        assert!(!is_due(&r, date(2024, 3, 16), None));
    }

    #[test]
    fn test_monthly_once_per_month() {
        let r = rule(RepeatType::MonthlyOnDay, date(2024, 1, 15));
        assert!(!is_due(&r, date(2024, 3, 15), Some(&tx_on(date(2024, 3, 15)))));
        assert!(is_due(&r, date(2024, 3, 15), Some(&tx_on(date(2024, 2, 15)))));
    }

    #[test]
    fn test_monthly_crosses_year_boundary() {
        let r = rule(RepeatType::MonthlyOnDay, date(2023, 6, 10));
        assert!(is_due(&r, date(2025, 1, 10), Some(&tx_on(date(2024, 12, 10)))));
    }

    #[test]
    fn test_weekly_same_weekday() {
        // 2024-03-04 is a Monday
        let r = rule(RepeatType::WeeklyOnDay, date(2024, 3, 4));
        assert!(is_due(&r, date(2024, 3, 11), Some(&tx_on(date(2024, 3, 4)))));
        assert!(!is_due(&r, date(2024, 3, 12), Some(&tx_on(date(2024, 3, 4)))));
        assert!(!is_due(&r, date(2024, 3, 11), Some(&tx_on(date(2024, 3, 11)))));
    }

    #[test]
    fn test_yearly_once_per_year() {
        let r = rule(RepeatType::YearlyOnDay, date(2023, 2, 1));
        assert!(is_due(&r, date(2024, 2, 1), Some(&tx_on(date(2023, 2, 1)))));
        assert!(!is_due(&r, date(2024, 2, 1), Some(&tx_on(date(2024, 2, 1)))));
        assert!(!is_due(&r, date(2024, 2, 2), None));
    }

    #[test]
    fn test_day_31_skips_short_months() {
        let r = rule(RepeatType::MonthlyOnDay, date(2024, 1, 31));
        assert!(!is_due(&r, date(2024, 4, 30), None));
    }

    #[test]
    fn test_template_copied_into_transaction() {
        let r = rule(RepeatType::Daily, date(2024, 1, 1));
        let at = date(2024, 5, 5).and_hms_opt(8, 30, 0).unwrap();
        let tx = transaction_for(&r, at);

        assert_eq!(tx.name, "Rent");
        assert_eq!(tx.amount_cents, 150_000);
        assert_eq!(tx.categories, vec![3]);
        assert_eq!(tx.repeat_id, Some(1));
        assert_eq!(tx.date, at);
        assert!(tx.automatic_id.is_none());
    }
}
