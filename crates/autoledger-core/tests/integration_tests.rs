//! Integration tests for autoledger-core
//!
//! These tests exercise the notification → automatic record → transaction
//! workflow and the repeat materializer against a real database.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};

use autoledger_core::{
    db::Database,
    jobs::JobKind,
    matchers::{GOOGLE_WALLET_PACKAGE, VENMO_PACKAGE},
    models::{
        NewRepeatRule, NotificationFields, NotificationMeta, NotificationPayload, RepeatType,
        TransactionKind, TransactionTemplate,
    },
    test_utils::{FlakyStore, RecordingJobQueue},
    AutomaticMaterializer, NotificationPipeline, RecordOutcome, RepeatMaterializer,
};

fn notification(id: i32, package: &str, title: &str, text: &str) -> NotificationPayload {
    NotificationPayload {
        meta: NotificationMeta {
            id,
            key: format!("0|{}|{}|null|10123", package, id),
            group: "g".to_string(),
            package_name: package.to_string(),
            post_time_epoch_millis: 1_710_000_000_000,
        },
        fields: NotificationFields {
            title: title.to_string(),
            text: text.to_string(),
            ..Default::default()
        },
    }
}

fn monthly_rule(name: &str, first: NaiveDate) -> NewRepeatRule {
    NewRepeatRule {
        template: TransactionTemplate {
            name: name.to_string(),
            note: "monthly".to_string(),
            amount_cents: 5_000,
            kind: TransactionKind::Spend,
            categories: vec![1],
            source_id: None,
        },
        repeat_type: RepeatType::MonthlyOnDay,
        first_date: first,
    }
}

fn daily_rule(name: &str) -> NewRepeatRule {
    NewRepeatRule {
        repeat_type: RepeatType::Daily,
        ..monthly_rule(name, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
    }
}

fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

#[tokio::test]
async fn test_full_notification_workflow() {
    let db = Database::in_memory().unwrap();
    let jobs = Arc::new(RecordingJobQueue::default());
    let pipeline = NotificationPipeline::new(Arc::new(db.clone()), jobs.clone());

    // Venmo payment, then the same notification delivered again
    let venmo = notification(1, VENMO_PACKAGE, "Venmo", "You paid Tom Smith $12.34");
    let outcome = pipeline.on_notification(&venmo).await;
    assert!(matches!(outcome, Some(RecordOutcome::Inserted(_))));
    let again = pipeline.on_notification(&venmo).await;
    assert!(matches!(again, Some(RecordOutcome::AlreadyExists(_))));

    // Wallet tap
    let wallet = notification(2, GOOGLE_WALLET_PACKAGE, "Blue Bottle", "$5.00 with Visa ••1234");
    pipeline.on_notification(&wallet).await;

    let records = db.list_automatics(false).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].amount_cents, 1234);
    assert_eq!(records[0].title, "Tom Smith");
    assert_eq!(jobs.enqueued(), vec![JobKind::ConsumeAutomatics; 2]);

    // The enqueued job
    let summary = AutomaticMaterializer::new(Arc::new(db.clone()))
        .materialize_unconsumed()
        .await
        .unwrap();
    assert_eq!(summary.created, 2);
    assert!(db.list_automatics(false).unwrap().is_empty());

    let txs = db.list_ledger_transactions(10).unwrap();
    assert_eq!(txs.len(), 2);
    let coffee = txs.iter().find(|t| t.name == "Blue Bottle").unwrap();
    assert_eq!(coffee.amount_cents, 500);
    assert_eq!(coffee.kind, TransactionKind::Spend);
    assert!(coffee.automatic_id.is_some());
}

#[tokio::test]
async fn test_unmatched_notification_records_nothing() {
    let db = Database::in_memory().unwrap();
    let jobs = Arc::new(RecordingJobQueue::default());
    let pipeline = NotificationPipeline::new(Arc::new(db.clone()), jobs.clone());

    let chat = notification(3, "com.example.chat", "Alex", "Lunch is $12.00 each");
    assert!(pipeline.on_notification(&chat).await.is_none());

    let no_amount = notification(4, VENMO_PACKAGE, "Venmo", "You paid Tom Smith");
    assert!(pipeline.on_notification(&no_amount).await.is_none());

    assert!(db.list_automatics(true).unwrap().is_empty());
    assert!(jobs.enqueued().is_empty());
}

#[tokio::test]
async fn test_ignore_rule_beats_matcher() {
    let db = Database::in_memory().unwrap();
    let pipeline = NotificationPipeline::new(
        Arc::new(db.clone()),
        Arc::new(RecordingJobQueue::default()),
    );

    let alert = notification(5, VENMO_PACKAGE, "Security alert", "You paid Tom Smith $12.34");
    assert!(pipeline.on_notification(&alert).await.is_none());
    assert!(db.list_automatics(true).unwrap().is_empty());
}

#[tokio::test]
async fn test_user_watch_extends_matching() {
    let db = Database::in_memory().unwrap();
    db.save_watch(&autoledger_core::NewNotificationWatch {
        name: "Example Bank".to_string(),
        act_on_package_names: vec!["com.example.bank".to_string()],
        match_regexes: vec![r"(?i)^deposit of \$".to_string()],
        kind: TransactionKind::Earn,
    })
    .unwrap();
    let pipeline = NotificationPipeline::new(
        Arc::new(db.clone()),
        Arc::new(RecordingJobQueue::default()),
    );

    let deposit = notification(6, "com.example.bank", "", "Deposit of $1,250.00 received");
    match pipeline.on_notification(&deposit).await {
        Some(RecordOutcome::Inserted(r)) => {
            assert_eq!(r.kind, TransactionKind::Earn);
            assert_eq!(r.amount_cents, 125_000);
            assert_eq!(r.title, "Automatic Spend Transaction");
        }
        other => panic!("expected insert, got {:?}", other),
    }
}

#[tokio::test]
async fn test_daily_repeat_idempotent() {
    let db = Database::in_memory().unwrap();
    let id = db.create_repeat_rule(&daily_rule("Coffee budget")).unwrap();
    let materializer = RepeatMaterializer::new(Arc::new(db.clone()));

    let first = materializer.materialize_due_repeats_at(at(2024, 6, 1)).await.unwrap();
    let second = materializer.materialize_due_repeats_at(at(2024, 6, 1)).await.unwrap();

    assert_eq!(first.created, 1);
    assert_eq!(second.created, 0);
    assert_eq!(second.skipped, 1);
    assert_eq!(db.list_transactions_by_repeat(id).unwrap().len(), 1);

    // Next day fires again
    let third = materializer.materialize_due_repeats_at(at(2024, 6, 2)).await.unwrap();
    assert_eq!(third.created, 1);
}

#[tokio::test]
async fn test_monthly_repeat_matches_day_of_month() {
    let db = Database::in_memory().unwrap();
    let id = db
        .create_repeat_rule(&monthly_rule("Rent", NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()))
        .unwrap();
    let materializer = RepeatMaterializer::new(Arc::new(db.clone()));

    let off_day = materializer.materialize_due_repeats_at(at(2024, 3, 16)).await.unwrap();
    assert_eq!(off_day.created, 0);

    let on_day = materializer.materialize_due_repeats_at(at(2024, 3, 15)).await.unwrap();
    assert_eq!(on_day.created, 1);

    let txs = db.list_transactions_by_repeat(id).unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].name, "Rent");
    assert_eq!(txs[0].amount_cents, 5_000);
    assert_eq!(txs[0].date, at(2024, 3, 15));
    assert_eq!(txs[0].repeat_id, Some(id));
}

#[tokio::test]
async fn test_archived_and_paused_rules_skipped() {
    let db = Database::in_memory().unwrap();
    let archived = db.create_repeat_rule(&daily_rule("Archived")).unwrap();
    let paused = db.create_repeat_rule(&daily_rule("Paused")).unwrap();
    db.archive_repeat_rule(archived).unwrap();
    db.set_repeat_active(paused, false).unwrap();

    let summary = RepeatMaterializer::new(Arc::new(db.clone()))
        .materialize_due_repeats_at(at(2024, 6, 1))
        .await
        .unwrap();

    assert_eq!(summary.visited, 0);
    assert!(db.list_ledger_transactions(10).unwrap().is_empty());
}

#[tokio::test]
async fn test_failing_rule_does_not_stop_pass() {
    let db = Database::in_memory().unwrap();
    let broken = db.create_repeat_rule(&daily_rule("Broken")).unwrap();
    let fine = db.create_repeat_rule(&daily_rule("Fine")).unwrap();

    let store = FlakyStore::new(db.clone()).fail_history_for(broken);
    let summary = RepeatMaterializer::new(Arc::new(store))
        .materialize_due_repeats_at(at(2024, 6, 1))
        .await
        .unwrap();

    assert_eq!(summary.visited, 2);
    assert_eq!(summary.created, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(db.list_transactions_by_repeat(fine).unwrap().len(), 1);
    assert!(db.list_transactions_by_repeat(broken).unwrap().is_empty());
}

#[tokio::test]
async fn test_panicking_rule_does_not_stop_pass() {
    let db = Database::in_memory().unwrap();
    let bad = db.create_repeat_rule(&daily_rule("Bad")).unwrap();
    let good = db.create_repeat_rule(&daily_rule("Good")).unwrap();

    let store = FlakyStore::new(db.clone()).panic_on_history_for(bad);
    let summary = RepeatMaterializer::new(Arc::new(store))
        .materialize_due_repeats_at(at(2024, 6, 1))
        .await
        .unwrap();

    assert_eq!(summary.visited, 2);
    assert_eq!(summary.created, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(db.list_transactions_by_repeat(good).unwrap().len(), 1);
    assert!(db.list_transactions_by_repeat(bad).unwrap().is_empty());
}

#[tokio::test]
async fn test_inactive_rules_rechecked_before_materializing() {
    let db = Database::in_memory().unwrap();
    let archived = db.create_repeat_rule(&daily_rule("Archived")).unwrap();
    let paused = db.create_repeat_rule(&daily_rule("Paused")).unwrap();
    let live = db.create_repeat_rule(&daily_rule("Live")).unwrap();
    db.archive_repeat_rule(archived).unwrap();
    db.set_repeat_active(paused, false).unwrap();

    // A store that hands back every rule, stale flags and all
    let store = FlakyStore::new(db.clone()).list_all_repeats();
    let summary = RepeatMaterializer::new(Arc::new(store))
        .materialize_due_repeats_at(at(2024, 6, 1))
        .await
        .unwrap();

    assert_eq!(summary.visited, 3);
    assert_eq!(summary.created, 1);
    assert_eq!(summary.skipped, 2);
    assert!(db.list_transactions_by_repeat(archived).unwrap().is_empty());
    assert!(db.list_transactions_by_repeat(paused).unwrap().is_empty());
    assert_eq!(db.list_transactions_by_repeat(live).unwrap().len(), 1);
}

#[tokio::test]
async fn test_monthly_backfill_uses_transaction_dates() {
    let db = Database::in_memory().unwrap();
    let id = db
        .create_repeat_rule(&monthly_rule("Rent", NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()))
        .unwrap();
    let materializer = RepeatMaterializer::new(Arc::new(db.clone()));

    // Runs for past days, all created just now
    let feb = materializer.materialize_due_repeats_at(at(2024, 2, 15)).await.unwrap();
    let mar = materializer.materialize_due_repeats_at(at(2024, 3, 15)).await.unwrap();
    let again = materializer.materialize_due_repeats_at(at(2024, 3, 15)).await.unwrap();

    assert_eq!((feb.created, mar.created, again.created), (1, 1, 0));
    assert_eq!(db.list_transactions_by_repeat(id).unwrap().len(), 2);
}

#[tokio::test]
async fn test_failed_automatic_retried_next_pass() {
    let db = Database::in_memory().unwrap();
    let pipeline = NotificationPipeline::new(
        Arc::new(db.clone()),
        Arc::new(RecordingJobQueue::default()),
    );
    pipeline
        .on_notification(&notification(7, VENMO_PACKAGE, "Venmo", "You paid Broken $3.00"))
        .await;

    let flaky = FlakyStore::new(db.clone()).fail_transactions_named("Broken");
    let summary = AutomaticMaterializer::new(Arc::new(flaky))
        .materialize_unconsumed()
        .await
        .unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(db.list_automatics(false).unwrap().len(), 1);

    // Healthy store picks it up
    let summary = AutomaticMaterializer::new(Arc::new(db.clone()))
        .materialize_unconsumed()
        .await
        .unwrap();
    assert_eq!(summary.created, 1);
    assert!(db.list_automatics(false).unwrap().is_empty());
}
