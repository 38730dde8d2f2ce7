//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use autoledger_core::db::Database;
use autoledger_core::{AppConfig, RepeatType, TransactionKind};

use crate::commands::{self, format_amount, parse_dollars, truncate};

fn setup_test_db() -> Database {
    Database::in_memory().unwrap()
}

fn repeat_args(name: &str, amount: &str, repeat_type: &str) -> commands::RepeatArgs {
    commands::RepeatArgs {
        name: name.to_string(),
        amount: amount.to_string(),
        kind: "spend".to_string(),
        repeat_type: repeat_type.to_string(),
        first_date: Some("2024-01-15".to_string()),
        note: String::new(),
        categories: Some("3, 5".to_string()),
    }
}

fn venmo_payload(id: i32, text: &str) -> autoledger_core::NotificationPayload {
    commands::build_payload(
        "com.venmo",
        commands::NotificationText {
            title: "Venmo".to_string(),
            text: text.to_string(),
            big_title: String::new(),
            big_text: String::new(),
        },
        id,
        None,
        String::new(),
        Some(1_700_000_000_000),
    )
}

// ========== Helper Tests ==========

#[test]
fn test_parse_dollars() {
    assert_eq!(parse_dollars("12").unwrap(), 1200);
    assert_eq!(parse_dollars("12.5").unwrap(), 1250);
    assert_eq!(parse_dollars("$1,204.50").unwrap(), 120450);
    assert_eq!(parse_dollars(".99").unwrap(), 99);
    assert!(parse_dollars("12.345").is_err());
    assert!(parse_dollars("abc").is_err());
    assert!(parse_dollars("").is_err());
    assert!(parse_dollars("-5").is_err());
    assert!(parse_dollars("-0.50").is_err());
    assert!(parse_dollars("$-.99").is_err());
    assert!(parse_dollars("1.-5").is_err());
    assert!(parse_dollars("+3").is_err());
}

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a much longer name", 10), "a much ...");
}

#[test]
fn test_format_amount() {
    assert!(format_amount(1234, TransactionKind::Spend).contains("$12.34"));
    assert!(format_amount(5, TransactionKind::Earn).contains("+$0.05"));
}

// ========== Notify / Consume Tests ==========

#[tokio::test]
async fn test_cmd_notify_records_and_consumes() {
    let db = setup_test_db();
    let payload = venmo_payload(1, "You paid Tom Smith $12.34");

    commands::cmd_notify(&db, &payload, true).await.unwrap();

    assert!(db.list_automatics(false).unwrap().is_empty());
    let txs = db.list_ledger_transactions(10).unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].amount_cents, 1234);
    assert_eq!(txs[0].name, "Tom Smith");
}

#[tokio::test]
async fn test_cmd_notify_deferred() {
    let db = setup_test_db();
    let payload = venmo_payload(2, "Jane Doe paid you $20.00");

    commands::cmd_notify(&db, &payload, false).await.unwrap();
    // Redelivery is a no-op
    commands::cmd_notify(&db, &payload, false).await.unwrap();

    let waiting = db.list_automatics(false).unwrap();
    assert_eq!(waiting.len(), 1);
    assert_eq!(waiting[0].kind, TransactionKind::Earn);
    assert!(db.list_ledger_transactions(10).unwrap().is_empty());

    commands::cmd_consume(&db).await.unwrap();
    assert!(db.list_automatics(false).unwrap().is_empty());
    assert_eq!(db.list_ledger_transactions(10).unwrap().len(), 1);
}

#[tokio::test]
async fn test_cmd_notify_no_match() {
    let db = setup_test_db();
    let payload = venmo_payload(3, "Your weekly summary is ready");

    commands::cmd_notify(&db, &payload, true).await.unwrap();
    assert!(db.list_automatics(true).unwrap().is_empty());
}

#[test]
fn test_build_payload_defaults_key() {
    let payload = venmo_payload(9, "x");
    assert_eq!(payload.meta.key, "0|com.venmo|9|null|0");
    assert_eq!(payload.meta.post_time_epoch_millis, 1_700_000_000_000);
}

// ========== Repeat Command Tests ==========

#[test]
fn test_cmd_repeats_add_and_list() {
    let db = setup_test_db();
    commands::cmd_repeats_add(&db, repeat_args("Rent", "1500", "monthly")).unwrap();

    let rules = db.list_repeat_rules(false).unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].template.amount_cents, 150_000);
    assert_eq!(rules[0].template.categories, vec![3, 5]);
    assert_eq!(rules[0].repeat_type, RepeatType::MonthlyOnDay);

    assert!(commands::cmd_repeats_list(&db, true).is_ok());
}

#[test]
fn test_cmd_repeats_add_rejects_bad_input() {
    let db = setup_test_db();
    assert!(commands::cmd_repeats_add(&db, repeat_args("Rent", "1500", "hourly")).is_err());
    assert!(commands::cmd_repeats_add(&db, repeat_args("Rent", "lots", "monthly")).is_err());
    assert!(db.list_repeat_rules(true).unwrap().is_empty());
}

#[tokio::test]
async fn test_cmd_repeats_run_for_date() {
    let db = setup_test_db();
    commands::cmd_repeats_add(&db, repeat_args("Rent", "1500", "monthly")).unwrap();

    commands::cmd_repeats_run(&db, Some("2024-02-15")).await.unwrap();
    commands::cmd_repeats_run(&db, Some("2024-02-15")).await.unwrap();
    commands::cmd_repeats_run(&db, Some("2024-02-16")).await.unwrap();

    assert_eq!(db.list_ledger_transactions(10).unwrap().len(), 1);
    assert!(commands::cmd_repeats_run(&db, Some("15/02/2024")).await.is_err());
}

#[test]
fn test_cmd_repeats_lifecycle() {
    let db = setup_test_db();
    commands::cmd_repeats_add(&db, repeat_args("Gym", "29.99", "weekly")).unwrap();
    let id = db.list_repeat_rules(true).unwrap()[0].id;

    commands::cmd_repeats_set_type(&db, id, "daily").unwrap();
    commands::cmd_repeats_set_active(&db, id, false).unwrap();
    assert!(db.list_active_repeat_rules().unwrap().is_empty());

    commands::cmd_repeats_set_active(&db, id, true).unwrap();
    commands::cmd_repeats_archive(&db, id).unwrap();
    assert!(db.list_repeat_rules(false).unwrap().is_empty());

    assert!(commands::cmd_repeats_archive(&db, 999).is_err());
}

// ========== Watch Command Tests ==========

#[test]
fn test_cmd_watches_add_list_disable() {
    let db = setup_test_db();
    commands::cmd_watches_add(
        &db,
        "Bank",
        vec!["com.example.bank".to_string()],
        vec![r"Card used for \$".to_string()],
        "spend",
    )
    .unwrap();
    assert!(commands::cmd_watches_list(&db).is_ok());

    let id = db.list_watches(true).unwrap()[0].id;
    commands::cmd_watches_set_enabled(&db, id, false).unwrap();
    assert!(db.list_watches(true).unwrap().is_empty());
}

#[test]
fn test_cmd_watches_add_rejects_bad_regex() {
    let db = setup_test_db();
    let result = commands::cmd_watches_add(
        &db,
        "Broken",
        vec!["com.example.bank".to_string()],
        vec!["(unclosed".to_string()],
        "spend",
    );
    assert!(result.is_err());
}

#[test]
fn test_seed_watches_from_config() {
    let db = setup_test_db();
    let config = autoledger_core::config::parse_config(
        r#"
[[watches]]
name = "Bank"
act_on_package_names = ["com.example.bank"]
match_regexes = ["Card used"]
kind = "spend"
"#,
    )
    .unwrap();

    assert_eq!(commands::seed_watches(&db, &config).unwrap(), 1);
    assert_eq!(commands::seed_watches(&db, &config).unwrap(), 0);
    assert_eq!(
        commands::seed_watches(&db, &AppConfig::default()).unwrap(),
        0
    );
}

// ========== Listing / Init / Status Tests ==========

#[test]
fn test_cmd_listings_on_empty_db() {
    let db = setup_test_db();
    assert!(commands::cmd_transactions_list(&db, 20, false).is_ok());
    assert!(commands::cmd_transactions_list(&db, 20, true).is_ok());
    assert!(commands::cmd_automatics_list(&db, true, false).is_ok());
    assert!(commands::cmd_automatics_list(&db, false, true).is_ok());
    assert!(commands::cmd_repeats_list(&db, false).is_ok());
    assert!(commands::cmd_watches_list(&db).is_ok());
}

#[test]
fn test_cmd_init_and_status() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("autoledger.db");
    let config_path = dir.path().join("autoledger.toml");
    std::fs::write(
        &config_path,
        r#"
[scheduler]
repeat_interval_hours = 0

[[watches]]
name = "Bank"
act_on_package_names = ["com.example.bank"]
match_regexes = ["Card used"]
kind = "spend"
"#,
    )
    .unwrap();

    commands::cmd_init(&db_path, Some(config_path.as_path()), true).unwrap();
    assert!(db_path.exists());

    let db = commands::open_db(&db_path, true).unwrap();
    assert_eq!(db.list_watches(false).unwrap().len(), 1);

    assert!(commands::cmd_status(&db_path, Some(config_path.as_path()), true).is_ok());
}
