//! Autoledger Core Library
//!
//! Shared functionality for the Autoledger personal finance tool:
//! - Notification matchers and ignore rules for payment apps
//! - Extraction of payment candidates from posted notifications
//! - Deduplicated storage of automatic records
//! - Materialization of automatic records and recurring rules into the ledger
//! - Background job runner and tokio scheduler
//! - Database access and migrations

pub mod automatic;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod ignore;
pub mod jobs;
pub mod matchers;
pub mod models;
pub mod pipeline;
pub mod repeat;
pub mod scheduler;
pub mod store;

/// Test utilities: recording job queue and failure-injecting store
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use automatic::{AutomaticMaterializer, AutomaticStore, MaterializeSummary, RecordOutcome};
pub use config::{AppConfig, SchedulerConfig};
pub use db::{Database, DbStats};
pub use error::{Error, Result};
pub use extract::ExtractionManager;
pub use jobs::{JobKind, JobOutcome, JobQueue, JobRunner};
pub use matchers::Matcher;
pub use models::*;
pub use pipeline::NotificationPipeline;
pub use repeat::{RepeatMaterializer, RepeatSummary};
pub use scheduler::Scheduler;
pub use store::{InsertResult, LedgerStore};
