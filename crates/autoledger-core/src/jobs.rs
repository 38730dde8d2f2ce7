//! Background job kinds and the runner that executes them
//!
//! Each job runs in its own tokio task. A panic inside the job surfaces as
//! a `JoinError` and is reported as a failure, so nothing escapes the job
//! boundary. Cancellation (an aborted task) is reported separately and is
//! not a failure.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;
use futures::FutureExt;
use tokio::task::JoinError;
use tracing::{error, info, warn};

use crate::automatic::AutomaticMaterializer;
use crate::error::{Error, Result};
use crate::repeat::RepeatMaterializer;
use crate::store::LedgerStore;

/// The background jobs the system knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// One-shot: consume unused automatic records
    ConsumeAutomatics,
    /// One-shot: materialize repeat rules due today
    CreateRepeats,
    /// Recurring: the same work as `CreateRepeats` on an interval
    PeriodicRepeats,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConsumeAutomatics => "consume_automatics",
            Self::CreateRepeats => "create_repeats",
            Self::PeriodicRepeats => "periodic_repeats",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a job run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    Failed(String),
    Cancelled,
}

/// Port for scheduling background work
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Schedule a run of `kind`. Enqueuing a kind that is already running
    /// coalesces into a single follow-up run once the current one ends.
    async fn enqueue(&self, kind: JobKind) -> Result<()>;

    /// Cancel pending or running work of `kind`
    async fn cancel(&self, kind: JobKind) -> Result<()>;
}

/// Executes job bodies against a store
#[derive(Clone)]
pub struct JobRunner {
    store: Arc<dyn LedgerStore>,
}

impl JobRunner {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Run the job body in the current task
    ///
    /// Item-level failures are logged by the materializers; only a failure
    /// to start the pass comes back as an error.
    pub async fn run_once(&self, kind: JobKind) -> Result<()> {
        match kind {
            JobKind::ConsumeAutomatics => {
                AutomaticMaterializer::new(Arc::clone(&self.store))
                    .materialize_unconsumed()
                    .await?;
            }
            JobKind::CreateRepeats | JobKind::PeriodicRepeats => {
                RepeatMaterializer::new(Arc::clone(&self.store))
                    .materialize_due_repeats(Local::now().date_naive())
                    .await?;
            }
        }
        Ok(())
    }

    /// Run the job in its own task and report how it ended
    pub async fn run(&self, kind: JobKind) -> JobOutcome {
        let runner = self.clone();
        let handle = tokio::spawn(async move { runner.run_once(kind).await });
        let outcome = outcome_from_join(handle.await);
        log_outcome(kind, &outcome);
        outcome
    }
}

/// Map a joined job task onto its outcome
pub fn outcome_from_join(joined: std::result::Result<Result<()>, JoinError>) -> JobOutcome {
    match joined {
        Ok(Ok(())) => JobOutcome::Success,
        Ok(Err(e)) => JobOutcome::Failed(e.to_string()),
        Err(e) if e.is_cancelled() => JobOutcome::Cancelled,
        Err(e) => {
            let reason = match e.try_into_panic() {
                Ok(payload) => panic_message(payload.as_ref()),
                Err(e) => e.to_string(),
            };
            JobOutcome::Failed(format!("job panicked: {}", reason))
        }
    }
}

/// Run one item of a pass, turning a panic inside it into an error
///
/// The materializers wrap each rule or record in this so one bad item is
/// counted as failed while the rest of the pass carries on.
pub(crate) async fn contain_panic<T, F>(work: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match AssertUnwindSafe(work).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(Error::Job(format!(
            "panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub(crate) fn log_outcome(kind: JobKind, outcome: &JobOutcome) {
    match outcome {
        JobOutcome::Success => info!(job = %kind, "Job finished"),
        JobOutcome::Failed(reason) => error!(job = %kind, "Job failed: {}", reason),
        JobOutcome::Cancelled => warn!(job = %kind, "Job cancelled"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::test_utils::FlakyStore;

    #[tokio::test]
    async fn test_run_empty_store_succeeds() {
        let db = Database::in_memory().unwrap();
        let runner = JobRunner::new(Arc::new(db));

        assert_eq!(runner.run(JobKind::ConsumeAutomatics).await, JobOutcome::Success);
        assert_eq!(runner.run(JobKind::CreateRepeats).await, JobOutcome::Success);
    }

    #[tokio::test]
    async fn test_listing_failure_is_reported() {
        let db = Database::in_memory().unwrap();
        let store = FlakyStore::new(db).fail_listing();
        let runner = JobRunner::new(Arc::new(store));

        assert!(matches!(
            runner.run(JobKind::ConsumeAutomatics).await,
            JobOutcome::Failed(_)
        ));
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let db = Database::in_memory().unwrap();
        let store = FlakyStore::new(db).panic_on_listing();
        let runner = JobRunner::new(Arc::new(store));

        match runner.run(JobKind::CreateRepeats).await {
            JobOutcome::Failed(reason) => assert!(reason.contains("panicked")),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_contain_panic_turns_panic_into_error() {
        let ok = contain_panic(async { Ok::<_, Error>(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let caught = contain_panic(async {
            if true {
                panic!("rule exploded");
            }
            Ok::<(), Error>(())
        })
        .await;
        match caught {
            Err(Error::Job(reason)) => assert!(reason.contains("rule exploded")),
            other => panic!("expected job error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_aborted_task_is_cancelled() {
        let handle = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            Ok::<(), crate::error::Error>(())
        });
        handle.abort();
        assert_eq!(outcome_from_join(handle.await), JobOutcome::Cancelled);
    }
}
