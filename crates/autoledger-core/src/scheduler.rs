//! Tokio-backed job queue
//!
//! One-shot jobs run once per enqueue; enqueuing a kind that is already in
//! flight folds into a single follow-up run. The periodic repeat job ticks
//! on the configured interval until cancelled, skipping the immediate first
//! tick (startup catch-up is `CreateRepeats`' job).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::error::{Error, Result};
use crate::jobs::{log_outcome, outcome_from_join, JobKind, JobOutcome, JobQueue, JobRunner};
use crate::store::LedgerStore;

pub type OutcomeReceiver = mpsc::UnboundedReceiver<(JobKind, JobOutcome)>;

struct Slot {
    generation: u64,
    driver: AbortHandle,
    current: Option<AbortHandle>,
    rerun: bool,
}

struct Shared {
    runner: JobRunner,
    slots: Mutex<HashMap<JobKind, Slot>>,
    next_generation: AtomicU64,
    outcomes: Option<mpsc::UnboundedSender<(JobKind, JobOutcome)>>,
}

impl Shared {
    fn slots(&self) -> Result<MutexGuard<'_, HashMap<JobKind, Slot>>> {
        self.slots
            .lock()
            .map_err(|_| Error::Job("scheduler state poisoned".to_string()))
    }

    fn report(&self, kind: JobKind, outcome: JobOutcome) {
        log_outcome(kind, &outcome);
        if let Some(tx) = &self.outcomes {
            // Receiver gone just means nobody is listening
            let _ = tx.send((kind, outcome));
        }
    }

    fn set_current(&self, kind: JobKind, generation: u64, handle: AbortHandle) {
        if let Ok(mut slots) = self.slots() {
            match slots.get_mut(&kind) {
                Some(slot) if slot.generation == generation => slot.current = Some(handle),
                // Cancelled while starting
                _ => handle.abort(),
            }
        }
    }

    /// After a one-shot run: claim the pending rerun, or release the slot
    fn rerun_or_release(&self, kind: JobKind, generation: u64) -> bool {
        let Ok(mut slots) = self.slots() else {
            return false;
        };
        match slots.get_mut(&kind) {
            Some(slot) if slot.generation == generation => {
                if slot.rerun {
                    slot.rerun = false;
                    slot.current = None;
                    true
                } else {
                    slots.remove(&kind);
                    false
                }
            }
            _ => false,
        }
    }

    /// Run one job body in its own task so a panic stays inside it
    async fn run_contained(self: &Arc<Self>, kind: JobKind, generation: u64) -> JobOutcome {
        let runner = self.runner.clone();
        let handle = tokio::spawn(async move { runner.run_once(kind).await });
        self.set_current(kind, generation, handle.abort_handle());
        outcome_from_join(handle.await)
    }
}

/// Runs background jobs on the tokio runtime
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(store: Arc<dyn LedgerStore>, config: SchedulerConfig) -> Self {
        Self::build(store, config, None)
    }

    /// Like [`new`](Self::new), also reporting every finished run
    pub fn with_outcomes(
        store: Arc<dyn LedgerStore>,
        config: SchedulerConfig,
    ) -> (Self, OutcomeReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::build(store, config, Some(tx)), rx)
    }

    fn build(
        store: Arc<dyn LedgerStore>,
        config: SchedulerConfig,
        outcomes: Option<mpsc::UnboundedSender<(JobKind, JobOutcome)>>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                runner: JobRunner::new(store),
                slots: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
                outcomes,
            }),
            config,
        }
    }

    /// Startup enqueues: leftover consumption, repeat catch-up, periodic job
    pub async fn start(&self) -> Result<()> {
        if self.config.consume_on_start {
            self.enqueue(JobKind::ConsumeAutomatics).await?;
        }
        if self.config.catch_up_on_start {
            self.enqueue(JobKind::CreateRepeats).await?;
        }
        if self.config.repeat_interval.is_some() {
            self.enqueue(JobKind::PeriodicRepeats).await?;
        } else {
            info!("Periodic repeats disabled");
        }
        Ok(())
    }

    /// Whether work of `kind` is in flight
    pub fn is_active(&self, kind: JobKind) -> bool {
        self.shared
            .slots()
            .map(|slots| slots.contains_key(&kind))
            .unwrap_or(false)
    }

    /// Cancel everything
    pub async fn shutdown(&self) -> Result<()> {
        for kind in [
            JobKind::PeriodicRepeats,
            JobKind::CreateRepeats,
            JobKind::ConsumeAutomatics,
        ] {
            self.cancel(kind).await?;
        }
        Ok(())
    }

    fn spawn_one_shot(&self, kind: JobKind, generation: u64) -> AbortHandle {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            loop {
                let outcome = shared.run_contained(kind, generation).await;
                shared.report(kind, outcome);
                if !shared.rerun_or_release(kind, generation) {
                    break;
                }
                debug!(job = %kind, "Running queued follow-up");
            }
        })
        .abort_handle()
    }

    fn spawn_periodic(&self, generation: u64, period: Duration) -> AbortHandle {
        let shared = Arc::clone(&self.shared);
        let kind = JobKind::PeriodicRepeats;
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            // Skip the first immediate tick
            ticker.tick().await;

            loop {
                ticker.tick().await;
                info!("Running periodic repeat materialization...");
                let outcome = shared.run_contained(kind, generation).await;
                shared.report(kind, outcome);
            }
        })
        .abort_handle()
    }
}

#[async_trait]
impl JobQueue for Scheduler {
    async fn enqueue(&self, kind: JobKind) -> Result<()> {
        let mut slots = self.shared.slots()?;

        if let Some(slot) = slots.get_mut(&kind) {
            if kind != JobKind::PeriodicRepeats {
                slot.rerun = true;
            }
            debug!(job = %kind, "Job already active");
            return Ok(());
        }

        let generation = self.shared.next_generation.fetch_add(1, Ordering::Relaxed);
        let driver = match kind {
            JobKind::PeriodicRepeats => {
                let Some(period) = self.config.repeat_interval else {
                    warn!("Periodic repeats requested but no interval is configured");
                    return Ok(());
                };
                info!(
                    "Starting periodic repeats: every {} hours",
                    period.as_secs() / 3600
                );
                self.spawn_periodic(generation, period)
            }
            _ => self.spawn_one_shot(kind, generation),
        };

        slots.insert(
            kind,
            Slot {
                generation,
                driver,
                current: None,
                rerun: false,
            },
        );
        debug!(job = %kind, "Job enqueued");
        Ok(())
    }

    async fn cancel(&self, kind: JobKind) -> Result<()> {
        let removed = self.shared.slots()?.remove(&kind);
        if let Some(slot) = removed {
            slot.driver.abort();
            if let Some(current) = slot.current {
                current.abort();
            }
            self.shared.report(kind, JobOutcome::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{
        AutomaticRecord, NotificationMeta, PaymentCandidate, TransactionKind,
    };
    use crate::test_utils::FlakyStore;
    use chrono::Utc;

    fn quiet_config() -> SchedulerConfig {
        SchedulerConfig {
            repeat_interval: None,
            catch_up_on_start: false,
            consume_on_start: false,
        }
    }

    fn seed_record(db: &Database, id: i32) -> AutomaticRecord {
        let record = AutomaticRecord::from_candidate(
            &PaymentCandidate {
                title: "Coffee".to_string(),
                raw_matched_text: format!("$4.{:02} with Visa", id),
                amount_cents: 400 + id as i64,
                direction: TransactionKind::Spend,
            },
            &NotificationMeta {
                id,
                key: format!("key-{}", id),
                group: String::new(),
                package_name: "com.google.android.apps.walletnfcrel".to_string(),
                post_time_epoch_millis: 1_700_000_000_000,
            },
            Utc::now(),
        );
        db.upsert_automatic(&record).unwrap();
        record
    }

    #[tokio::test]
    async fn test_enqueue_runs_job() {
        let db = Database::in_memory().unwrap();
        let record = seed_record(&db, 1);
        let (scheduler, mut outcomes) = Scheduler::with_outcomes(Arc::new(db.clone()), quiet_config());

        scheduler.enqueue(JobKind::ConsumeAutomatics).await.unwrap();
        let (kind, outcome) = outcomes.recv().await.unwrap();

        assert_eq!(kind, JobKind::ConsumeAutomatics);
        assert_eq!(outcome, JobOutcome::Success);
        assert!(db.get_automatic(&record.id).unwrap().unwrap().used);
    }

    #[tokio::test]
    async fn test_start_runs_catch_up() {
        let db = Database::in_memory().unwrap();
        seed_record(&db, 2);
        let config = SchedulerConfig {
            consume_on_start: true,
            catch_up_on_start: true,
            repeat_interval: None,
        };
        let (scheduler, mut outcomes) = Scheduler::with_outcomes(Arc::new(db.clone()), config);

        scheduler.start().await.unwrap();
        let mut seen = vec![outcomes.recv().await.unwrap().0, outcomes.recv().await.unwrap().0];
        seen.sort_by_key(|k| k.as_str());

        assert_eq!(seen, vec![JobKind::ConsumeAutomatics, JobKind::CreateRepeats]);
        assert!(!scheduler.is_active(JobKind::PeriodicRepeats));
        assert_eq!(db.list_ledger_transactions(10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_reported_not_propagated() {
        let db = Database::in_memory().unwrap();
        let store = FlakyStore::new(db).panic_on_listing();
        let (scheduler, mut outcomes) = Scheduler::with_outcomes(Arc::new(store), quiet_config());

        scheduler.enqueue(JobKind::CreateRepeats).await.unwrap();
        let (_, outcome) = outcomes.recv().await.unwrap();
        assert!(matches!(outcome, JobOutcome::Failed(_)));

        // The scheduler keeps working after a failed job
        scheduler.enqueue(JobKind::CreateRepeats).await.unwrap();
        let (_, outcome) = outcomes.recv().await.unwrap();
        assert!(matches!(outcome, JobOutcome::Failed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_skips_first_tick() {
        let db = Database::in_memory().unwrap();
        let config = SchedulerConfig {
            repeat_interval: Some(Duration::from_secs(3600)),
            ..quiet_config()
        };
        let (scheduler, mut outcomes) = Scheduler::with_outcomes(Arc::new(db), config);

        scheduler.enqueue(JobKind::PeriodicRepeats).await.unwrap();
        assert!(scheduler.is_active(JobKind::PeriodicRepeats));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(outcomes.try_recv().is_err());

        let (kind, outcome) = outcomes.recv().await.unwrap();
        assert_eq!(kind, JobKind::PeriodicRepeats);
        assert_eq!(outcome, JobOutcome::Success);

        scheduler.cancel(JobKind::PeriodicRepeats).await.unwrap();
        assert_eq!(outcomes.recv().await.unwrap().1, JobOutcome::Cancelled);
        assert!(!scheduler.is_active(JobKind::PeriodicRepeats));
    }

    #[tokio::test]
    async fn test_cancel_unknown_kind_is_noop() {
        let db = Database::in_memory().unwrap();
        let scheduler = Scheduler::new(Arc::new(db), quiet_config());
        scheduler.cancel(JobKind::ConsumeAutomatics).await.unwrap();
        scheduler.shutdown().await.unwrap();
    }
}
