//! Notification intake: extraction followed by deduplicated recording

use std::sync::Arc;

use tracing::{debug, error};

use crate::automatic::{AutomaticStore, RecordOutcome};
use crate::error::Result;
use crate::extract::ExtractionManager;
use crate::jobs::JobQueue;
use crate::models::NotificationPayload;
use crate::store::LedgerStore;

/// Entry point for posted notifications
pub struct NotificationPipeline {
    extractor: ExtractionManager,
    automatics: AutomaticStore,
}

impl NotificationPipeline {
    pub fn new(store: Arc<dyn LedgerStore>, jobs: Arc<dyn JobQueue>) -> Self {
        Self {
            extractor: ExtractionManager::new(Arc::clone(&store)),
            automatics: AutomaticStore::new(store, jobs),
        }
    }

    /// Extract and record one notification
    ///
    /// `Ok(None)` means no matcher produced a payment.
    pub async fn process(&self, payload: &NotificationPayload) -> Result<Option<RecordOutcome>> {
        let package = &payload.meta.package_name;
        let Some(candidate) = self.extractor.extract_payment(package, &payload.fields).await?
        else {
            debug!(package = %package, id = payload.meta.id, "No payment in notification");
            return Ok(None);
        };

        let outcome = self
            .automatics
            .record_notification(&candidate, &payload.meta)
            .await?;
        Ok(Some(outcome))
    }

    /// Like [`process`](Self::process), but failures are logged and dropped
    ///
    /// The notification source has nobody to report an error to.
    pub async fn on_notification(&self, payload: &NotificationPayload) -> Option<RecordOutcome> {
        match self.process(payload).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    package = %payload.meta.package_name,
                    id = payload.meta.id,
                    "Failed to process notification: {}",
                    e
                );
                None
            }
        }
    }
}
