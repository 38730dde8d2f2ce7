//! Extraction manager: notification payload in, payment candidate out
//!
//! Order of operations:
//! 1. Ignore filter (an ignored notification never reaches a matcher)
//! 2. Hardcoded matchers, in declaration order
//! 3. One user-defined matcher per enabled watch that acts on the package,
//!    in watch id order
//!
//! The first matcher that both handles the package and extracts a payment
//! wins. Several matchers can claim one package (every Venmo matcher does);
//! ordering is the only disambiguation.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::ignore::should_ignore;
use crate::matchers::{Matcher, UserMatcher};
use crate::models::{NotificationFields, NotificationWatch, PaymentCandidate};
use crate::store::LedgerStore;

/// Build the matcher list for one package
pub fn matchers_for_package(package_name: &str, watches: &[NotificationWatch]) -> Vec<Matcher> {
    let mut matchers = Matcher::builtin();
    matchers.extend(
        watches
            .iter()
            .filter(|w| w.enabled && w.act_on_package_names.iter().any(|p| p == package_name))
            .map(|w| Matcher::UserDefined(UserMatcher::from_watch(w))),
    );
    matchers
}

/// Run the ignore filter and then the matchers over one notification
///
/// Pure: the result depends only on the arguments.
pub fn extract_with_matchers(
    package_name: &str,
    fields: &NotificationFields,
    matchers: &[Matcher],
) -> Option<PaymentCandidate> {
    if should_ignore(
        package_name,
        &fields.title,
        &fields.big_title,
        &fields.text,
        &fields.big_text,
    ) {
        return None;
    }

    let candidate = matchers
        .iter()
        .filter(|m| m.can_handle(package_name))
        .find_map(|m| {
            let found = m.extract(fields);
            if found.is_some() {
                debug!(package = package_name, matcher = m.name(), "Payment extracted");
            }
            found
        });

    if candidate.is_none() {
        debug!(package = package_name, "No matcher produced a payment");
    }
    candidate
}

/// Extraction backed by the persisted watch configuration
#[derive(Clone)]
pub struct ExtractionManager {
    store: Arc<dyn LedgerStore>,
}

impl ExtractionManager {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Extract a payment from a notification, or `None` when nothing applies
    ///
    /// Only errors when the watch configuration cannot be read.
    pub async fn extract_payment(
        &self,
        package_name: &str,
        fields: &NotificationFields,
    ) -> Result<Option<PaymentCandidate>> {
        let watches = self.store.list_enabled_watches().await?;
        let matchers = matchers_for_package(package_name, &watches);
        Ok(extract_with_matchers(package_name, fields, &matchers))
    }
}
