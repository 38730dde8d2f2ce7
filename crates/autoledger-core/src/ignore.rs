//! Ignore filter for notifications that never carry a payment
//!
//! Runs before any matcher. A rule matches when the package is equal and
//! either its title pattern matches the title or big title, or its text
//! pattern matches the text or big text.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::matchers::{GOOGLE_WALLET_PACKAGE, VENMO_PACKAGE};

const SYSTEM_UI_PACKAGE: &str = "com.android.systemui";
const GMAIL_PACKAGE: &str = "com.google.android.gm";
const OUTLOOK_PACKAGE: &str = "com.microsoft.office.outlook";

/// A per-package deny rule
#[derive(Debug)]
pub struct IgnoreRule {
    pub package_name: &'static str,
    pub title: Option<Regex>,
    pub text: Option<Regex>,
}

impl IgnoreRule {
    fn new(package_name: &'static str, title: Option<&str>, text: Option<&str>) -> Self {
        Self {
            package_name,
            title: title.map(|p| Regex::new(p).expect("valid regex")),
            text: text.map(|p| Regex::new(p).expect("valid regex")),
        }
    }

    pub fn matches(
        &self,
        package_name: &str,
        title: &str,
        big_title: &str,
        text: &str,
        big_text: &str,
    ) -> bool {
        if self.package_name != package_name {
            return false;
        }

        let title_hit = self
            .title
            .as_ref()
            .is_some_and(|re| re.is_match(title) || re.is_match(big_title));
        let text_hit = self
            .text
            .as_ref()
            .is_some_and(|re| re.is_match(text) || re.is_match(big_text));

        title_hit || text_hit
    }
}

/// The fixed rule collection
pub fn ignore_rules() -> &'static [IgnoreRule] {
    static RULES: OnceLock<Vec<IgnoreRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        vec![
            // System chrome: charging, USB, screenshots
            IgnoreRule::new(
                SYSTEM_UI_PACKAGE,
                Some(r"(?i)^(charging|usb|android system|screenshot|battery)"),
                Some(r"(?i)(tap for more options|charging)"),
            ),
            // Mail clients: inbox summaries and promotions quoting prices
            IgnoreRule::new(
                GMAIL_PACKAGE,
                Some(r"(?i)^\d+ new messages?$"),
                Some(r"(?i)(unsubscribe|% off|sale ends)"),
            ),
            IgnoreRule::new(
                OUTLOOK_PACKAGE,
                Some(r"(?i)^\d+ new (messages?|emails?)$"),
                None,
            ),
            // Venmo account chatter and incoming requests (not yet paid)
            IgnoreRule::new(
                VENMO_PACKAGE,
                Some(r"(?i)^(security alert|sign-?in|verification)"),
                Some(r"(?i)(\brequests \$|verification code|new device)"),
            ),
            // Wallet setup and card management
            IgnoreRule::new(
                GOOGLE_WALLET_PACKAGE,
                None,
                Some(r"(?i)(added to (google )?wallet|ready to use|verify your card)"),
            ),
        ]
    })
}

/// Whether the notification should be dropped before matching
pub fn should_ignore(
    package_name: &str,
    title: &str,
    big_title: &str,
    text: &str,
    big_text: &str,
) -> bool {
    let ignored = ignore_rules()
        .iter()
        .any(|rule| rule.matches(package_name, title, big_title, text, big_text));

    if ignored {
        debug!(package = package_name, "Notification ignored by rule");
    }
    ignored
}
