//! Domain models for Autoledger

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identifier of a user category (owned by the ledger, opaque to the core)
pub type CategoryId = i64;

/// Direction of money movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Spend,
    Earn,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spend => "spend",
            Self::Earn => "earn",
        }
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "spend" | "expense" => Ok(Self::Spend),
            "earn" | "income" => Ok(Self::Earn),
            _ => Err(format!("Unknown transaction kind: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Text fields pulled from a notification's extras bundle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationFields {
    pub title: String,
    pub big_title: String,
    pub text: String,
    pub big_text: String,
}

/// Identity and timing of a posted notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMeta {
    pub id: i32,
    pub key: String,
    pub group: String,
    pub package_name: String,
    pub post_time_epoch_millis: i64,
}

/// A notification as delivered by the host's notification listener
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub meta: NotificationMeta,
    pub fields: NotificationFields,
}

/// A payment recognized in a notification, before it is persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentCandidate {
    pub title: String,
    /// The notification text (text or big text) that matched
    pub raw_matched_text: String,
    pub amount_cents: i64,
    pub direction: TransactionKind,
}

/// The tuple that identifies a recorded notification
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub notification_id: i32,
    pub key: String,
    pub group: String,
    pub package_name: String,
    pub match_text: String,
}

impl DedupKey {
    /// Stable SHA-256 over all tuple fields, used as the unique column
    pub fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.notification_id.to_be_bytes());
        // Length prefixes keep ("ab", "c") distinct from ("a", "bc")
        for part in [&self.key, &self.group, &self.package_name, &self.match_text] {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

/// A persisted candidate payment awaiting conversion into a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomaticRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub categories: Vec<CategoryId>,
    pub notification: NotificationMeta,
    pub match_text: String,
    pub amount_cents: i64,
    pub title: String,
    pub kind: TransactionKind,
    /// Set once a ledger transaction has been written for this record
    pub used: bool,
    // Reserved for richer parsers
    pub account: Option<String>,
    pub date: Option<String>,
    pub merchant: Option<String>,
    pub description: Option<String>,
}

impl AutomaticRecord {
    /// Build a fresh, unconsumed record from an extraction result
    pub fn from_candidate(
        candidate: &PaymentCandidate,
        notification: &NotificationMeta,
        created_at: DateTime<Utc>,
    ) -> Self {
        let key = DedupKey {
            notification_id: notification.id,
            key: notification.key.clone(),
            group: notification.group.clone(),
            package_name: notification.package_name.clone(),
            match_text: candidate.raw_matched_text.clone(),
        };
        Self {
            id: generate_record_id(&key, created_at),
            created_at,
            categories: Vec::new(),
            notification: notification.clone(),
            match_text: candidate.raw_matched_text.clone(),
            amount_cents: candidate.amount_cents,
            title: candidate.title.clone(),
            kind: candidate.direction,
            used: false,
            account: None,
            date: None,
            merchant: None,
            description: None,
        }
    }

    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            notification_id: self.notification.id,
            key: self.notification.key.clone(),
            group: self.notification.group.clone(),
            package_name: self.notification.package_name.clone(),
            match_text: self.match_text.clone(),
        }
    }
}

/// Record ids are derived from the dedup tuple plus creation instant
fn generate_record_id(key: &DedupKey, created_at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.hash().as_bytes());
    hasher.update(
        created_at
            .timestamp_nanos_opt()
            .unwrap_or_else(|| created_at.timestamp_micros())
            .to_be_bytes(),
    );
    hex::encode(&hasher.finalize()[..16])
}

/// How often a repeat rule fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatType {
    Daily,
    /// Same weekday as the rule's first date
    WeeklyOnDay,
    /// Same day of month as the rule's first date
    MonthlyOnDay,
    /// Same day of year as the rule's first date
    YearlyOnDay,
}

impl RepeatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::WeeklyOnDay => "weekly_on_day",
            Self::MonthlyOnDay => "monthly_on_day",
            Self::YearlyOnDay => "yearly_on_day",
        }
    }
}

impl std::str::FromStr for RepeatType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" | "weekly_on_day" => Ok(Self::WeeklyOnDay),
            "monthly" | "monthly_on_day" => Ok(Self::MonthlyOnDay),
            "yearly" | "yearly_on_day" => Ok(Self::YearlyOnDay),
            _ => Err(format!("Unknown repeat type: {}", s)),
        }
    }
}

impl std::fmt::Display for RepeatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The transaction a repeat rule stamps out each period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionTemplate {
    pub name: String,
    pub note: String,
    pub amount_cents: i64,
    pub kind: TransactionKind,
    pub categories: Vec<CategoryId>,
    pub source_id: Option<i64>,
}

/// A user-defined recurring transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatRule {
    pub id: i64,
    pub template: TransactionTemplate,
    pub repeat_type: RepeatType,
    /// Anchors the weekday / day-of-month / day-of-year pattern
    pub first_date: NaiveDate,
    pub active: bool,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}

/// A repeat rule before DB insertion
#[derive(Debug, Clone)]
pub struct NewRepeatRule {
    pub template: TransactionTemplate,
    pub repeat_type: RepeatType,
    pub first_date: NaiveDate,
}

/// A transaction in the user's ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: i64,
    pub name: String,
    pub note: String,
    pub kind: TransactionKind,
    pub amount_cents: i64,
    /// Local date-time the transaction applies to
    pub date: NaiveDateTime,
    pub categories: Vec<CategoryId>,
    pub automatic_id: Option<String>,
    pub automatic_created_at: Option<DateTime<Utc>>,
    pub repeat_id: Option<i64>,
    pub source_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// A ledger transaction before DB insertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerTransaction {
    pub name: String,
    pub note: String,
    pub kind: TransactionKind,
    pub amount_cents: i64,
    pub date: NaiveDateTime,
    pub categories: Vec<CategoryId>,
    pub automatic_id: Option<String>,
    pub automatic_created_at: Option<DateTime<Utc>>,
    pub repeat_id: Option<i64>,
    pub source_id: Option<i64>,
}

/// A user-configured notification watch, turned into a dynamic matcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationWatch {
    pub id: i64,
    pub name: String,
    pub act_on_package_names: Vec<String>,
    pub match_regexes: Vec<String>,
    pub kind: TransactionKind,
    pub enabled: bool,
}

/// A notification watch before DB insertion (also the config file shape)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotificationWatch {
    pub name: String,
    pub act_on_package_names: Vec<String>,
    pub match_regexes: Vec<String>,
    pub kind: TransactionKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> NotificationMeta {
        NotificationMeta {
            id: 7,
            key: "0|com.venmo|7|null|10123".to_string(),
            group: "payments".to_string(),
            package_name: "com.venmo".to_string(),
            post_time_epoch_millis: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("spend".parse::<TransactionKind>().unwrap(), TransactionKind::Spend);
        assert_eq!("Income".parse::<TransactionKind>().unwrap(), TransactionKind::Earn);
        assert!("refund".parse::<TransactionKind>().is_err());
    }

    #[test]
    fn test_repeat_type_parse() {
        assert_eq!("weekly".parse::<RepeatType>().unwrap(), RepeatType::WeeklyOnDay);
        assert_eq!(
            RepeatType::MonthlyOnDay.as_str().parse::<RepeatType>().unwrap(),
            RepeatType::MonthlyOnDay
        );
        assert!("hourly".parse::<RepeatType>().is_err());
    }

    #[test]
    fn test_dedup_hash_is_stable_and_field_sensitive() {
        let key = DedupKey {
            notification_id: 1,
            key: "k".to_string(),
            group: "g".to_string(),
            package_name: "com.venmo".to_string(),
            match_text: "You paid Tom $1.00".to_string(),
        };
        assert_eq!(key.hash(), key.clone().hash());

        let mut other = key.clone();
        other.match_text = "You paid Tom $1.01".to_string();
        assert_ne!(key.hash(), other.hash());

        // Shifting a character between fields must not collide
        let a = DedupKey {
            key: "ab".to_string(),
            group: "c".to_string(),
            ..key.clone()
        };
        let b = DedupKey {
            key: "a".to_string(),
            group: "bc".to_string(),
            ..key
        };
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_record_from_candidate() {
        let candidate = PaymentCandidate {
            title: "Tom Smith".to_string(),
            raw_matched_text: "You paid Tom Smith $12.34".to_string(),
            amount_cents: 1234,
            direction: TransactionKind::Spend,
        };
        let record = AutomaticRecord::from_candidate(&candidate, &meta(), Utc::now());

        assert!(!record.used);
        assert!(record.categories.is_empty());
        assert_eq!(record.amount_cents, 1234);
        assert_eq!(record.match_text, candidate.raw_matched_text);
        assert_eq!(record.id.len(), 32);
        assert_eq!(record.dedup_key().package_name, "com.venmo");
    }
}
