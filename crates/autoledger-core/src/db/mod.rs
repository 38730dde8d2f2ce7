//! Database access layer with connection pooling and schema bootstrap
//!
//! This module is organized by domain:
//! - `automatics` - Automatic records extracted from notifications
//! - `repeats` - Repeat rule definitions and management
//! - `transactions` - Ledger transaction inserts and lookups
//! - `watches` - User-defined notification watches
//! - `store` - `LedgerStore` implementation over the above

use chrono::{DateTime, NaiveDateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::error::{Error, Result};

mod automatics;
mod repeats;
mod store;
mod transactions;
mod watches;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Environment variable for database encryption key
pub const DB_KEY_ENV: &str = "AUTOLEDGER_DB_KEY";

/// Format used for local date-times stored in TEXT columns
pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Derive an encryption key from a passphrase using Argon2
///
/// Uses a fixed application salt so the same passphrase always produces the same key,
/// regardless of database path.
fn derive_key(passphrase: &str) -> Result<String> {
    use argon2::{password_hash::SaltString, Argon2, PasswordHasher};

    // Changing this would invalidate all existing encrypted databases
    const APP_SALT: &[u8; 16] = b"autoledger-salt1";

    let salt = SaltString::encode_b64(APP_SALT)
        .map_err(|e| Error::Encryption(format!("Failed to encode salt: {}", e)))?;

    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("Failed to derive key: {}", e)))?;

    let hash_str = hash
        .hash
        .ok_or_else(|| Error::Encryption("No hash output".to_string()))?;
    Ok(hex::encode(hash_str.as_bytes()))
}

/// Parse a SQLite `CURRENT_TIMESTAMP` string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .map(|dt| dt.and_utc())
        .or_else(|_| DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc)))
        .unwrap_or_else(|_| Utc::now())
}

/// Convert a column-level decode failure into a rusqlite error so it can be
/// raised from inside a row mapper
pub(crate) fn column_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Create a new database connection pool with encryption
    ///
    /// Requires `AUTOLEDGER_DB_KEY` to be set. Use `new_unencrypted()` for
    /// development/testing without encryption.
    pub fn new(path: &str) -> Result<Self> {
        match std::env::var(DB_KEY_ENV).ok() {
            Some(key) => Self::new_with_key(path, Some(&key)),
            None => Err(Error::Encryption(format!(
                "Database encryption required. Set {} environment variable with your passphrase, \
                or use --no-encrypt for unencrypted databases (not recommended for production).",
                DB_KEY_ENV
            ))),
        }
    }

    /// Create a new unencrypted database connection pool
    pub fn new_unencrypted(path: &str) -> Result<Self> {
        Self::new_with_key(path, None)
    }

    /// Create a new database with an explicit encryption key
    pub fn new_with_key(path: &str, passphrase: Option<&str>) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);

        let pool = if let Some(pass) = passphrase {
            let key = derive_key(pass)?;
            let key_pragma = format!("PRAGMA key = 'x\"{}\"';", key);

            // Set the key on every new connection
            let manager = manager.with_init(move |conn| {
                conn.execute_batch(&key_pragma)?;
                Ok(())
            });

            Pool::builder().max_size(8).build(manager)?
        } else {
            Pool::builder().max_size(8).build(manager)?
        };

        let db = Self { pool };
        db.run_migrations()?;

        Ok(db)
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a temporary file rather than `:memory:` so every pooled
    /// connection sees the same data.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "autoledger_test_{}_{}.db",
            std::process::id(),
            id
        ));
        let path = path.to_string_lossy().to_string();

        let _ = std::fs::remove_file(&path);

        Self::new_unencrypted(&path)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Row counts for the status command
    pub fn stats(&self) -> Result<DbStats> {
        let conn = self.conn()?;
        let count = |sql: &str| -> Result<i64> { Ok(conn.query_row(sql, [], |row| row.get(0))?) };

        Ok(DbStats {
            automatics_total: count("SELECT COUNT(*) FROM automatic_records")?,
            automatics_unused: count("SELECT COUNT(*) FROM automatic_records WHERE used = 0")?,
            repeat_rules: count("SELECT COUNT(*) FROM repeat_rules")?,
            transactions: count("SELECT COUNT(*) FROM transactions")?,
            watches: count("SELECT COUNT(*) FROM notification_watches")?,
        })
    }

    /// Create tables if they do not exist
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- WAL mode: readers don't block the background writers
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;

            -- Candidate payments extracted from notifications
            CREATE TABLE IF NOT EXISTS automatic_records (
                id TEXT PRIMARY KEY,
                dedup_hash TEXT NOT NULL UNIQUE,       -- sha256 of (notification id, key, group, package, match text)
                created_at TEXT NOT NULL,              -- RFC 3339, UTC
                categories TEXT NOT NULL DEFAULT '[]', -- JSON array of category ids
                notification_id INTEGER NOT NULL,
                notification_key TEXT NOT NULL,
                notification_group TEXT NOT NULL,
                package_name TEXT NOT NULL,
                post_time INTEGER NOT NULL,            -- epoch millis
                match_text TEXT NOT NULL,
                amount_cents INTEGER NOT NULL,
                title TEXT NOT NULL,
                kind TEXT NOT NULL,
                used BOOLEAN NOT NULL DEFAULT 0,
                account TEXT,
                date TEXT,
                merchant TEXT,
                description TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_automatic_records_used ON automatic_records(used);

            -- Recurring transaction definitions
            CREATE TABLE IF NOT EXISTS repeat_rules (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                note TEXT NOT NULL DEFAULT '',
                amount_cents INTEGER NOT NULL,
                kind TEXT NOT NULL,
                categories TEXT NOT NULL DEFAULT '[]',
                source_id INTEGER,
                repeat_type TEXT NOT NULL,
                first_date DATE NOT NULL,
                active BOOLEAN NOT NULL DEFAULT 1,
                archived BOOLEAN NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_repeat_rules_active ON repeat_rules(active, archived);

            -- Ledger transactions
            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                note TEXT NOT NULL DEFAULT '',
                kind TEXT NOT NULL,
                amount_cents INTEGER NOT NULL,
                date TEXT NOT NULL,                    -- local date-time
                categories TEXT NOT NULL DEFAULT '[]',
                automatic_id TEXT UNIQUE,             -- automatic record this came from
                automatic_created_at TEXT,
                repeat_id INTEGER,                     -- repeat rule this came from
                source_id INTEGER,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);
            CREATE INDEX IF NOT EXISTS idx_transactions_repeat ON transactions(repeat_id, date);

            -- User-defined notification watches
            CREATE TABLE IF NOT EXISTS notification_watches (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                package_names TEXT NOT NULL,           -- JSON array
                match_regexes TEXT NOT NULL,           -- JSON array
                kind TEXT NOT NULL,
                enabled BOOLEAN NOT NULL DEFAULT 1,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}

/// Row counts across the core tables
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DbStats {
    pub automatics_total: i64,
    pub automatics_unused: i64,
    pub repeat_rules: i64,
    pub transactions: i64,
    pub watches: i64,
}
