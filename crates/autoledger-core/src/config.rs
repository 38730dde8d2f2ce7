//! Application configuration
//!
//! Resolution order:
//! 1. An explicit path, when given and present
//! 2. The user override at `~/.local/share/autoledger/config/autoledger.toml`
//! 3. The default embedded at build time from `config/autoledger.toml`
//!
//! Missing keys fall back to the built-in defaults. Environment overrides
//! are applied last:
//! - `AUTOLEDGER_REPEAT_INTERVAL_HOURS`: hours between periodic repeat runs
//!   (0 disables the periodic job)

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::NewNotificationWatch;

const DEFAULT_CONFIG: &str = include_str!("../../../config/autoledger.toml");

pub const REPEAT_INTERVAL_ENV: &str = "AUTOLEDGER_REPEAT_INTERVAL_HOURS";

/// Scheduler settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Interval of the periodic repeat job; `None` disables it
    pub repeat_interval: Option<Duration>,
    pub catch_up_on_start: bool,
    pub consume_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            repeat_interval: Some(Duration::from_secs(24 * 3600)),
            catch_up_on_start: true,
            consume_on_start: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppConfig {
    pub scheduler: SchedulerConfig,
    /// Watches seeded into the database on init
    pub watches: Vec<NewNotificationWatch>,
    /// Where the config was read from; `None` for the embedded default
    pub source: Option<PathBuf>,
}

impl AppConfig {
    /// Load using the standard resolution order plus environment overrides
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = load_config(explicit)?;
        apply_env_overrides(&mut config, |k| std::env::var(k).ok());
        Ok(config)
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("autoledger").join("config").join("autoledger.toml"))
}

fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let candidates = explicit
        .map(Path::to_path_buf)
        .into_iter()
        .chain(default_config_path());

    for path in candidates {
        if path.exists() {
            debug!("Loading config from {}", path.display());
            let content = fs::read_to_string(&path).map_err(|e| {
                Error::Config(format!("Failed to read {}: {}", path.display(), e))
            })?;
            let mut config = parse_config(&content)?;
            config.source = Some(path);
            return Ok(config);
        }
        if explicit.is_some_and(|p| p == path) {
            warn!("Config file {} not found, falling back", path.display());
        }
    }

    parse_config(DEFAULT_CONFIG)
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    scheduler: Option<RawScheduler>,
    #[serde(default)]
    watches: Vec<NewNotificationWatch>,
}

#[derive(Debug, Deserialize)]
struct RawScheduler {
    repeat_interval_hours: Option<u64>,
    catch_up_on_start: Option<bool>,
    consume_on_start: Option<bool>,
}

/// Parse config from TOML content
pub fn parse_config(content: &str) -> Result<AppConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = AppConfig::default();

    if let Some(scheduler) = raw.scheduler {
        if let Some(hours) = scheduler.repeat_interval_hours {
            config.scheduler.repeat_interval = interval_from_hours(hours);
        }
        if let Some(v) = scheduler.catch_up_on_start {
            config.scheduler.catch_up_on_start = v;
        }
        if let Some(v) = scheduler.consume_on_start {
            config.scheduler.consume_on_start = v;
        }
    }

    for watch in &raw.watches {
        if watch.act_on_package_names.is_empty() || watch.match_regexes.is_empty() {
            return Err(Error::Config(format!(
                "Watch '{}' needs at least one package and one pattern",
                watch.name
            )));
        }
    }
    config.watches = raw.watches;

    Ok(config)
}

fn interval_from_hours(hours: u64) -> Option<Duration> {
    (hours > 0).then(|| Duration::from_secs(hours * 3600))
}

fn apply_env_overrides(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(value) = lookup(REPEAT_INTERVAL_ENV) {
        match value.trim().parse::<u64>() {
            Ok(hours) => {
                if hours == 0 {
                    warn!("{} is 0, periodic repeats disabled", REPEAT_INTERVAL_ENV);
                }
                config.scheduler.repeat_interval = interval_from_hours(hours);
            }
            Err(_) => warn!("Ignoring invalid {}: {}", REPEAT_INTERVAL_ENV, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransactionKind;

    #[test]
    fn test_parse_default_config() {
        let config = parse_config(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.scheduler, SchedulerConfig::default());
        assert!(config.watches.is_empty());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = parse_config("[scheduler]\nconsume_on_start = false\n").unwrap();
        assert!(!config.scheduler.consume_on_start);
        assert!(config.scheduler.catch_up_on_start);
        assert_eq!(
            config.scheduler.repeat_interval,
            Some(Duration::from_secs(86_400))
        );
    }

    #[test]
    fn test_zero_interval_disables() {
        let config = parse_config("[scheduler]\nrepeat_interval_hours = 0\n").unwrap();
        assert_eq!(config.scheduler.repeat_interval, None);
    }

    #[test]
    fn test_watches_parsed() {
        let toml = r#"
[[watches]]
name = "Bank"
act_on_package_names = ["com.example.bank"]
match_regexes = ["Card used for \\$"]
kind = "spend"
"#;
        let config = parse_config(toml).unwrap();
        assert_eq!(config.watches.len(), 1);
        assert_eq!(config.watches[0].kind, TransactionKind::Spend);
        assert_eq!(config.watches[0].match_regexes[0], r"Card used for \$");
    }

    #[test]
    fn test_watch_without_patterns_rejected() {
        let toml = r#"
[[watches]]
name = "Bank"
act_on_package_names = ["com.example.bank"]
match_regexes = []
kind = "earn"
"#;
        assert!(matches!(parse_config(toml), Err(Error::Config(_))));
    }

    #[test]
    fn test_invalid_toml_rejected() {
        assert!(parse_config("[scheduler\n").is_err());
    }

    #[test]
    fn test_env_override() {
        let mut config = AppConfig::default();
        apply_env_overrides(&mut config, |_| Some("6".to_string()));
        assert_eq!(
            config.scheduler.repeat_interval,
            Some(Duration::from_secs(6 * 3600))
        );

        apply_env_overrides(&mut config, |_| Some("0".to_string()));
        assert_eq!(config.scheduler.repeat_interval, None);

        let mut config = AppConfig::default();
        apply_env_overrides(&mut config, |_| Some("soon".to_string()));
        assert_eq!(config.scheduler, SchedulerConfig::default());
    }

    #[test]
    fn test_explicit_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autoledger.toml");
        fs::write(&path, "[scheduler]\ncatch_up_on_start = false\n").unwrap();

        let config = load_config(Some(path.as_path())).unwrap();
        assert!(!config.scheduler.catch_up_on_start);
        assert_eq!(config.source.as_deref(), Some(path.as_path()));
    }
}
