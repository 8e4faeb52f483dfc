//! Relay configuration
//!
//! Loaded from `~/.config/notification-relay/config.json`. Every field has a
//! default, so a missing file or a partial file is fine. The path can be
//! overridden with `--config` or the `NRELAY_CONFIG` environment variable.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable that overrides the config file location
pub const CONFIG_ENV: &str = "NRELAY_CONFIG";

const DEFAULT_RETENTION_MS: u64 = 30 * 60 * 1000;
const DEFAULT_MAX_CACHE_ENTRIES: usize = 1000;
const DEFAULT_SWEEP_INTERVAL_MS: u64 = 30 * 60 * 1000;
const DEFAULT_WORKERS: usize = 2;
const DEFAULT_MAX_EXTRA_VALUE_LEN: usize = 500;
const DEFAULT_BOOT_SETTLE_MS: u64 = 5000;
const DEFAULT_SMS_LIMIT: usize = 50;
const DEFAULT_RESTART_STABLE_MS: u64 = 60 * 1000;

/// Relay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// How long a delivered identity suppresses duplicates (ms)
    pub retention_ms: u64,
    /// Hard cap on dedup cache entries
    pub max_cache_entries: usize,
    /// Janitor sweep period (ms)
    pub sweep_interval_ms: u64,
    /// Normalization worker count
    pub workers: usize,
    /// Extension values longer than this are dropped from `additionalInfo`
    pub max_extra_value_len: usize,
    /// Delay before a boot/update signal starts the relay (ms)
    pub boot_settle_ms: u64,
    /// Our own application package
    pub package_name: String,
    /// Listener class, used together with `package_name` for rebinding
    pub listener_class: String,
    /// Persistent foreground indicator
    pub indicator: IndicatorConfig,
    /// What to do after the OS tears the host down
    pub restart: RestartPolicy,
    /// Uptime after which a restart counts as recovered and the attempt
    /// counter starts over (ms)
    pub restart_stable_ms: u64,
    /// Upper bound for `getSmsMessages`
    pub sms_limit: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            retention_ms: DEFAULT_RETENTION_MS,
            max_cache_entries: DEFAULT_MAX_CACHE_ENTRIES,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
            workers: DEFAULT_WORKERS,
            max_extra_value_len: DEFAULT_MAX_EXTRA_VALUE_LEN,
            boot_settle_ms: DEFAULT_BOOT_SETTLE_MS,
            package_name: "com.example.notification_relay".to_string(),
            listener_class: "NotificationRelayListener".to_string(),
            indicator: IndicatorConfig::default(),
            restart: RestartPolicy::default(),
            restart_stable_ms: DEFAULT_RESTART_STABLE_MS,
            sms_limit: DEFAULT_SMS_LIMIT,
        }
    }
}

/// Foreground indicator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    /// Reserved notification id, never cancelled by clear-all
    pub id: i32,
    pub channel_id: String,
    pub channel_name: String,
    pub title: String,
    pub text: String,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            id: 1001,
            channel_id: "relay_monitor_channel".to_string(),
            channel_name: "Notification Relay".to_string(),
            title: "Notification Relay".to_string(),
            text: "Monitoring notifications in background".to_string(),
        }
    }
}

/// Restart behaviour after an OS-initiated teardown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RestartPolicy {
    /// Request a start right away, every time
    #[default]
    Immediate,
    /// Exponential backoff starting at `initial_ms`, capped at `max_ms`
    Backoff { initial_ms: u64, max_ms: u64 },
}

impl RestartPolicy {
    /// Delay before restart attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match *self {
            RestartPolicy::Immediate => Duration::ZERO,
            RestartPolicy::Backoff { initial_ms, max_ms } => {
                let shift = attempt.saturating_sub(1).min(32);
                let ms = initial_ms.saturating_mul(1u64 << shift).min(max_ms);
                Duration::from_millis(ms)
            }
        }
    }
}

impl RelayConfig {
    /// Default config file path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("notification-relay")
            .join("config.json")
    }

    /// Load config, resolving the path from the argument, `NRELAY_CONFIG`,
    /// then the default location
    ///
    /// An explicitly named file must exist; the default file is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.is_empty() {
                return Self::load_from(Path::new(&path));
            }
        }

        let path = Self::default_path();
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load and validate a specific config file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: RelayConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        debug!(path = %path.display(), "Loaded relay config");
        Ok(config)
    }

    /// Reject values the relay cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            bail!("workers must be at least 1");
        }
        if self.max_cache_entries == 0 {
            bail!("max_cache_entries must be at least 1");
        }
        if self.sweep_interval_ms == 0 {
            bail!("sweep_interval_ms must be greater than 0");
        }
        if let RestartPolicy::Backoff { initial_ms, max_ms } = self.restart {
            if initial_ms > max_ms {
                bail!("restart backoff initial_ms ({}) exceeds max_ms ({})", initial_ms, max_ms);
            }
        }
        Ok(())
    }

    pub fn retention(&self) -> Duration {
        Duration::from_millis(self.retention_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn boot_settle(&self) -> Duration {
        Duration::from_millis(self.boot_settle_ms)
    }

    /// Uptime after which restart attempts start over
    pub fn restart_stable(&self) -> Duration {
        Duration::from_millis(self.restart_stable_ms)
    }
}
