//! Tracker configuration
//!
//! Loading order:
//! 1. `TRACKER_CONFIG` environment variable (path to a TOML file)
//! 2. `tracker.toml` in the current working directory
//! 3. Built-in defaults
//!
//! Every section is optional; missing keys fall back to the defaults.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracker_shared::{geofence, protocol};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "TRACKER_CONFIG";

/// Config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "tracker.toml";

/// Serial channel and transaction settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModemConfig {
    /// Serial device, e.g. "/dev/ttyAMA0"
    pub port: String,
    pub baud: u32,
    /// Read window per exchange
    pub read_timeout_ms: u64,
    /// Confirmation window after SMS text was submitted
    pub submit_timeout_ms: u64,
    /// Reply bytes collected per exchange
    pub read_budget: usize,
    /// Attempts per transaction
    pub max_attempts: u32,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyAMA0".into(),
            baud: 57600,
            read_timeout_ms: protocol::READ_TIMEOUT_MS,
            submit_timeout_ms: protocol::SUBMIT_TIMEOUT_MS,
            read_budget: protocol::READ_BUDGET_BYTES,
            max_attempts: protocol::MAX_ATTEMPTS,
        }
    }
}

impl ModemConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }
}

/// Remote user authentication
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Password expected in `Logare=<password>`
    pub password: String,
    /// Always authenticated; receives the startup message
    pub operator: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            password: "123".into(),
            operator: "+40773791847".into(),
        }
    }
}

/// Geofence alarm tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlarmConfig {
    pub threshold: f64,
    pub cadence_ms: u64,
    pub breach_settle_ms: u64,
    pub gps_warmup_ms: u64,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            threshold: geofence::BREACH_THRESHOLD,
            cadence_ms: geofence::CADENCE_MS,
            breach_settle_ms: geofence::BREACH_SETTLE_MS,
            gps_warmup_ms: geofence::GPS_WARMUP_MS,
        }
    }
}

impl AlarmConfig {
    pub fn cadence(&self) -> Duration {
        Duration::from_millis(self.cadence_ms)
    }

    pub fn breach_settle(&self) -> Duration {
        Duration::from_millis(self.breach_settle_ms)
    }

    pub fn gps_warmup(&self) -> Duration {
        Duration::from_millis(self.gps_warmup_ms)
    }
}

/// SMS settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SmsConfig {
    /// SMS service center address
    pub service_center: String,
    /// Pause after each sent message
    pub settle_ms: u64,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            service_center: "+40770000050".into(),
            settle_ms: 2000,
        }
    }
}

impl SmsConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Complete tracker configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub modem: ModemConfig,
    pub auth: AuthConfig,
    pub alarm: AlarmConfig,
    pub sms: SmsConfig,
}

impl TrackerConfig {
    /// Load using the documented lookup order
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) => {
                info!("[CONFIG] Loading {}", path.display());
                Self::from_file(&path)
            }
            None => {
                info!("[CONFIG] No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Parse TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate();
        Ok(config)
    }

    fn validate(&self) {
        if self.modem.max_attempts == 0 {
            warn!("[CONFIG] modem.max_attempts is 0, every transaction will fail");
        }
        if self.auth.password.is_empty() {
            warn!("[CONFIG] auth.password is empty");
        }
    }
}

fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }

    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    local.exists().then_some(local)
}
