//! Core configuration loaded from TOML with environment overrides.
//!
//! # Responsibility
//! - Carry every externally supplied setting the core depends on
//!   (administrator identity, tracked roster, civil timezone, store timeout,
//!   logging).
//! - Provide zero-configuration defaults for local development.
//!
//! # Invariants
//! - The administrator identity only ever comes from configuration.
//! - Invalid environment overrides are ignored with a warning, never fatal.

use crate::time::CivilZone;
use chrono::FixedOffset;
use log::warn;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Asia/Kolkata has no DST, so a fixed +05:30 offset is exact.
const DEFAULT_CIVIL_OFFSET_MINUTES: i32 = 5 * 60 + 30;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const MAX_OFFSET_MINUTES: i32 = 14 * 60;

pub const ENV_ADMIN: &str = "NOTEDESK_ADMIN";
pub const ENV_ROSTER: &str = "NOTEDESK_ROSTER";
pub const ENV_UTC_OFFSET_MINUTES: &str = "NOTEDESK_UTC_OFFSET_MINUTES";
pub const ENV_BUSY_TIMEOUT_MS: &str = "NOTEDESK_BUSY_TIMEOUT_MS";
pub const ENV_LOG_LEVEL: &str = "NOTEDESK_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "NOTEDESK_LOG_DIR";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("civil offset {0} minutes is outside +/-{MAX_OFFSET_MINUTES}")]
    InvalidOffset(i32),
}

/// Top-level core configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    /// Identity granted the delete override. `None` disables the override.
    pub administrator: Option<String>,
    /// Identities covered by roster-scoped analytics.
    pub tracked_roster: Vec<String>,
    /// Offset of the single civil timezone, in minutes east of UTC.
    pub civil_offset_minutes: i32,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            administrator: None,
            tracked_roster: Vec::new(),
            civil_offset_minutes: DEFAULT_CIVIL_OFFSET_MINUTES,
            store: StoreConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Upper bound a store call waits on a held database lock.
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl StoreConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Logging settings consumed by [`crate::logging::init_logging`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// One of `trace|debug|info|warn|error`.
    pub level: String,
    /// Absolute directory for rolling log files; stderr when unset.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: crate::logging::default_log_level().to_string(),
            directory: None,
        }
    }
}

impl CoreConfig {
    /// Parses a TOML document; missing keys fall back to defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a TOML file, then applies process environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&raw)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies `NOTEDESK_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Applies overrides from an arbitrary key lookup.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(admin) = lookup(ENV_ADMIN) {
            let admin = admin.trim();
            self.administrator = (!admin.is_empty()).then(|| admin.to_string());
        }

        if let Some(roster) = lookup(ENV_ROSTER) {
            self.tracked_roster = parse_roster(&roster);
        }

        if let Some(raw) = lookup(ENV_UTC_OFFSET_MINUTES) {
            match raw.trim().parse::<i32>() {
                Ok(minutes) if minutes.abs() <= MAX_OFFSET_MINUTES => {
                    self.civil_offset_minutes = minutes;
                }
                _ => warn!(
                    "event=config_override module=config status=skip key={ENV_UTC_OFFSET_MINUTES} reason=invalid_value"
                ),
            }
        }

        if let Some(raw) = lookup(ENV_BUSY_TIMEOUT_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.store.busy_timeout_ms = ms,
                Err(_) => warn!(
                    "event=config_override module=config status=skip key={ENV_BUSY_TIMEOUT_MS} reason=invalid_value"
                ),
            }
        }

        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = level.trim().to_string();
        }

        if let Some(dir) = lookup(ENV_LOG_DIR) {
            let dir = dir.trim();
            self.logging.directory = (!dir.is_empty()).then(|| PathBuf::from(dir));
        }
    }

    /// Returns the civil timezone every timestamp is expressed in.
    pub fn civil_zone(&self) -> Result<CivilZone, ConfigError> {
        FixedOffset::east_opt(self.civil_offset_minutes * 60)
            .map(CivilZone::new)
            .ok_or(ConfigError::InvalidOffset(self.civil_offset_minutes))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.civil_offset_minutes.abs() > MAX_OFFSET_MINUTES {
            return Err(ConfigError::InvalidOffset(self.civil_offset_minutes));
        }
        Ok(())
    }
}

fn parse_roster(raw: &str) -> Vec<String> {
    let mut roster: Vec<String> = Vec::new();
    for identity in raw.split(',').map(str::trim).filter(|id| !id.is_empty()) {
        if !roster.iter().any(|existing| existing == identity) {
            roster.push(identity.to_string());
        }
    }
    roster
}
