//! Configuration management with validation and defaults
//!
//! Values come from defaults, an optional TOML file and `MINE_ARENA_*`
//! environment variables, in that order of precedence (last wins).

use crate::errors::ConfigurationError;
use crate::games::types::{Address, Amount};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Top-level engine configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub rules: RulesConfig,
    pub randomness: RandomnessConfig,
    pub events: EventConfig,
    pub admin: AdminConfig,
    pub monitoring: MonitoringConfig,
}

/// Game creation bounds and payout policy
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub min_players: u8,
    pub max_players: u8,
    pub min_turn_duration_secs: u64,
    pub max_turn_duration_secs: u64,
    /// Platform fee in basis points of the pool (100 = 1%)
    pub platform_fee_bps: u16,
    /// Smallest accepted entry fee
    pub min_entry_fee: Amount,
    /// Whether pause mode also rejects joins to open games
    pub pause_blocks_joins: bool,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            min_players: 2,
            max_players: 10,
            min_turn_duration_secs: 10,
            max_turn_duration_secs: 30,
            platform_fee_bps: 100,
            min_entry_fee: 0,
            pause_blocks_joins: true,
        }
    }
}

/// Board seed source
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomnessConfig {
    /// Hex-encoded 32-byte secret. A fresh random secret is used when absent.
    pub secret_hex: Option<String>,
}

/// Event log fan-out
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    pub broadcast_capacity: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: 1024,
        }
    }
}

/// Operator identity
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub admin_address: Address,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            admin_address: Address::new("0x0000000000000000000000000000000000000000"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub log_level: LogLevel,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

impl ArenaConfig {
    /// Relaxed bounds and verbose logging for local play
    pub fn development() -> Self {
        Self {
            rules: RulesConfig {
                min_turn_duration_secs: 1,
                max_turn_duration_secs: 600,
                ..Default::default()
            },
            monitoring: MonitoringConfig {
                log_level: LogLevel::Debug,
            },
            ..Default::default()
        }
    }

    pub fn production() -> Self {
        Self {
            events: EventConfig {
                broadcast_capacity: 10_000,
            },
            ..Default::default()
        }
    }

    /// Validate configuration for logical consistency
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let rules = &self.rules;

        if rules.min_players < 2 {
            return Err(ConfigurationError::ValidationFailed(
                "min_players must be >= 2".to_string(),
            ));
        }
        if rules.max_players > 10 || rules.max_players < rules.min_players {
            return Err(ConfigurationError::ValidationFailed(
                "max_players must be within min_players..=10".to_string(),
            ));
        }
        if rules.min_turn_duration_secs == 0 || rules.max_turn_duration_secs < rules.min_turn_duration_secs {
            return Err(ConfigurationError::ValidationFailed(
                "turn duration bounds must satisfy 0 < min <= max".to_string(),
            ));
        }
        if rules.platform_fee_bps > 10_000 {
            return Err(ConfigurationError::InvalidValue {
                field: "rules.platform_fee_bps".to_string(),
                value: rules.platform_fee_bps.to_string(),
                reason: "fee cannot exceed 100%".to_string(),
            });
        }
        if self.events.broadcast_capacity == 0 {
            return Err(ConfigurationError::ValidationFailed(
                "events.broadcast_capacity must be > 0".to_string(),
            ));
        }
        if let Some(secret) = &self.randomness.secret_hex {
            let valid = hex::decode(secret.trim()).map(|b| b.len() == 32).unwrap_or(false);
            if !valid {
                return Err(ConfigurationError::InvalidValue {
                    field: "randomness.secret_hex".to_string(),
                    value: "<redacted>".to_string(),
                    reason: "must be 64 hex characters".to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Configuration loader with environment variable support
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables, then validate
    pub fn load(&self) -> Result<ArenaConfig, ConfigurationError> {
        let mut config = match &self.config_path {
            Some(path) => Self::load_from_file(path)?,
            None => ArenaConfig::default(),
        };

        Self::apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(config)
    }

    fn load_from_file(path: &str) -> Result<ArenaConfig, ConfigurationError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e)))?;
        Ok(toml::from_str(&content)?)
    }

    fn apply_env_overrides(config: &mut ArenaConfig) -> Result<(), ConfigurationError> {
        if let Ok(fee) = env::var("MINE_ARENA_PLATFORM_FEE_BPS") {
            config.rules.platform_fee_bps = parse_env("MINE_ARENA_PLATFORM_FEE_BPS", fee)?;
        }
        if let Ok(min) = env::var("MINE_ARENA_MIN_TURN_SECS") {
            config.rules.min_turn_duration_secs = parse_env("MINE_ARENA_MIN_TURN_SECS", min)?;
        }
        if let Ok(max) = env::var("MINE_ARENA_MAX_TURN_SECS") {
            config.rules.max_turn_duration_secs = parse_env("MINE_ARENA_MAX_TURN_SECS", max)?;
        }
        if let Ok(admin) = env::var("MINE_ARENA_ADMIN") {
            config.admin.admin_address = Address::new(admin);
        }
        if let Ok(secret) = env::var("MINE_ARENA_SECRET") {
            config.randomness.secret_hex = Some(secret);
        }
        if let Ok(level) = env::var("MINE_ARENA_LOG_LEVEL") {
            config.monitoring.log_level = parse_env("MINE_ARENA_LOG_LEVEL", level)?;
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(field: &str, value: String) -> Result<T, ConfigurationError> {
    value.parse().map_err(|_| ConfigurationError::InvalidValue {
        field: field.to_string(),
        value,
        reason: "could not be parsed".to_string(),
    })
}
