//! Runtime configuration file layer
//!
//! A JSON document with human-readable durations ("300ms", "30s"). Every
//! section is optional; missing fields take the per-crate defaults. Two
//! environment variables override logging: `CROUPIER_LOG` (filter
//! directives) and `CROUPIER_LOG_FORMAT` (`pretty` or `json`).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use croupier_core::{CroupierError, CroupierResult};
use croupier_realtime::SubscriptionConfig;
use croupier_state::BatchConfig;
use croupier_store::SortDirection;

use crate::ViewConfig;

pub const ENV_LOG: &str = "CROUPIER_LOG";
pub const ENV_LOG_FORMAT: &str = "CROUPIER_LOG_FORMAT";

/// Log output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Some(LogFormat::Pretty),
            "json" | "jsonl" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directives, e.g. `info,croupier_realtime=debug`
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionSection {
    pub auto_reconnect: bool,
    #[serde(with = "duration_str")]
    pub reconnect_delay: Duration,
    #[serde(with = "duration_str")]
    pub max_reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
}

impl Default for SubscriptionSection {
    fn default() -> Self {
        let defaults = SubscriptionConfig::default();
        SubscriptionSection {
            auto_reconnect: defaults.auto_reconnect,
            reconnect_delay: defaults.base_delay,
            max_reconnect_delay: defaults.max_delay,
            max_reconnect_attempts: defaults.max_reconnect_attempts,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSection {
    pub batch_size: usize,
    #[serde(with = "duration_str")]
    pub debounce: Duration,
}

impl Default for BatchSection {
    fn default() -> Self {
        let defaults = BatchConfig::default();
        BatchSection {
            batch_size: defaults.batch_size,
            debounce: defaults.debounce,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewSection {
    pub page_size: usize,
    pub sort_column: String,
    pub sort_direction: SortDirection,
    pub search_fields: Vec<String>,
    pub realtime: bool,
}

impl Default for ViewSection {
    fn default() -> Self {
        let defaults = ViewConfig::default();
        ViewSection {
            page_size: defaults.page_size,
            sort_column: defaults.sort_column,
            sort_direction: defaults.sort_direction,
            search_fields: defaults.search_fields,
            realtime: defaults.realtime,
        }
    }
}

/// Top-level runtime configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub log: LogConfig,
    pub subscription: SubscriptionSection,
    pub batch: BatchSection,
    pub view: ViewSection,
    pub driver: DriverSection,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverSection {
    /// Upper bound on the driver's sleep between ticks
    #[serde(with = "duration_str")]
    pub tick_interval: Duration,
}

impl Default for DriverSection {
    fn default() -> Self {
        DriverSection {
            tick_interval: Duration::from_millis(50),
        }
    }
}

impl RuntimeConfig {
    pub fn from_json(json: &str) -> CroupierResult<Self> {
        let config: RuntimeConfig = serde_json::from_str(json)
            .map_err(|e| CroupierError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON file and apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> CroupierResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| CroupierError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        let mut config = Self::from_json(&json)?;
        config.apply_env();
        Ok(config)
    }

    /// Apply `CROUPIER_LOG` / `CROUPIER_LOG_FORMAT` from the process environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(level) = lookup(ENV_LOG).filter(|v| !v.trim().is_empty()) {
            self.log.level = level;
        }
        if let Some(raw) = lookup(ENV_LOG_FORMAT) {
            match LogFormat::parse(&raw) {
                Some(format) => self.log.format = format,
                None => tracing::warn!(value = %raw, "ignoring unknown {}", ENV_LOG_FORMAT),
            }
        }
    }

    pub fn validate(&self) -> CroupierResult<()> {
        if self.view.page_size == 0 {
            return Err(CroupierError::InvalidConfig("view.page_size must be at least 1".into()));
        }
        if self.batch.batch_size == 0 {
            return Err(CroupierError::InvalidConfig("batch.batch_size must be at least 1".into()));
        }
        if self.subscription.reconnect_delay > self.subscription.max_reconnect_delay {
            return Err(CroupierError::InvalidConfig(
                "subscription.reconnect_delay exceeds max_reconnect_delay".into(),
            ));
        }
        if self.driver.tick_interval.is_zero() {
            return Err(CroupierError::InvalidConfig("driver.tick_interval must be non-zero".into()));
        }
        Ok(())
    }

    pub fn subscription_config(&self) -> SubscriptionConfig {
        SubscriptionConfig {
            auto_reconnect: self.subscription.auto_reconnect,
            base_delay: self.subscription.reconnect_delay,
            max_delay: self.subscription.max_reconnect_delay,
            max_reconnect_attempts: self.subscription.max_reconnect_attempts,
        }
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            batch_size: self.batch.batch_size,
            debounce: self.batch.debounce,
        }
    }

    pub fn view_config(&self) -> ViewConfig {
        ViewConfig {
            page_size: self.view.page_size,
            sort_column: self.view.sort_column.clone(),
            sort_direction: self.view.sort_direction,
            search_fields: self.view.search_fields.clone(),
            realtime: self.view.realtime,
            batch: self.batch_config(),
            subscription: self.subscription_config(),
        }
    }
}

mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
