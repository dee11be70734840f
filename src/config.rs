//! Configuration management for Pricewatch
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files with support for environment variable overrides.

use crate::conversion::UnitConversion;
use crate::error::{PricewatchError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

mod defaults;

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "PRICEWATCH_CONFIG";

/// Environment variable overriding the day-ahead API key
pub const API_KEY_ENV: &str = "PRICEWATCH_API_KEY";

const REDACTED: &str = "***";

/// Longest accepted refresh interval or floor (one week)
pub const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Accessory identity shown to the host
    pub accessory: AccessoryConfig,

    /// Poll cycle timing and rate bounds
    pub poller: PollerConfig,

    /// Which price API to query and how
    pub source: SourceConfig,

    /// Transform applied to extracted prices before publishing
    pub conversion: UnitConversion,

    /// Where readings are published
    pub sinks: SinksConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Web server binding configuration
    pub web: WebConfig,
}

/// Accessory identity strings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessoryConfig {
    pub name: String,
    pub manufacturer: String,
    pub model: String,
}

/// Poll cycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Requested refresh interval in minutes; 0 means "use the floor"
    pub refresh_interval_minutes: u64,

    /// Override for the minimum refresh interval. When unset the floor
    /// depends on the configured source.
    pub min_interval_minutes: Option<u64>,

    /// Lower bound of the expected rate range
    pub min_rate: f64,

    /// Upper bound of the expected rate range, published whenever a cycle fails
    pub max_rate: f64,

    /// Timeout for the outbound price request
    pub request_timeout_seconds: u64,

    /// Round published values to this many decimals
    pub publish_decimals: Option<u32>,

    /// How the first cycle is triggered
    pub startup: StartupConfig,
}

/// First-cycle trigger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupConfig {
    /// Wait for the host's ready notification before the first poll
    pub wait_for_ready: bool,

    /// Delay before the first poll when no ready notification is used
    pub delay_ms: u64,
}

/// Supported price APIs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Day-ahead market XML API
    #[default]
    DayAhead,
    /// Real-time hourly average JSON API
    HourlyAverage,
}

impl SourceKind {
    /// Minimum refresh interval the upstream tolerates
    pub fn default_min_interval_minutes(self) -> u64 {
        match self {
            SourceKind::DayAhead => 15,
            SourceKind::HourlyAverage => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::DayAhead => "day_ahead",
            SourceKind::HourlyAverage => "hourly_average",
        }
    }
}

/// Where the API key is attached to day-ahead requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyLocation {
    /// `X-Api-Key` request header
    #[default]
    Header,
    /// `securityToken` query parameter
    Query,
}

/// Price source selection
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub day_ahead: DayAheadConfig,
    pub hourly_average: HourlyAverageConfig,
}

/// Day-ahead market API parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DayAheadConfig {
    pub base_url: String,
    pub document_type: String,
    pub in_domain: String,
    pub out_domain: String,
    pub api_key: Option<String>,
    pub api_key_location: ApiKeyLocation,
}

/// Hourly average API parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HourlyAverageConfig {
    pub base_url: String,
    /// Value of the `type` query parameter
    pub query_type: String,
}

/// Publish targets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinksConfig {
    /// Log every published reading
    pub log: bool,

    /// POST every published reading to a URL
    pub webhook: Option<WebhookConfig>,
}

/// Webhook sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub url: String,
    pub bearer_token: Option<String>,
    pub timeout_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Console-specific level; falls back to `level`
    pub console_level: Option<String>,

    /// File-specific level; falls back to `level`
    pub file_level: Option<String>,

    /// Path to log file (its directory receives the rotated files)
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Serve the HTTP API
    pub enabled: bool,

    /// Bind address
    pub host: String,

    /// TCP port
    pub port: u16,
}

/// Effective interval: never below the floor, and the floor when unset
pub fn effective_interval_minutes(configured: u64, floor: u64) -> u64 {
    if configured == 0 {
        floor
    } else {
        configured.max(floor)
    }
}

impl PollerConfig {
    /// Floor for the refresh interval given the configured source
    pub fn min_interval_for(&self, kind: SourceKind) -> u64 {
        self.min_interval_minutes
            .unwrap_or_else(|| kind.default_min_interval_minutes())
    }

    /// Refresh interval after applying the floor
    pub fn effective_refresh_minutes(&self, kind: SourceKind) -> u64 {
        effective_interval_minutes(self.refresh_interval_minutes, self.min_interval_for(kind))
    }

    /// Whether the configured interval had to be raised to the floor
    pub fn refresh_was_floored(&self, kind: SourceKind) -> bool {
        self.refresh_interval_minutes != 0
            && self.refresh_interval_minutes < self.min_interval_for(kind)
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the environment-selected or default locations
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ => Self::load_from_default_paths()?,
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_from_default_paths() -> Result<Self> {
        let default_paths = [
            "pricewatch_config.yaml",
            "/data/pricewatch_config.yaml",
            "/etc/pricewatch/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        // Fall back to default configuration
        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides using the given variable lookup
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.source.day_ahead.api_key = Some(key.trim().to_string());
        }
    }

    /// Copy with secrets replaced, safe to log or serve
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.source.day_ahead.api_key.is_some() {
            copy.source.day_ahead.api_key = Some(REDACTED.to_string());
        }
        if let Some(webhook) = copy.sinks.webhook.as_mut()
            && webhook.bearer_token.is_some()
        {
            webhook.bearer_token = Some(REDACTED.to_string());
        }
        copy
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let poller = &self.poller;

        if !poller.min_rate.is_finite() || !poller.max_rate.is_finite() {
            return Err(PricewatchError::validation(
                "poller.min_rate/max_rate",
                "Rate bounds must be finite numbers",
            ));
        }

        if poller.min_rate > poller.max_rate {
            return Err(PricewatchError::validation(
                "poller.min_rate",
                "Must not exceed poller.max_rate",
            ));
        }

        if poller.min_interval_minutes == Some(0) {
            return Err(PricewatchError::validation(
                "poller.min_interval_minutes",
                "Must be greater than 0",
            ));
        }

        if poller.refresh_interval_minutes > MAX_INTERVAL_MINUTES
            || poller.min_interval_minutes.unwrap_or(0) > MAX_INTERVAL_MINUTES
        {
            return Err(PricewatchError::validation(
                "poller.refresh_interval_minutes",
                "Intervals must not exceed one week",
            ));
        }

        if poller.request_timeout_seconds == 0 {
            return Err(PricewatchError::validation(
                "poller.request_timeout_seconds",
                "Must be greater than 0",
            ));
        }

        // A request must always finish before the next cycle is due
        let refresh_secs = poller
            .effective_refresh_minutes(self.source.kind)
            .saturating_mul(60);
        if poller.request_timeout_seconds >= refresh_secs {
            return Err(PricewatchError::validation(
                "poller.request_timeout_seconds",
                "Must be shorter than the refresh interval",
            ));
        }

        if let Some(decimals) = poller.publish_decimals
            && decimals > 6
        {
            return Err(PricewatchError::validation(
                "poller.publish_decimals",
                "Must be 6 or less",
            ));
        }

        match self.source.kind {
            SourceKind::DayAhead => {
                let da = &self.source.day_ahead;
                if da.base_url.trim().is_empty() {
                    return Err(PricewatchError::validation(
                        "source.day_ahead.base_url",
                        "Cannot be empty",
                    ));
                }
                if da.document_type.trim().is_empty() {
                    return Err(PricewatchError::validation(
                        "source.day_ahead.document_type",
                        "Cannot be empty",
                    ));
                }
                if da.in_domain.trim().is_empty() || da.out_domain.trim().is_empty() {
                    return Err(PricewatchError::validation(
                        "source.day_ahead.in_domain/out_domain",
                        "Cannot be empty",
                    ));
                }
            }
            SourceKind::HourlyAverage => {
                if self.source.hourly_average.base_url.trim().is_empty() {
                    return Err(PricewatchError::validation(
                        "source.hourly_average.base_url",
                        "Cannot be empty",
                    ));
                }
            }
        }

        if !self.conversion.is_finite() {
            return Err(PricewatchError::validation(
                "conversion",
                "Linear scale and offset must be finite",
            ));
        }

        if let Some(webhook) = &self.sinks.webhook {
            if webhook.url.trim().is_empty() {
                return Err(PricewatchError::validation(
                    "sinks.webhook.url",
                    "Cannot be empty",
                ));
            }
            if webhook.timeout_seconds == 0 {
                return Err(PricewatchError::validation(
                    "sinks.webhook.timeout_seconds",
                    "Must be greater than 0",
                ));
            }
        }

        crate::logging::parse_log_level(&self.logging.level)?;

        if self.web.enabled && self.web.port == 0 {
            return Err(PricewatchError::validation(
                "web.port",
                "Port must be greater than 0",
            ));
        }

        Ok(())
    }
}
