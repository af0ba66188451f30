use chrono::FixedOffset;
use config::{Config, File};
use serde::Deserialize;

use crate::error::SeatWatchError;

#[derive(Debug, Deserialize, Clone)]
pub struct SeatWatchConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub stations: StationsConfig,
    pub oracle: OracleConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub log_level: String,
    /// Offset of the stations' local time from UTC. Picks "today" for the calendar.
    #[serde(default = "default_utc_offset")]
    pub utc_offset_minutes: i32,
}

fn default_utc_offset() -> i32 {
    180
}

impl ServiceConfig {
    pub fn local_offset(&self) -> Result<FixedOffset, SeatWatchError> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            SeatWatchError::Invalid(format!(
                "service.utc_offset_minutes out of range: {}",
                self.utc_offset_minutes
            ))
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StationsConfig {
    /// JSON object mapping canonical station key -> short name
    pub path: String,
}

/// Where the allow-list lives.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    #[default]
    Database,
    Static,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AccessConfig {
    #[serde(default)]
    pub mode: AccessMode,
    #[serde(default)]
    pub allowed_users: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OracleConfig {
    /// "command" (spawn the scraper script) or "http" (call a scraper service)
    pub backend: String,
    #[serde(default)]
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_oracle_timeout")]
    pub timeout_seconds: u64,
}

fn default_oracle_timeout() -> u64 {
    90
}

#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    pub enabled: bool,
    pub interval_minutes: u64,
    pub booking_url: Option<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_minutes: 5,
            booking_url: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub api_base: String,
    pub bot_token: Option<String>,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.telegram.org".to_string(),
            bot_token: None,
            max_retries: 3,
            retry_delay_ms: 500,
        }
    }
}

impl TelegramConfig {
    /// Token from the file, falling back to `TELEGRAM_BOT_TOKEN`.
    pub fn resolved_token(&self) -> Option<String> {
        self.bot_token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| std::env::var("TELEGRAM_BOT_TOKEN").ok())
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl SeatWatchConfig {
    /// Read the TOML file and reject values the service cannot run with.
    pub fn load(path: &str) -> Result<Self, SeatWatchError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;
        let config: Self = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SeatWatchError> {
        self.service.local_offset()?;
        if self.oracle.timeout_seconds == 0 {
            return Err(SeatWatchError::Invalid(
                "oracle.timeout_seconds must be positive".to_string(),
            ));
        }
        if self.monitor.enabled && self.monitor.interval_minutes == 0 {
            return Err(SeatWatchError::Invalid(
                "monitor.interval_minutes must be positive".to_string(),
            ));
        }
        if self.access.mode == AccessMode::Static && self.access.allowed_users.is_empty() {
            tracing::warn!("Static allow-list is empty, every user will be denied");
        }
        Ok(())
    }
}
