//! Availability oracle: current time slots and free seats for a route and date.
//!
//! The scraping itself is external. Two adapters are provided:
//! - **command**: spawns the scraper script and reads its `SEAT_DATA_JSON:` line
//! - **http**: posts the query to a scraper service that answers with the slot array
//!
//! Callers wrap every check in [`check_with_timeout`]; a call that overruns is
//! dropped, which kills a spawned scraper process.

use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;
use reqwest::Client;
use serde::Serialize;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

use crate::config::OracleConfig;
use crate::models::TimeSlot;

/// Marker prefixing the JSON result line on the scraper's stdout.
pub const SEAT_DATA_MARKER: &str = "SEAT_DATA_JSON:";

#[async_trait]
pub trait AvailabilityOracle: Send + Sync {
    async fn check(
        &self,
        origin: &str,
        destination: &str,
        date: NaiveDate,
    ) -> Result<Vec<TimeSlot>, OracleError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Failed to run scraper: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Scraper exited with {code:?}: {stderr}")]
    Exit { code: Option<i32>, stderr: String },

    #[error("Availability check timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Oracle API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("No SEAT_DATA_JSON: line in scraper output")]
    MissingPayload,

    #[error("Malformed availability payload: {0}")]
    MalformedPayload(String),

    #[error("Oracle misconfigured: {0}")]
    Config(String),
}

/// Run `oracle.check` with a bounded timeout.
pub async fn check_with_timeout(
    oracle: &dyn AvailabilityOracle,
    origin: &str,
    destination: &str,
    date: NaiveDate,
    timeout: Duration,
) -> Result<Vec<TimeSlot>, OracleError> {
    match tokio::time::timeout(timeout, oracle.check(origin, destination, date)).await {
        Ok(result) => result,
        Err(_) => Err(OracleError::Timeout {
            seconds: timeout.as_secs(),
        }),
    }
}

/// Build the configured oracle backend.
pub fn create_oracle(config: &OracleConfig) -> Result<Box<dyn AvailabilityOracle>, OracleError> {
    match config.backend.as_str() {
        "command" => {
            if config.program.is_empty() {
                return Err(OracleError::Config("oracle.program is empty".to_string()));
            }
            Ok(Box::new(CommandOracle::new(
                config.program.clone(),
                config.args.clone(),
            )))
        }
        "http" => {
            if config.url.is_empty() {
                return Err(OracleError::Config("oracle.url is empty".to_string()));
            }
            Ok(Box::new(HttpOracle::new(
                config.url.clone(),
                Duration::from_secs(config.timeout_seconds),
            )?))
        }
        other => Err(OracleError::Config(format!("unknown oracle backend '{other}'"))),
    }
}

// ============================================================================
// Payload parsing
// ============================================================================

fn time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").expect("valid time regex"))
}

/// Reject slots whose time is not `HH:MM`.
pub fn validate_slots(slots: Vec<TimeSlot>) -> Result<Vec<TimeSlot>, OracleError> {
    if let Some(bad) = slots.iter().find(|s| !time_pattern().is_match(&s.time)) {
        return Err(OracleError::MalformedPayload(format!(
            "invalid departure time '{}'",
            bad.time
        )));
    }
    Ok(slots)
}

/// Extract the slot array from scraper stdout.
pub fn parse_seat_data(stdout: &str) -> Result<Vec<TimeSlot>, OracleError> {
    let line = stdout
        .lines()
        .find_map(|line| line.trim_end_matches('\r').strip_prefix(SEAT_DATA_MARKER))
        .ok_or(OracleError::MissingPayload)?;

    let slots: Vec<TimeSlot> = serde_json::from_str(line.trim())
        .map_err(|e| OracleError::MalformedPayload(e.to_string()))?;
    validate_slots(slots)
}

// ============================================================================
// CommandOracle
// ============================================================================

/// Spawns the scraper as
/// `<program> <args..> --nereden=<origin> --nereye=<destination> --tarih=<YYYY-MM-DD>`.
#[derive(Debug, Clone)]
pub struct CommandOracle {
    program: String,
    args: Vec<String>,
}

impl CommandOracle {
    pub fn new(program: String, args: Vec<String>) -> Self {
        Self { program, args }
    }
}

#[async_trait]
impl AvailabilityOracle for CommandOracle {
    async fn check(
        &self,
        origin: &str,
        destination: &str,
        date: NaiveDate,
    ) -> Result<Vec<TimeSlot>, OracleError> {
        tracing::debug!(program = %self.program, origin, destination, %date, "Running scraper");

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(format!("--nereden={origin}"))
            .arg(format!("--nereye={destination}"))
            .arg(format!("--tarih={}", date.format("%Y-%m-%d")))
            .kill_on_drop(true)
            .output()
            .await?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(OracleError::Exit {
                code: output.status.code(),
                stderr: stderr.trim().to_string(),
            });
        }
        if !stderr.trim().is_empty() {
            tracing::warn!(stderr = %stderr.trim(), "Scraper wrote to stderr");
        }

        parse_seat_data(&String::from_utf8_lossy(&output.stdout))
    }

    fn name(&self) -> &str {
        "command"
    }
}

// ============================================================================
// HttpOracle
// ============================================================================

#[derive(Debug, Serialize)]
struct AvailabilityQuery<'a> {
    origin: &'a str,
    destination: &'a str,
    date: String,
}

/// Calls a scraper service: `POST {url}` with `{origin, destination, date}`.
#[derive(Debug, Clone)]
pub struct HttpOracle {
    client: Client,
    url: String,
}

impl HttpOracle {
    pub fn new(url: String, timeout: Duration) -> Result<Self, OracleError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl AvailabilityOracle for HttpOracle {
    async fn check(
        &self,
        origin: &str,
        destination: &str,
        date: NaiveDate,
    ) -> Result<Vec<TimeSlot>, OracleError> {
        let query = AvailabilityQuery {
            origin,
            destination,
            date: date.format("%Y-%m-%d").to_string(),
        };

        let response = self.client.post(&self.url).json(&query).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::error!(code = status.as_u16(), message = %message, "Oracle service error");
            return Err(OracleError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let slots: Vec<TimeSlot> = serde_json::from_str(&body)
            .map_err(|e| OracleError::MalformedPayload(e.to_string()))?;
        validate_slots(slots)
    }

    fn name(&self) -> &str {
        "http"
    }
}

// ============================================================================
// TESTS
// ============================================================================
