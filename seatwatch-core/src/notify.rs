//! Outbound notifications to a user.
//!
//! [`TelegramNotifier`] calls the Bot API `sendMessage` method and retries
//! transient failures with exponential backoff inside a single `notify` call.
//! Whether the overall send succeeded is what gates a request's move to
//! `completed`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use crate::config::TelegramConfig;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: &str, text: &str) -> Result<(), NotifyError>;
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Missing bot token")]
    MissingToken,

    #[error("All {attempts} send attempts failed")]
    RetryExhausted { attempts: usize },
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: Client,
    base_url: String,
    token: String,
    max_retries: usize,
    retry_delay_ms: u64,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Result<Self, NotifyError> {
        let token = config.resolved_token().ok_or(NotifyError::MissingToken)?;
        Self::with_base_url(config, token, config.api_base.clone())
    }

    /// Create a notifier against a custom API base (for testing / integration)
    pub fn with_base_url(
        config: &TelegramConfig,
        token: String,
        base_url: String,
    ) -> Result<Self, NotifyError> {
        if token.is_empty() {
            return Err(NotifyError::MissingToken);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            max_retries: config.max_retries.max(1),
            retry_delay_ms: config.retry_delay_ms,
        })
    }

    async fn send_once(&self, user_id: &str, text: &str) -> Result<(), NotifyError> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.token);
        let request = SendMessageRequest {
            chat_id: user_id,
            text,
        };

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let parsed = serde_json::from_str::<TelegramResponse>(&body).ok();

        match parsed {
            Some(r) if status.is_success() && r.ok => Ok(()),
            Some(r) => Err(NotifyError::Api {
                code: r.error_code.unwrap_or(status.as_u16()),
                message: r.description.unwrap_or(body),
            }),
            None => Err(NotifyError::Api {
                code: status.as_u16(),
                message: body,
            }),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, user_id: &str, text: &str) -> Result<(), NotifyError> {
        // take(n) counts retries after the first attempt
        let retry_strategy = ExponentialBackoff::from_millis(self.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.max_retries - 1);

        let result = Retry::spawn(retry_strategy, || self.send_once(user_id, text)).await;

        result.map_err(|e| {
            tracing::error!(
                user_id,
                attempts = self.max_retries,
                error = %e,
                "All notification attempts failed"
            );
            NotifyError::RetryExhausted {
                attempts: self.max_retries,
            }
        })
    }
}
