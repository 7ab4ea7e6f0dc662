// src/ingest/http.rs
//! Shared outbound JSON GET with bounded exponential backoff.

use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("authentication rejected ({0})")]
    Auth(StatusCode),
    #[error("rate limited (429)")]
    RateLimited,
    #[error("upstream returned {0}")]
    Status(StatusCode),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid JSON body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    /// Timeouts, connection failures and 5xx are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport(_) => true,
            FetchError::Status(s) => s.is_server_error(),
            _ => false,
        }
    }

    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchError::Auth(status),
            StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited,
            s => FetchError::Status(s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    /// 3 retries after the first attempt, waiting 2s, 4s, 8s.
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << retry.min(16))
    }
}

/// Thin wrapper around a `reqwest::Client` with a per-call timeout and retry policy.
#[derive(Clone)]
pub struct HttpSource {
    client: Client,
    retry: RetryPolicy,
    adapter: &'static str,
}

impl HttpSource {
    pub fn new(adapter: &'static str, timeout: Duration, retry: RetryPolicy) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("tge-calendar/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4).min(timeout))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            retry,
            adapter,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    async fn get_once(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, &str)],
    ) -> Result<Value, FetchError> {
        let mut req = self
            .client
            .get(url)
            .query(query)
            .header("Accept", "application/json");
        for (k, v) in headers {
            req = req.header(*k, *v);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::from_status(status));
        }
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// GET `url` and decode JSON. Auth and rate-limit errors return at once.
    pub async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, &str)],
    ) -> Result<Value, FetchError> {
        let mut retry: u32 = 0;
        loop {
            match self.get_once(url, query, headers).await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && retry < self.retry.max_retries => {
                    let delay = self.retry.delay_for(retry);
                    tracing::warn!(
                        target: "ingest",
                        adapter = self.adapter,
                        error = %e,
                        retry = retry + 1,
                        delay_ms = delay.as_millis() as u64,
                        "transient upstream error, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
