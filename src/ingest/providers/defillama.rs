// src/ingest/providers/defillama.rs
//! DefiLlama protocol listings. A protocol added recently is treated as a launch.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::coinmarketcal::value_to_id;
use crate::config::ProviderConfig;
use crate::ingest::http::HttpSource;
use crate::ingest::normalize::{normalize, RawDate, RawEvent};
use crate::ingest::types::{Credibility, FetchParams, SourceAdapter, TgeEvent};
use crate::telemetry::SharedTelemetry;

pub const NAME: &str = "defillama";
const PROTOCOLS_PATH: &str = "/protocols";
const RECENT_DAYS: i64 = 30;
const MAX_EVENTS: usize = 15;

#[derive(Debug, Deserialize)]
struct Protocol {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    /// Listing time, unix seconds.
    #[serde(default)]
    date: Option<i64>,
    #[serde(default)]
    chain: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// First four letters of the name, upper-cased.
fn symbol_from_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .take(4)
        .collect::<String>()
        .to_uppercase()
}

fn present(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != "-")
}

impl Protocol {
    fn listed_at(&self) -> Option<DateTime<Utc>> {
        self.date.and_then(|d| DateTime::from_timestamp(d, 0))
    }

    fn into_raw(self) -> RawEvent {
        let name = present(self.name);
        let slug = name.as_ref().map(|n| n.to_lowercase().replace(' ', "-"));
        RawEvent {
            id: self.id.as_ref().and_then(value_to_id).map(|i| format!("{NAME}-{i}")),
            description: Some(format!(
                "New DeFi protocol launch: {}",
                present(self.description).unwrap_or_else(|| "DeFi protocol".to_string())
            )),
            start: self.date.map(RawDate::UnixSeconds),
            end: None,
            blockchain: present(self.chain).or_else(|| Some("Multiple".to_string())),
            symbol: present(self.symbol).or_else(|| name.as_deref().map(symbol_from_name)),
            credibility: Credibility::Verified,
            announcement_url: present(self.url)
                .or_else(|| slug.map(|s| format!("https://defillama.com/protocol/{s}"))),
            markets: Vec::new(),
            name: name.map(|n| format!("{n} Protocol Launch")),
        }
    }
}

pub struct DefiLlamaAdapter {
    http: HttpSource,
    base_url: String,
    telemetry: SharedTelemetry,
}

impl DefiLlamaAdapter {
    pub fn from_config(cfg: &ProviderConfig, telemetry: SharedTelemetry) -> Result<Self> {
        Ok(Self {
            http: HttpSource::new(NAME, cfg.timeout(), cfg.retry_policy())?,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            telemetry,
        })
    }

    /// Protocols listed within the last 30 days, at most 15, in feed order.
    fn recent(&self, records: Vec<Value>, now: DateTime<Utc>) -> Vec<TgeEvent> {
        let cutoff = now - Duration::days(RECENT_DAYS);
        let mut out = Vec::new();
        for rec in records {
            if out.len() >= MAX_EVENTS {
                break;
            }
            let Ok(p) = serde_json::from_value::<Protocol>(rec) else {
                self.telemetry.record_dropped(NAME, 1);
                continue;
            };
            if !p.listed_at().is_some_and(|t| t > cutoff) {
                continue;
            }
            match normalize(NAME, p.into_raw(), now) {
                Some(ev) => out.push(ev),
                None => self.telemetry.record_dropped(NAME, 1),
            }
        }
        out
    }
}

#[async_trait]
impl SourceAdapter for DefiLlamaAdapter {
    async fn fetch(&self, _params: &FetchParams) -> Result<Vec<TgeEvent>> {
        let url = format!("{}{}", self.base_url, PROTOCOLS_PATH);
        let body = match self.http.get_json(&url, &[], &[]).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(target: "ingest", adapter = NAME, error = %e, "protocols fetch failed");
                return Ok(Vec::new());
            }
        };
        let records = match body {
            Value::Array(items) => items,
            _ => {
                tracing::warn!(target: "ingest", adapter = NAME, "unexpected protocols payload shape");
                return Ok(Vec::new());
            }
        };
        let total = records.len();
        let events = self.recent(records, Utc::now());
        tracing::debug!(target: "ingest", adapter = NAME, records = total, kept = events.len(), "defillama fetched");
        Ok(events)
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
