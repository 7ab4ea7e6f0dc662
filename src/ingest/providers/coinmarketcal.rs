// src/ingest/providers/coinmarketcal.rs
//! CoinMarketCal events feed.
//!
//! General-purpose crypto calendar, so results go through the keyword gate.
//! Pages after the first are requested concurrently (capped by `max_pages`);
//! transient errors back off, 401/403/429 give up immediately.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::config::ProviderConfig;
use crate::ingest::http::{FetchError, HttpSource};
use crate::ingest::normalize::{normalize, RawEvent};
use crate::ingest::settle_all;
use crate::ingest::types::{Credibility, FetchParams, SourceAdapter, TgeEvent};
use crate::relevance::KeywordFilter;
use crate::telemetry::SharedTelemetry;

pub const NAME: &str = "coinmarketcal";
const EVENTS_PATH: &str = "/v1/events";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LocalizedText {
    Plain(String),
    Localized(BTreeMap<String, String>),
}

impl LocalizedText {
    fn resolve(self) -> Option<String> {
        match self {
            LocalizedText::Plain(s) => Some(s),
            LocalizedText::Localized(mut m) => m.remove("en").or_else(|| m.into_values().next()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CmcCoin {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    platform: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CmcEvent {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    title: Option<LocalizedText>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<LocalizedText>,
    #[serde(default)]
    date_event: Option<String>,
    #[serde(default)]
    created_date: Option<String>,
    #[serde(default)]
    date_end: Option<String>,
    #[serde(default)]
    proof: Option<Value>,
    #[serde(default)]
    important: Option<Value>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    coins: Option<Vec<CmcCoin>>,
}

/// `true`, a positive number or a non-empty string.
fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|x| x > 0.0),
        Value::String(s) => !s.trim().is_empty(),
        _ => false,
    }
}

pub(crate) fn value_to_id(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl CmcEvent {
    fn into_raw(self) -> RawEvent {
        let verified = self.proof.as_ref().is_some_and(truthy)
            || self.important.as_ref().is_some_and(truthy);
        let coin = self.coins.and_then(|c| c.into_iter().next());
        let (symbol, blockchain) = match coin {
            Some(c) => (c.symbol, c.platform.or(c.name)),
            None => (None, None),
        };
        RawEvent {
            id: self
                .id
                .as_ref()
                .and_then(value_to_id)
                .map(|id| format!("{NAME}-{id}")),
            name: self.title.and_then(LocalizedText::resolve).or(self.name),
            description: self.description.and_then(LocalizedText::resolve),
            start: self.date_event.or(self.created_date).map(|d| d.as_str().into()),
            end: self.date_end.map(|d| d.as_str().into()),
            blockchain,
            symbol,
            credibility: if verified {
                Credibility::Verified
            } else {
                Credibility::Rumor
            },
            announcement_url: self.source,
            markets: Vec::new(),
        }
    }
}

/// Records live under `body` (array) or `body.result`.
fn records_of(page: &Value) -> Vec<Value> {
    let body = page.get("body");
    body.and_then(Value::as_array)
        .or_else(|| body.and_then(|b| b.get("result")).and_then(Value::as_array))
        .cloned()
        .unwrap_or_default()
}

/// Reported page count, from `_metadata`/`meta` (`page_count`, or `total_count / max`).
fn page_count(page: &Value) -> u32 {
    let meta = page.get("_metadata").or_else(|| page.get("meta"));
    let Some(meta) = meta else { return 1 };
    if let Some(n) = meta.get("page_count").and_then(Value::as_u64) {
        return n.clamp(1, u32::MAX as u64) as u32;
    }
    let total = meta.get("total_count").or_else(|| meta.get("total")).and_then(Value::as_u64);
    let per = meta.get("max").or_else(|| meta.get("limit")).and_then(Value::as_u64);
    match (total, per) {
        (Some(t), Some(p)) if p > 0 => t.div_ceil(p).clamp(1, u32::MAX as u64) as u32,
        _ => 1,
    }
}

pub struct CoinMarketCalAdapter {
    http: HttpSource,
    base_url: String,
    api_key: Option<String>,
    keywords: KeywordFilter,
    max_pages: u32,
    page_size: u32,
    telemetry: SharedTelemetry,
}

impl CoinMarketCalAdapter {
    pub fn from_config(
        cfg: &ProviderConfig,
        keywords: KeywordFilter,
        telemetry: SharedTelemetry,
    ) -> Result<Self> {
        Ok(Self {
            http: HttpSource::new(NAME, cfg.timeout(), cfg.retry_policy())?,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            keywords,
            max_pages: cfg.max_pages.unwrap_or(10).max(1),
            page_size: cfg.page_size.unwrap_or(50).max(1),
            telemetry,
        })
    }

    fn page_future(
        &self,
        page: u32,
        key: &str,
        params: &FetchParams,
    ) -> impl std::future::Future<Output = Result<Value, FetchError>> + Send + 'static {
        let http = self.http.clone();
        let url = format!("{}{}", self.base_url, EVENTS_PATH);
        let key = key.to_string();
        let mut query = vec![
            ("page", page.to_string()),
            ("max", self.page_size.to_string()),
            ("sortBy", "hot_events".to_string()),
            ("showMetaData", "true".to_string()),
        ];
        if let Some(f) = params.from {
            query.push(("dateRangeStart", f.format("%Y-%m-%d").to_string()));
        }
        if let Some(t) = params.to {
            query.push(("dateRangeEnd", t.format("%Y-%m-%d").to_string()));
        }
        async move { http.get_json(&url, &query, &[("x-api-key", key.as_str())]).await }
    }

    fn log_failure(&self, page: u32, e: &FetchError) {
        match e {
            FetchError::Auth(status) => tracing::warn!(
                target: "ingest", adapter = NAME, page, %status,
                "authentication rejected, not retrying"
            ),
            FetchError::RateLimited => tracing::warn!(
                target: "ingest", adapter = NAME, page,
                "rate limited, not retrying"
            ),
            other => tracing::warn!(
                target: "ingest", adapter = NAME, page, error = %other,
                "page fetch failed"
            ),
        }
    }
}

#[async_trait]
impl SourceAdapter for CoinMarketCalAdapter {
    async fn fetch(&self, params: &FetchParams) -> Result<Vec<TgeEvent>> {
        let Some(key) = self.api_key.as_deref() else {
            tracing::info!(target: "ingest", adapter = NAME, "no API key configured, skipping");
            return Ok(Vec::new());
        };

        let first = match self.page_future(1, key, params).await {
            Ok(v) => v,
            Err(e) => {
                self.log_failure(1, &e);
                return Ok(Vec::new());
            }
        };

        let mut records = records_of(&first);
        let pages = page_count(&first).min(self.max_pages);
        if pages > 1 {
            let rest: Vec<_> = (2..=pages).map(|p| self.page_future(p, key, params)).collect();
            for (page, settled) in (2..=pages).zip(settle_all(rest).await) {
                match settled {
                    Ok(Ok(v)) => records.extend(records_of(&v)),
                    Ok(Err(e)) => self.log_failure(page, &e),
                    Err(e) => tracing::warn!(target: "ingest", adapter = NAME, page, error = %e, "page task aborted"),
                }
            }
        }

        let now = Utc::now();
        let total = records.len();
        let mut events: Vec<TgeEvent> = records
            .into_iter()
            .filter_map(|r| serde_json::from_value::<CmcEvent>(r).ok())
            .filter_map(|e| normalize(NAME, e.into_raw(), now))
            .collect();
        let dropped = total - events.len();
        if dropped > 0 {
            self.telemetry.record_dropped(NAME, dropped);
        }
        let off_topic = self.keywords.apply(&mut events);

        tracing::debug!(
            target: "ingest",
            adapter = NAME,
            pages,
            records = total,
            dropped,
            off_topic,
            kept = events.len(),
            "coinmarketcal fetched"
        );
        Ok(events)
    }

    fn name(&self) -> &'static str {
        NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_localized_title_first_coin_and_proof() {
        let raw: CmcEvent = serde_json::from_value(json!({
            "id": 981,
            "title": {"en": "Foo Mainnet Launch", "de": "Foo Mainnet Start"},
            "date_event": "2025-09-20T00:00:00Z",
            "proof": "https://proof.example/x.png",
            "coins": [{"name": "Foo", "symbol": "foo", "platform": "Solana"}, {"symbol": "BAR"}]
        }))
        .unwrap();
        let ev = normalize(NAME, raw.into_raw(), Utc::now()).unwrap();
        assert_eq!(ev.id, "coinmarketcal-981");
        assert_eq!(ev.name, "Foo Mainnet Launch");
        assert_eq!(ev.symbol.as_deref(), Some("FOO"));
        assert_eq!(ev.blockchain.as_deref(), Some("Solana"));
        assert_eq!(ev.credibility, Credibility::Verified);
    }

    #[test]
    fn importance_flag_numeric_or_boolean() {
        let mk = |important: Value| -> Credibility {
            let raw: CmcEvent = serde_json::from_value(json!({
                "title": "x", "date_event": "2025-09-20", "important": important
            }))
            .unwrap();
            raw.into_raw().credibility
        };
        assert_eq!(mk(json!(1)), Credibility::Verified);
        assert_eq!(mk(json!(true)), Credibility::Verified);
        assert_eq!(mk(json!(0)), Credibility::Rumor);
        assert_eq!(mk(json!(false)), Credibility::Rumor);
    }

    #[test]
    fn page_count_from_metadata_variants() {
        assert_eq!(page_count(&json!({"body": []})), 1);
        assert_eq!(page_count(&json!({"_metadata": {"page_count": 4}})), 4);
        assert_eq!(page_count(&json!({"meta": {"total": 120, "limit": 50}})), 3);
    }

    #[test]
    fn records_under_body_or_result() {
        assert_eq!(records_of(&json!({"body": [1, 2]})).len(), 2);
        assert_eq!(records_of(&json!({"body": {"result": [1]}})).len(), 1);
        assert!(records_of(&json!({"error": "x"})).is_empty());
    }
}
