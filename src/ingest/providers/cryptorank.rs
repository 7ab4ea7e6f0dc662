// src/ingest/providers/cryptorank.rs
//! CryptoRank currencies endpoint. Only coins carrying a launch or token-sale
//! date become events.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use super::coinmarketcal::value_to_id;
use crate::config::ProviderConfig;
use crate::ingest::http::HttpSource;
use crate::ingest::normalize::{normalize, RawEvent};
use crate::ingest::types::{Credibility, FetchParams, MarketLink, SourceAdapter, TgeEvent};
use crate::telemetry::SharedTelemetry;

pub const NAME: &str = "cryptorank";
const CURRENCIES_PATH: &str = "/v2/currencies";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Venue {
    Name(String),
    Link {
        name: String,
        #[serde(default)]
        url: Option<String>,
    },
}

impl From<Venue> for MarketLink {
    fn from(v: Venue) -> Self {
        match v {
            Venue::Name(n) => MarketLink::named(n),
            Venue::Link { name, url } => MarketLink { title: name, url },
        }
    }
}

#[derive(Debug, Deserialize)]
struct Chain {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Coin {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    project_name: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    ticker: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    total_raised: Option<f64>,
    #[serde(default)]
    token_price: Option<f64>,
    #[serde(default)]
    blockchain: Option<Chain>,
    #[serde(default)]
    network: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    launch_date: Option<String>,
    #[serde(default)]
    token_sale_start_date: Option<String>,
    #[serde(default)]
    exchanges: Option<Vec<Venue>>,
    #[serde(default)]
    launchpads: Option<Vec<Venue>>,
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    project_website: Option<String>,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

impl Coin {
    /// `None` when the coin has no TGE-relevant date.
    fn into_raw(self) -> Option<RawEvent> {
        let start = non_empty(self.launch_date).or(non_empty(self.token_sale_start_date))?;
        let id = self.id.as_ref().and_then(value_to_id);
        let chain = self.blockchain.and_then(|c| non_empty(c.name));
        let symbol = non_empty(self.symbol).or(non_empty(self.ticker));

        let description = [
            Some(
                non_empty(self.kind)
                    .map(|k| k.to_uppercase())
                    .unwrap_or_else(|| "Token Launch".to_string()),
            ),
            non_empty(self.description).map(|d| format!("Description: {d}")),
            self.total_raised.map(|r| format!("Raised: ${r:.0}")),
            self.token_price.map(|p| format!("Price: ${p}")),
            chain.as_ref().map(|c| format!("Network: {c}")),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" | ");

        let name = non_empty(self.name).or(non_empty(self.project_name)).map(|n| {
            format!("{n} ({})", symbol.as_deref().unwrap_or("TGE"))
        });

        let credibility = match self.status.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("ongoing") | Some("upcoming") => Credibility::Verified,
            _ => Credibility::Rumor,
        };

        let venues = self
            .exchanges
            .filter(|v| !v.is_empty())
            .or(self.launchpads)
            .unwrap_or_default();

        Some(RawEvent {
            id: id.as_ref().map(|i| format!("{NAME}-coin-{i}")),
            name,
            description: Some(description),
            start: Some(start.as_str().into()),
            end: None,
            blockchain: chain
                .or(non_empty(self.network))
                .or_else(|| Some("Multiple".to_string())),
            symbol,
            credibility,
            announcement_url: non_empty(self.website)
                .or(non_empty(self.project_website))
                .or_else(|| id.map(|i| format!("https://cryptorank.io/coin/{i}"))),
            markets: venues.into_iter().map(MarketLink::from).collect(),
        })
    }
}

pub struct CryptoRankAdapter {
    http: HttpSource,
    base_url: String,
    api_key: Option<String>,
    telemetry: SharedTelemetry,
}

impl CryptoRankAdapter {
    pub fn from_config(cfg: &ProviderConfig, telemetry: SharedTelemetry) -> Result<Self> {
        Ok(Self {
            http: HttpSource::new(NAME, cfg.timeout(), cfg.retry_policy())?,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            telemetry,
        })
    }
}

#[async_trait]
impl SourceAdapter for CryptoRankAdapter {
    async fn fetch(&self, _params: &FetchParams) -> Result<Vec<TgeEvent>> {
        let url = format!("{}{}", self.base_url, CURRENCIES_PATH);
        let headers: Vec<(&str, &str)> = self
            .api_key
            .as_deref()
            .map(|k| vec![("X-API-KEY", k)])
            .unwrap_or_default();

        let body = match self.http.get_json(&url, &[], &headers).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(target: "ingest", adapter = NAME, error = %e, "currencies fetch failed");
                return Ok(Vec::new());
            }
        };

        let records = body
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let total = records.len();
        let now = Utc::now();
        let mut undated = 0usize;
        let mut events = Vec::new();
        for rec in records {
            let Ok(coin) = serde_json::from_value::<Coin>(rec) else {
                self.telemetry.record_dropped(NAME, 1);
                continue;
            };
            let Some(raw) = coin.into_raw() else {
                undated += 1;
                continue;
            };
            match normalize(NAME, raw, now) {
                Some(ev) => events.push(ev),
                None => self.telemetry.record_dropped(NAME, 1),
            }
        }

        tracing::debug!(target: "ingest", adapter = NAME, records = total, undated, kept = events.len(), "cryptorank fetched");
        Ok(events)
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
