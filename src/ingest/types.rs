// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse confidence in an event's accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Credibility {
    Verified,
    Unverified,
    Rumor,
}

impl Credibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Credibility::Verified => "verified",
            Credibility::Unverified => "unverified",
            Credibility::Rumor => "rumor",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "verified" => Some(Credibility::Verified),
            "unverified" => Some(Credibility::Unverified),
            "rumor" | "rumour" => Some(Credibility::Rumor),
            _ => None,
        }
    }
}

impl std::fmt::Display for Credibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Market link attached to an event (exchange, launchpad, prediction market).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketLink {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl MarketLink {
    pub fn named(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: None,
        }
    }
}

/// Canonical TGE record shared by every source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TgeEvent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub start_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockchain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub credibility: Credibility,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub announcement_url: Option<String>,
    #[serde(default)]
    pub markets: Vec<MarketLink>,
}

/// Inclusive time window passed to adapters and the aggregator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchParams {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl FetchParams {
    pub fn window(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.from.map_or(true, |f| ts >= f) && self.to.map_or(true, |t| ts <= t)
    }
}

/// One external provider. Implementations catch their own network and parse
/// failures and return `Ok(vec![])`; an `Err` is treated as a rejected source.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch(&self, params: &FetchParams) -> Result<Vec<TgeEvent>>;
    fn name(&self) -> &'static str;
}
