// src/relevance.rs
//! Keyword relevance gate for general-purpose event feeds.
//!
//! A record passes when its combined name, description and blockchain text
//! contains at least one configured keyword (case-insensitive substring).

use crate::ingest::types::TgeEvent;

pub const DEFAULT_KEYWORDS: &[&str] = &[
    "tge",
    "token generation",
    "token launch",
    "listing",
    "listed",
    "launch",
    "mainnet",
    "airdrop",
    "binance",
    "coinbase",
    "kucoin",
    "bybit",
    "okx",
    "gate.io",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordFilter {
    keywords: Vec<String>,
}

impl Default for KeywordFilter {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORDS.iter().map(|s| s.to_string()))
    }
}

impl KeywordFilter {
    pub fn new<I: IntoIterator<Item = String>>(keywords: I) -> Self {
        let mut keywords: Vec<String> = keywords
            .into_iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        keywords.sort();
        keywords.dedup();
        Self { keywords }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Empty keyword list lets everything through.
    pub fn is_relevant(&self, ev: &TgeEvent) -> bool {
        if self.keywords.is_empty() {
            return true;
        }
        let haystack = format!(
            "{} {} {}",
            ev.name,
            ev.description,
            ev.blockchain.as_deref().unwrap_or_default()
        )
        .to_lowercase();
        self.keywords.iter().any(|k| haystack.contains(k.as_str()))
    }

    /// Retain relevant events; returns how many were removed.
    pub fn apply(&self, events: &mut Vec<TgeEvent>) -> usize {
        let before = events.len();
        events.retain(|e| self.is_relevant(e));
        before - events.len()
    }
}
