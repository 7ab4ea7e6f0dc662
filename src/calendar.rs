//! # Calendar
//! Query facade used by the HTTP layer.
//!
//! A period request is answered from the [`PeriodCache`] when fresh.
//! Otherwise the aggregator runs, the result is cached and indexed, and the
//! neighbouring months are preloaded in the background. An empty result is
//! cached like any other so the month is not fanned out again until it
//! expires. The caller always gets a list: if aggregation fails or the month
//! holds nothing, a small synthetic dataset for it is returned instead.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::cache::{CacheStats, CachedPeriodInfo, PeriodCache};
use crate::ingest::types::{Credibility, MarketLink, TgeEvent};
use crate::ingest::EventFetcher;
use crate::period::Period;
use crate::scheduler::{BackgroundScheduler, DeadLetter};
use crate::search::{Facets, SearchAnalytics, SearchOptions, SearchService, Suggestion};
use crate::store::{SearchFilters, SearchResult, SearchStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Cache,
    Fresh,
    Synthetic,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventsPage {
    pub events: Vec<TgeEvent>,
    pub total: usize,
    pub period: Period,
    pub origin: Origin,
}

impl EventsPage {
    fn new(period: Period, events: Vec<TgeEvent>, origin: Origin) -> Self {
        Self {
            total: events.len(),
            events,
            period,
            origin,
        }
    }
}

pub struct Calendar {
    fetcher: Arc<dyn EventFetcher>,
    cache: Arc<PeriodCache>,
    search: SearchService,
    scheduler: BackgroundScheduler,
}

impl Calendar {
    pub fn new(
        fetcher: Arc<dyn EventFetcher>,
        cache: Arc<PeriodCache>,
        search: SearchService,
        scheduler: BackgroundScheduler,
    ) -> Self {
        Self {
            fetcher,
            cache,
            search,
            scheduler,
        }
    }

    pub fn cache(&self) -> &Arc<PeriodCache> {
        &self.cache
    }

    pub fn store(&self) -> &Arc<SearchStore> {
        self.search.store()
    }

    pub fn scheduler(&self) -> &BackgroundScheduler {
        &self.scheduler
    }

    /// Load the persisted event snapshot and search history. Problems are
    /// logged; the calendar starts empty in that case.
    pub fn restore(&self) {
        match self.store().load() {
            Ok(n) => tracing::info!(target: "calendar", events = n, "search store loaded"),
            Err(e) => tracing::warn!(target: "calendar", error = ?e, "search store snapshot unreadable"),
        }
        if let Err(e) = self.search.load_history() {
            tracing::warn!(target: "calendar", error = ?e, "search history unreadable");
        }
    }

    pub async fn get_events_for_date(&self, date: DateTime<Utc>) -> EventsPage {
        self.get_events_for_period(Period::containing(date)).await
    }

    pub async fn get_events_for_period(&self, period: Period) -> EventsPage {
        if let Some(events) = self.cache.get(period) {
            tracing::debug!(target: "calendar", period = %period, events = events.len(), "served from cache");
            self.schedule_preload(period);
            if events.is_empty() {
                return EventsPage::new(period, synthetic_events(period), Origin::Synthetic);
            }
            return EventsPage::new(period, events, Origin::Cache);
        }

        match self.fetcher.fetch_all(&period.fetch_params()).await {
            Ok(events) => {
                self.cache.put(period, events.clone());
                self.cache.evict_expired();
                self.schedule_preload(period);
                if events.is_empty() {
                    tracing::warn!(target: "calendar", period = %period, "no events from any source, serving synthetic data");
                    return EventsPage::new(period, synthetic_events(period), Origin::Synthetic);
                }
                self.store().add_events(events.clone());
                tracing::info!(target: "calendar", period = %period, events = events.len(), "period aggregated");
                EventsPage::new(period, events, Origin::Fresh)
            }
            Err(e) => {
                tracing::error!(target: "calendar", period = %period, error = ?e, "aggregation failed, serving synthetic data");
                EventsPage::new(period, synthetic_events(period), Origin::Synthetic)
            }
        }
    }

    fn schedule_preload(&self, period: Period) {
        let cache = Arc::clone(&self.cache);
        let fetcher = Arc::clone(&self.fetcher);
        self.scheduler.submit(format!("preload-neighbors:{period}"), async move {
            let report = cache
                .preload_neighbors(period, |p| {
                    let fetcher = Arc::clone(&fetcher);
                    async move { fetcher.fetch_all(&p.fetch_params()).await }
                })
                .await;
            if report.failed.is_empty() {
                Ok(())
            } else {
                let keys: Vec<String> = report.failed.iter().map(Period::key).collect();
                Err(anyhow::anyhow!("preload failed for {}", keys.join(", ")))
            }
        });
    }

    pub fn search(&self, query: &str, filters: SearchFilters, options: SearchOptions) -> SearchResult {
        self.search.search(query, filters, options)
    }

    pub fn suggestions(&self, query: &str, limit: usize) -> Vec<Suggestion> {
        self.search.suggestions(query, limit)
    }

    pub fn search_history(&self) -> Vec<String> {
        self.search.history()
    }

    pub fn clear_search_history(&self) {
        self.search.clear_history()
    }

    pub fn facets(&self) -> Facets {
        self.search.facets()
    }

    pub fn search_analytics(&self) -> SearchAnalytics {
        self.search.analytics()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cached_periods(&self) -> Vec<CachedPeriodInfo> {
        self.cache.cached_periods()
    }

    pub fn clear_expired(&self) -> usize {
        self.cache.evict_expired()
    }

    pub fn clear_all(&self) {
        self.cache.clear_all()
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.scheduler.dead_letters()
    }
}

const SYNTHETIC: &[(i64, &str, &str, &str, &str, Credibility, &[&str])] = &[
    (2, "Sample Layer 2 Token", "L2S", "Ethereum", "Layer 2 scaling launch", Credibility::Unverified, &["Uniswap"]),
    (5, "Sample DeFi Protocol", "SDP", "Solana", "DeFi lending protocol TGE", Credibility::Rumor, &["Raydium"]),
    (7, "Sample Gaming Token", "SGT", "Polygon", "Gaming and NFT ecosystem token", Credibility::Unverified, &["KuCoin"]),
    (10, "Sample Infrastructure Token", "SIT", "Arbitrum", "Rollup infrastructure mainnet", Credibility::Rumor, &[]),
    (14, "Sample Governance Token", "SGV", "Base", "DAO governance token listing", Credibility::Unverified, &["Coinbase"]),
    (21, "Sample Exchange Listing", "SEL", "Ethereum", "Exchange listing announcement", Credibility::Rumor, &["Binance"]),
];

/// Placeholder events inside `period`, used when no real data is available.
pub fn synthetic_events(period: Period) -> Vec<TgeEvent> {
    let start = period.start();
    SYNTHETIC
        .iter()
        .enumerate()
        .map(|(i, (offset, name, symbol, chain, desc, cred, markets))| TgeEvent {
            id: format!("mock-{}-{}", period.key(), i + 1),
            name: (*name).to_string(),
            description: (*desc).to_string(),
            start_date: start + Duration::days(*offset),
            end_date: None,
            blockchain: Some((*chain).to_string()),
            symbol: Some((*symbol).to_string()),
            credibility: *cred,
            announcement_url: None,
            markets: markets.iter().map(|m| MarketLink::named(*m)).collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_events_stay_inside_the_month() {
        for (y, m) in [(2025, 2), (2025, 9), (2024, 12)] {
            let p = Period::new(y, m).unwrap();
            let evs = synthetic_events(p);
            assert_eq!(evs.len(), 6);
            assert!(evs.iter().all(|e| p.contains(e.start_date)));
            assert!(evs.windows(2).all(|w| w[0].start_date <= w[1].start_date));
        }
    }
}
