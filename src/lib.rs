// src/lib.rs
// Public library surface for the binary and the integration tests.

pub mod api;
pub mod cache;
pub mod calendar;
pub mod config;
pub mod history;
pub mod ingest;
pub mod metrics;
pub mod period;
pub mod persist;
pub mod relevance;
pub mod scheduler;
pub mod search;
pub mod store;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::calendar::{Calendar, EventsPage, Origin};
pub use crate::ingest::types::{Credibility, FetchParams, MarketLink, SourceAdapter, TgeEvent};
pub use crate::period::Period;

use std::sync::Arc;

use axum::Router;

use crate::cache::PeriodCache;
use crate::config::AppConfig;
use crate::history::{SearchHistory, MAX_HISTORY};
use crate::ingest::providers::{build_adapters, CommunityAdapter};
use crate::ingest::Aggregator;
use crate::persist::{FileKvStore, SharedKv};
use crate::scheduler::BackgroundScheduler;
use crate::search::SearchService;
use crate::store::SearchStore;
use crate::telemetry::{MetricsTelemetry, SharedTelemetry};

/// Composition root: adapters -> aggregator -> cache/store -> calendar.
/// `kv` backs the search store and history; `None` keeps them in memory.
pub fn build_calendar(
    cfg: &AppConfig,
    telemetry: SharedTelemetry,
    kv: Option<SharedKv>,
) -> anyhow::Result<Calendar> {
    let adapters = build_adapters(&cfg.sources, &cfg.keywords, &telemetry)?;
    let aggregator = Aggregator::new(adapters, Arc::clone(&telemetry))
        .with_fallback(Arc::new(CommunityAdapter));
    tracing::info!(target: "calendar", adapters = ?aggregator.adapter_names(), "aggregator ready");

    let (store, history) = match kv {
        Some(kv) => (
            SearchStore::with_kv(Arc::clone(&kv)),
            SearchHistory::persisted(MAX_HISTORY, kv),
        ),
        None => (SearchStore::in_memory(), SearchHistory::default()),
    };

    Ok(Calendar::new(
        Arc::new(aggregator),
        Arc::new(PeriodCache::new(cfg.cache, telemetry)),
        SearchService::new(Arc::new(store), history),
        BackgroundScheduler::new(),
    ))
}

/// Full in-process application: config from env, Prometheus metrics,
/// persisted search state, eviction ticker and the HTTP router.
pub async fn app() -> anyhow::Result<Router> {
    let cfg = AppConfig::from_env()?;
    let metrics = crate::metrics::Metrics::global(cfg.cache.ttl.as_millis() as u64)?;

    let kv: SharedKv = Arc::new(FileKvStore::new(&cfg.data_dir)?);
    let calendar = Arc::new(build_calendar(&cfg, MetricsTelemetry::shared(), Some(kv))?);
    calendar.restore();

    scheduler::spawn_eviction_ticker(Arc::clone(calendar.cache()), cfg.eviction_interval);

    Ok(router(AppState { calendar }).merge(metrics.router()))
}
