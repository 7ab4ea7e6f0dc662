// src/ingest/mod.rs
pub mod http;
pub mod normalize;
pub mod providers;
pub mod types;

use crate::ingest::normalize::dedup_key;
use crate::ingest::types::{FetchParams, SourceAdapter, TgeEvent};
use crate::telemetry::{AdapterOutcome, SharedTelemetry};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinError;

/// Normalize text: decode entities, strip tags, collapse whitespace, trim,
/// strip stray trailing punctuation.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    // 5) Strip trailing sentence punctuation (keep quotes)
    while let Some(last) = out.chars().last() {
        if matches!(last, '!' | '?' | ',') {
            out.pop();
        } else {
            break;
        }
    }

    // 6) Length cap: 1500 chars
    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }

    out
}

/// Spawn every future before awaiting any of them, then collect all
/// outcomes in submission order. A panicking task shows up as `Err`.
pub async fn settle_all<F, T>(futures: Vec<F>) -> Vec<Result<T, JoinError>>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let handles: Vec<_> = futures.into_iter().map(tokio::spawn).collect();
    let mut out = Vec::with_capacity(handles.len());
    for h in handles {
        out.push(h.await);
    }
    out
}

/// Keep the first event per (folded name, UTC day). Returns survivors in
/// input order plus the number of collisions.
pub fn dedup_events(events: Vec<TgeEvent>) -> (Vec<TgeEvent>, usize) {
    let mut seen: HashSet<String> = HashSet::with_capacity(events.len());
    let mut keep = Vec::with_capacity(events.len());
    let mut dropped = 0usize;
    for ev in events {
        if seen.insert(dedup_key(&ev)) {
            keep.push(ev);
        } else {
            dropped += 1;
        }
    }
    (keep, dropped)
}

/// Stable ascending sort by start date.
pub fn sort_by_start(events: &mut [TgeEvent]) {
    events.sort_by_key(|e| e.start_date);
}

/// Anything that can produce a merged event list for a window.
#[async_trait::async_trait]
pub trait EventFetcher: Send + Sync {
    async fn fetch_all(&self, params: &FetchParams) -> anyhow::Result<Vec<TgeEvent>>;
}

/// Fans out to every adapter, merges, deduplicates and sorts.
pub struct Aggregator {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    fallback: Option<Arc<dyn SourceAdapter>>,
    telemetry: SharedTelemetry,
}

impl Aggregator {
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>, telemetry: SharedTelemetry) -> Self {
        Self {
            adapters,
            fallback: None,
            telemetry,
        }
    }

    /// Source consulted when every adapter comes back empty.
    pub fn with_fallback(mut self, fallback: Arc<dyn SourceAdapter>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn adapter_names(&self) -> Vec<&'static str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    async fn collect(&self, params: &FetchParams) -> Vec<TgeEvent> {
        let futures: Vec<_> = self
            .adapters
            .iter()
            .map(|a| {
                let a = Arc::clone(a);
                let p = *params;
                async move { a.fetch(&p).await }
            })
            .collect();

        let mut all = Vec::new();
        for (adapter, settled) in self.adapters.iter().zip(settle_all(futures).await) {
            let name = adapter.name();
            match settled {
                Ok(Ok(mut events)) => {
                    let outcome = if events.is_empty() {
                        AdapterOutcome::Empty
                    } else {
                        AdapterOutcome::Ok
                    };
                    self.telemetry.adapter_outcome(name, outcome, events.len());
                    tracing::debug!(target: "ingest", adapter = name, events = events.len(), "adapter settled");
                    all.append(&mut events);
                }
                Ok(Err(e)) => {
                    tracing::warn!(target: "ingest", error = ?e, adapter = name, "adapter rejected");
                    self.telemetry.adapter_outcome(name, AdapterOutcome::Failed, 0);
                }
                Err(e) => {
                    tracing::error!(target: "ingest", error = %e, adapter = name, "adapter task aborted");
                    self.telemetry.adapter_outcome(name, AdapterOutcome::Failed, 0);
                }
            }
        }
        all
    }

    /// Never fails: a source that errors contributes nothing.
    pub async fn aggregate(&self, params: &FetchParams) -> Vec<TgeEvent> {
        let mut all = self.collect(params).await;

        if all.is_empty() {
            if let Some(fb) = &self.fallback {
                tracing::info!(target: "ingest", adapter = fb.name(), "no events from any source, using fallback");
                match fb.fetch(params).await {
                    Ok(events) => all = events,
                    Err(e) => {
                        tracing::warn!(target: "ingest", error = ?e, adapter = fb.name(), "fallback failed")
                    }
                }
            }
        }

        let (mut kept, collisions) = dedup_events(all);
        if collisions > 0 {
            self.telemetry.dedup_collisions(collisions);
        }
        if params.is_bounded() {
            kept.retain(|e| params.contains(e.start_date));
        }
        sort_by_start(&mut kept);

        tracing::info!(
            target: "ingest",
            kept = kept.len(),
            dedup = collisions,
            "aggregation finished"
        );
        kept
    }
}

#[async_trait::async_trait]
impl EventFetcher for Aggregator {
    async fn fetch_all(&self, params: &FetchParams) -> anyhow::Result<Vec<TgeEvent>> {
        Ok(self.aggregate(params).await)
    }
}
