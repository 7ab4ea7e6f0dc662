//! # Telemetry
//! Counters emitted by the aggregation pipeline and the period cache.
//!
//! The sink is passed in as a collaborator: production wiring uses
//! [`MetricsTelemetry`] (Prometheus via the `metrics` facade), tests use
//! [`CountingTelemetry`] and read the numbers back.

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterOutcome {
    Ok,
    Empty,
    Failed,
}

impl AdapterOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterOutcome::Ok => "ok",
            AdapterOutcome::Empty => "empty",
            AdapterOutcome::Failed => "failed",
        }
    }
}

pub trait Telemetry: Send + Sync {
    fn adapter_outcome(&self, adapter: &str, outcome: AdapterOutcome, events: usize);
    fn cache_lookup(&self, period: &str, hit: bool);
    fn dedup_collisions(&self, count: usize);
    fn record_dropped(&self, adapter: &str, count: usize);
    fn preload_failed(&self, period: &str);
}

pub type SharedTelemetry = Arc<dyn Telemetry>;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "tge_adapter_fetch_total",
            "Source adapter calls by adapter and outcome."
        );
        describe_counter!(
            "tge_adapter_events_total",
            "Events returned by source adapters."
        );
        describe_counter!(
            "tge_cache_lookups_total",
            "Period cache lookups by result (hit/miss)."
        );
        describe_counter!(
            "tge_dedup_collisions_total",
            "Events removed by name+day deduplication."
        );
        describe_counter!(
            "tge_records_dropped_total",
            "Provider records dropped during mapping."
        );
        describe_counter!(
            "tge_preload_failures_total",
            "Neighbouring period preloads that failed."
        );
    });
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsTelemetry;

impl MetricsTelemetry {
    pub fn shared() -> SharedTelemetry {
        ensure_metrics_described();
        Arc::new(MetricsTelemetry)
    }
}

impl Telemetry for MetricsTelemetry {
    fn adapter_outcome(&self, adapter: &str, outcome: AdapterOutcome, events: usize) {
        counter!(
            "tge_adapter_fetch_total",
            "adapter" => adapter.to_string(),
            "outcome" => outcome.as_str()
        )
        .increment(1);
        counter!("tge_adapter_events_total", "adapter" => adapter.to_string())
            .increment(events as u64);
    }

    fn cache_lookup(&self, _period: &str, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        counter!("tge_cache_lookups_total", "result" => result).increment(1);
    }

    fn dedup_collisions(&self, count: usize) {
        counter!("tge_dedup_collisions_total").increment(count as u64);
    }

    fn record_dropped(&self, adapter: &str, count: usize) {
        counter!("tge_records_dropped_total", "adapter" => adapter.to_string())
            .increment(count as u64);
    }

    fn preload_failed(&self, _period: &str) {
        counter!("tge_preload_failures_total").increment(1);
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub adapter_outcomes: HashMap<(String, AdapterOutcome), u64>,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub dedup_collisions: u64,
    pub dropped_records: u64,
    pub preload_failures: u64,
}

impl TelemetrySnapshot {
    pub fn outcome(&self, adapter: &str, outcome: AdapterOutcome) -> u64 {
        self.adapter_outcomes
            .get(&(adapter.to_string(), outcome))
            .copied()
            .unwrap_or(0)
    }
}

/// In-process counters; cheap to clone and inspect.
#[derive(Debug, Default, Clone)]
pub struct CountingTelemetry {
    inner: Arc<Mutex<TelemetrySnapshot>>,
}

impl CountingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TelemetrySnapshot> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Telemetry for CountingTelemetry {
    fn adapter_outcome(&self, adapter: &str, outcome: AdapterOutcome, _events: usize) {
        *self
            .lock()
            .adapter_outcomes
            .entry((adapter.to_string(), outcome))
            .or_default() += 1;
    }

    fn cache_lookup(&self, _period: &str, hit: bool) {
        let mut g = self.lock();
        if hit {
            g.cache_hits += 1;
        } else {
            g.cache_misses += 1;
        }
    }

    fn dedup_collisions(&self, count: usize) {
        self.lock().dedup_collisions += count as u64;
    }

    fn record_dropped(&self, _adapter: &str, count: usize) {
        self.lock().dropped_records += count as u64;
    }

    fn preload_failed(&self, _period: &str) {
        self.lock().preload_failures += 1;
    }
}
