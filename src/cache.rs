//! # Period cache
//! Aggregated events keyed by calendar month.
//!
//! Entries expire `ttl` after they were written and are purged lazily on
//! read (or by [`PeriodCache::evict_expired`]). When a new period would push
//! the cache past `max_entries`, the single oldest-inserted entry goes first.
//! Purely in-memory; rebuilt every process start.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::ingest::types::TgeEvent;
use crate::period::Period;
use crate::telemetry::SharedTelemetry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    /// 30 minutes, two years of months.
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30 * 60),
            max_entries: 24,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    events: Vec<TgeEvent>,
    cached_at: DateTime<Utc>,
    seq: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<Period, Entry>,
    seq: u64,
    hits: u64,
    misses: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    pub total_events: usize,
    pub hits: u64,
    pub misses: u64,
    /// hits / (hits + misses), 0 before the first lookup.
    pub hit_rate: f64,
    pub oldest: Option<Period>,
    pub newest: Option<Period>,
    pub ttl_ms: u64,
    pub max_entries: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CachedPeriodInfo {
    pub period: Period,
    pub events: usize,
    pub cached_at: DateTime<Utc>,
    pub fresh: bool,
}

/// Outcome of [`PeriodCache::preload_neighbors`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreloadReport {
    pub loaded: Vec<Period>,
    /// Already fresh, not fetched.
    pub skipped: Vec<Period>,
    /// Fetched but nothing came back; cached as empty.
    pub empty: Vec<Period>,
    pub failed: Vec<Period>,
}

pub struct PeriodCache {
    cfg: CacheConfig,
    inner: Mutex<Inner>,
    telemetry: SharedTelemetry,
}

impl PeriodCache {
    pub fn new(cfg: CacheConfig, telemetry: SharedTelemetry) -> Self {
        Self {
            cfg,
            inner: Mutex::new(Inner::default()),
            telemetry,
        }
    }

    pub fn config(&self) -> CacheConfig {
        self.cfg
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn fresh_at(&self, entry: &Entry, now: DateTime<Utc>) -> bool {
        // A clock that went backwards leaves the entry fresh.
        now.signed_duration_since(entry.cached_at)
            .to_std()
            .map_or(true, |age| age < self.cfg.ttl)
    }

    pub fn get(&self, period: Period) -> Option<Vec<TgeEvent>> {
        self.get_at(period, Utc::now())
    }

    /// Fresh events for `period`; a stale entry is removed.
    pub fn get_at(&self, period: Period, now: DateTime<Utc>) -> Option<Vec<TgeEvent>> {
        let mut g = self.lock();
        let hit = match g.entries.get(&period) {
            Some(e) if self.fresh_at(e, now) => Some(e.events.clone()),
            Some(_) => {
                g.entries.remove(&period);
                tracing::debug!(target: "cache", period = %period, "stale entry purged on read");
                None
            }
            None => None,
        };
        if hit.is_some() {
            g.hits += 1;
        } else {
            g.misses += 1;
        }
        drop(g);
        self.telemetry.cache_lookup(&period.key(), hit.is_some());
        hit
    }

    pub fn put(&self, period: Period, events: Vec<TgeEvent>) {
        self.put_at(period, events, Utc::now())
    }

    /// Store `events` for `period`, replacing any previous entry.
    pub fn put_at(&self, period: Period, events: Vec<TgeEvent>, now: DateTime<Utc>) {
        let mut g = self.lock();
        if !g.entries.contains_key(&period) && g.entries.len() >= self.cfg.max_entries {
            let oldest = g
                .entries
                .iter()
                .min_by_key(|(_, e)| e.seq)
                .map(|(p, _)| *p);
            if let Some(p) = oldest {
                g.entries.remove(&p);
                tracing::debug!(target: "cache", evicted = %p, "capacity reached, oldest period evicted");
            }
        }
        g.seq += 1;
        let seq = g.seq;
        let count = events.len();
        g.entries.insert(
            period,
            Entry {
                events,
                cached_at: now,
                seq,
            },
        );
        tracing::debug!(target: "cache", period = %period, events = count, "period cached");
    }

    pub fn is_fresh(&self, period: Period) -> bool {
        self.is_fresh_at(period, Utc::now())
    }

    /// Freshness check with no side effects.
    pub fn is_fresh_at(&self, period: Period, now: DateTime<Utc>) -> bool {
        self.lock()
            .entries
            .get(&period)
            .is_some_and(|e| self.fresh_at(e, now))
    }

    pub fn evict_expired(&self) -> usize {
        self.evict_expired_at(Utc::now())
    }

    /// Drop every entry past its TTL; returns how many went.
    pub fn evict_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut g = self.lock();
        let before = g.entries.len();
        g.entries.retain(|_, e| self.fresh_at(e, now));
        let removed = before - g.entries.len();
        if removed > 0 {
            tracing::info!(target: "cache", removed, remaining = g.entries.len(), "expired periods evicted");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.stats_at(Utc::now())
    }

    pub fn stats_at(&self, now: DateTime<Utc>) -> CacheStats {
        let g = self.lock();
        let valid = g.entries.values().filter(|e| self.fresh_at(e, now)).count();
        let oldest = g.entries.iter().min_by_key(|(_, e)| e.seq).map(|(p, _)| *p);
        let newest = g.entries.iter().max_by_key(|(_, e)| e.seq).map(|(p, _)| *p);
        let lookups = g.hits + g.misses;
        CacheStats {
            total_entries: g.entries.len(),
            valid_entries: valid,
            expired_entries: g.entries.len() - valid,
            total_events: g.entries.values().map(|e| e.events.len()).sum(),
            hits: g.hits,
            misses: g.misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                g.hits as f64 / lookups as f64
            },
            oldest,
            newest,
            ttl_ms: self.cfg.ttl.as_millis() as u64,
            max_entries: self.cfg.max_entries,
        }
    }

    /// Cached periods, oldest-inserted first.
    pub fn cached_periods(&self) -> Vec<CachedPeriodInfo> {
        let now = Utc::now();
        let g = self.lock();
        let mut rows: Vec<_> = g
            .entries
            .iter()
            .map(|(p, e)| {
                (
                    e.seq,
                    CachedPeriodInfo {
                        period: *p,
                        events: e.events.len(),
                        cached_at: e.cached_at,
                        fresh: self.fresh_at(e, now),
                    },
                )
            })
            .collect();
        rows.sort_by_key(|(seq, _)| *seq);
        rows.into_iter().map(|(_, info)| info).collect()
    }

    /// Empty the cache and reset hit/miss counters.
    pub fn clear_all(&self) {
        let mut g = self.lock();
        let n = g.entries.len();
        *g = Inner::default();
        tracing::info!(target: "cache", removed = n, "cache cleared");
    }

    /// Populate the months either side of `period` that are not already
    /// fresh. Failures are logged and reported, never returned as errors.
    pub async fn preload_neighbors<F, Fut>(&self, period: Period, fetch: F) -> PreloadReport
    where
        F: Fn(Period) -> Fut,
        Fut: Future<Output = anyhow::Result<Vec<TgeEvent>>>,
    {
        let mut report = PreloadReport::default();
        for neighbor in [period.prev(), period.next()].into_iter().flatten() {
            if self.is_fresh(neighbor) {
                report.skipped.push(neighbor);
                continue;
            }
            match fetch(neighbor).await {
                Ok(events) if events.is_empty() => {
                    tracing::debug!(target: "cache", period = %neighbor, "preload returned nothing");
                    self.put(neighbor, events);
                    report.empty.push(neighbor);
                }
                Ok(events) => {
                    self.put(neighbor, events);
                    report.loaded.push(neighbor);
                }
                Err(e) => {
                    tracing::warn!(target: "cache", period = %neighbor, error = ?e, "preload failed");
                    self.telemetry.preload_failed(&neighbor.key());
                    report.failed.push(neighbor);
                }
            }
        }
        tracing::debug!(
            target: "cache",
            period = %period,
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "neighbour preload finished"
        );
        report
    }
}
