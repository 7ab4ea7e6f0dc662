// tests/period_cache.rs
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tge_calendar::cache::{CacheConfig, PeriodCache};
use tge_calendar::telemetry::CountingTelemetry;
use tge_calendar::{Credibility, Period, TgeEvent};

fn ev(id: &str) -> TgeEvent {
    TgeEvent {
        id: id.into(),
        name: format!("Event {id}"),
        description: String::new(),
        start_date: Utc.with_ymd_and_hms(2025, 9, 10, 0, 0, 0).unwrap(),
        end_date: None,
        blockchain: None,
        symbol: None,
        credibility: Credibility::Verified,
        announcement_url: None,
        markets: vec![],
    }
}

fn cache(ttl: Duration, max: usize) -> (PeriodCache, CountingTelemetry) {
    let telemetry = CountingTelemetry::new();
    let cache = PeriodCache::new(
        CacheConfig {
            ttl,
            max_entries: max,
        },
        Arc::new(telemetry.clone()),
    );
    (cache, telemetry)
}

#[test]
fn entry_is_fresh_until_ttl_and_purged_after() {
    let ttl = Duration::from_secs(30 * 60);
    let (c, telemetry) = cache(ttl, 24);
    let p = Period::new(2025, 9).unwrap();
    let t = Utc.with_ymd_and_hms(2025, 9, 1, 12, 0, 0).unwrap();
    c.put_at(p, vec![ev("1")], t);

    let delta = chrono::Duration::from_std(ttl).unwrap();
    let just_before = t + delta - chrono::Duration::milliseconds(1);
    let just_after = t + delta + chrono::Duration::milliseconds(1);

    assert_eq!(c.get_at(p, just_before).map(|v| v.len()), Some(1));
    assert!(c.get_at(p, just_after).is_none());
    assert!(c.is_empty(), "stale entry must be purged on read");

    let snap = telemetry.snapshot();
    assert_eq!((snap.cache_hits, snap.cache_misses), (1, 1));
}

#[test]
fn inserting_max_plus_one_evicts_exactly_the_oldest() {
    const MAX: usize = 24;
    let (c, _) = cache(Duration::from_secs(3600), MAX);
    let t = Utc::now();
    let mut p = Period::new(2024, 1).unwrap();
    let first = p;
    for i in 0..MAX {
        c.put_at(p, vec![ev(&i.to_string())], t);
        p = p.next().unwrap();
    }
    assert_eq!(c.len(), MAX);

    c.put_at(p, vec![ev("new")], t);
    assert_eq!(c.len(), MAX);
    assert!(!c.is_fresh_at(first, t), "oldest period should be gone");
    assert!(c.is_fresh_at(first.next().unwrap(), t));
    assert!(c.is_fresh_at(p, t));
}

#[test]
fn evict_expired_only_removes_stale_entries() {
    let (c, _) = cache(Duration::from_secs(60), 10);
    let t = Utc::now();
    let old = Period::new(2025, 1).unwrap();
    let young = Period::new(2025, 2).unwrap();
    c.put_at(old, vec![ev("1")], t - chrono::Duration::seconds(120));
    c.put_at(young, vec![ev("2")], t);

    assert_eq!(c.evict_expired_at(t), 1);
    assert!(c.is_fresh_at(young, t));
    let periods: Vec<_> = c.cached_periods().into_iter().map(|i| i.period).collect();
    assert_eq!(periods, vec![young]);
}

#[tokio::test]
async fn preload_fetches_only_stale_neighbours() {
    let (c, telemetry) = cache(Duration::from_secs(3600), 24);
    let sep = Period::new(2025, 9).unwrap();
    let aug = Period::new(2025, 8).unwrap();
    let oct = Period::new(2025, 10).unwrap();
    c.put(aug, vec![ev("aug")]);

    let calls = AtomicUsize::new(0);
    let report = c
        .preload_neighbors(sep, |p| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(vec![ev(&p.key())]) }
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.skipped, vec![aug]);
    assert_eq!(report.loaded, vec![oct]);
    assert_eq!(c.get(oct).unwrap()[0].id, "2025-10");
    assert_eq!(telemetry.snapshot().preload_failures, 0);
}

#[tokio::test]
async fn preload_failures_are_reported_not_raised() {
    let (c, telemetry) = cache(Duration::from_secs(3600), 24);
    let sep = Period::new(2025, 9).unwrap();

    let report = c
        .preload_neighbors(sep, |p| async move {
            if p.month() == 8 {
                Err(anyhow::anyhow!("upstream timeout"))
            } else {
                Ok(vec![])
            }
        })
        .await;

    assert_eq!(report.failed, vec![Period::new(2025, 8).unwrap()]);
    assert_eq!(report.empty, vec![Period::new(2025, 10).unwrap()]);
    // empty neighbour is cached so it is not fetched again; the failed one is not
    assert_eq!(c.len(), 1);
    assert_eq!(c.get(Period::new(2025, 10).unwrap()), Some(vec![]));
    assert!(!c.is_fresh(Period::new(2025, 8).unwrap()));
    assert_eq!(telemetry.snapshot().preload_failures, 1);
}
