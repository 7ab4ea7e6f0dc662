// tests/aggregate_dedup.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tge_calendar::ingest::normalize::{normalize, RawEvent};
use tge_calendar::ingest::{dedup_events, Aggregator};
use tge_calendar::telemetry::CountingTelemetry;
use tge_calendar::{Credibility, FetchParams, SourceAdapter, TgeEvent};

struct Fixed {
    name: &'static str,
    events: Vec<TgeEvent>,
}

#[async_trait]
impl SourceAdapter for Fixed {
    async fn fetch(&self, _params: &FetchParams) -> anyhow::Result<Vec<TgeEvent>> {
        Ok(self.events.clone())
    }
    fn name(&self) -> &'static str {
        self.name
    }
}

fn raw(source: &str, id: &str, name: &str, start: &str) -> TgeEvent {
    normalize(
        source,
        RawEvent {
            id: Some(id.into()),
            name: Some(name.into()),
            start: Some(start.into()),
            credibility: Credibility::Verified,
            ..RawEvent::default()
        },
        Utc::now(),
    )
    .expect("valid record")
}

#[test]
fn dedup_is_idempotent() {
    let events = vec![
        raw("a", "1", "Foo Token", "2025-09-01"),
        raw("a", "2", "foo-token", "2025-09-01T22:00"),
        raw("b", "3", "Bar", "2025-09-02"),
        raw("b", "4", "Foo Token", "2025-09-03"),
    ];
    let (once, dropped) = dedup_events(events);
    assert_eq!(dropped, 1);
    let (twice, dropped_again) = dedup_events(once.clone());
    assert_eq!(twice, once);
    assert_eq!(dropped_again, 0);
}

#[test]
fn cosmetic_name_differences_collapse() {
    let (kept, _) = dedup_events(vec![
        raw("a", "1", "Friend.Tech TOKEN", "2025-09-05T01:00:00Z"),
        raw("b", "2", "friend tech token!", "2025-09-05T23:59:59Z"),
    ]);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].id, "1");
}

#[tokio::test]
async fn aster_pair_and_plain_name_yield_the_first_seen_record() {
    let first = Fixed {
        name: "first",
        events: vec![raw("first", "first-aster", "Aster Network (ASTER/USDT)", "2025-09-17")],
    };
    let second = Fixed {
        name: "second",
        events: vec![raw("second", "second-aster", "aster network", "2025-09-17T08:00")],
    };
    let telemetry = CountingTelemetry::new();
    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![Arc::new(first), Arc::new(second)];
    let agg = Aggregator::new(adapters, Arc::new(telemetry.clone()));

    let out = agg.aggregate(&FetchParams::default()).await;
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].id, "first-aster");
    assert_eq!(telemetry.snapshot().dedup_collisions, 1);
}

#[tokio::test]
async fn output_is_sorted_and_windowed() {
    let a = Fixed {
        name: "a",
        events: vec![
            raw("a", "late", "Late", "2025-09-28"),
            raw("a", "outside", "Outside", "2025-10-02"),
        ],
    };
    let b = Fixed {
        name: "b",
        events: vec![
            raw("b", "early", "Early", "2025-09-03"),
            raw("b", "mid", "Mid", "2025-09-15"),
        ],
    };
    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![Arc::new(a), Arc::new(b)];
    let agg = Aggregator::new(adapters, Arc::new(CountingTelemetry::new()));
    let window = FetchParams::window(
        Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 9, 30, 23, 59, 59).unwrap(),
    );

    let out = agg.aggregate(&window).await;
    let ids: Vec<_> = out.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["early", "mid", "late"]);
    assert!(out.windows(2).all(|w| w[0].start_date <= w[1].start_date));
}

#[test]
fn bracketed_names_that_differ_stay_apart() {
    let (kept, dropped) = dedup_events(vec![
        raw("a", "a", "Token Unlock (ARB)", "2025-09-17"),
        raw("a", "b", "Token Unlock (OP)", "2025-09-17"),
        raw("b", "c", "(TBA)", "2025-09-17"),
        raw("b", "d", "[Rumor]", "2025-09-17"),
    ]);
    let ids: Vec<_> = kept.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c", "d"]);
    assert_eq!(dropped, 0);
}

#[test]
fn trailing_symbol_annotation_matches_the_plain_name() {
    let with_symbol = |id: &str, name: &str| {
        normalize(
            "a",
            RawEvent {
                id: Some(id.into()),
                name: Some(name.into()),
                symbol: Some("FOO".into()),
                start: Some("2025-09-20".into()),
                ..RawEvent::default()
            },
            Utc::now(),
        )
        .expect("valid record")
    };
    let (kept, dropped) = dedup_events(vec![with_symbol("1", "Foo (FOO)"), with_symbol("2", "Foo")]);
    assert_eq!(dropped, 1);
    assert_eq!(kept[0].id, "1");
}
