// tests/search_store.rs
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tempfile::tempdir;
use tge_calendar::history::SearchHistory;
use tge_calendar::persist::{FileKvStore, SharedKv};
use tge_calendar::search::{SearchOptions, SearchService, SortBy, SortOrder, SuggestionKind};
use tge_calendar::store::{DateRange, SearchFilters, SearchStore};
use tge_calendar::{Credibility, MarketLink, Period, TgeEvent};

fn ev(id: &str, name: &str, chain: &str, cred: Credibility, day: u32) -> TgeEvent {
    TgeEvent {
        id: id.into(),
        name: name.into(),
        description: format!("{name} token generation event"),
        start_date: Utc.with_ymd_and_hms(2025, 9, day, 12, 0, 0).unwrap(),
        end_date: None,
        blockchain: Some(chain.into()),
        symbol: None,
        credibility: cred,
        announcement_url: None,
        markets: vec![MarketLink::named("Binance")],
    }
}

fn sample() -> Vec<TgeEvent> {
    vec![
        ev("1", "Jupiter Perps", "Solana", Credibility::Verified, 3),
        ev("2", "Drift Points", "Solana", Credibility::Rumor, 8),
        ev("3", "Arbitrum Orbit", "Ethereum", Credibility::Verified, 12),
        ev("4", "Tensor Drop", "solana", Credibility::Verified, 20),
    ]
}

#[test]
fn blockchain_and_credibility_filters_intersect() {
    let store = SearchStore::in_memory();
    store.add_events(sample());

    let r = store.search(&SearchFilters {
        blockchain: Some("Solana".into()),
        credibility: Some(Credibility::Verified),
        ..SearchFilters::default()
    });
    let ids: Vec<_> = r.events.iter().map(|e| e.event.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "4"]);
    assert_eq!(r.total, 2);
}

#[test]
fn no_filters_returns_everything_in_date_order() {
    let store = SearchStore::in_memory();
    store.add_events(sample());

    let r = store.search(&SearchFilters::default());
    let ids: Vec<_> = r.events.iter().map(|e| e.event.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3", "4"]);
}

#[test]
fn date_range_and_query_narrow_together() {
    let store = SearchStore::in_memory();
    store.add_events(sample());

    let r = store.search(&SearchFilters {
        query: Some("drop".into()),
        date_range: Some(DateRange {
            start: Utc.with_ymd_and_hms(2025, 9, 15, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2025, 9, 30, 23, 59, 59).unwrap(),
        }),
        ..SearchFilters::default()
    });
    assert_eq!(r.total, 1);
    assert_eq!(r.events[0].event.id, "4");

    let sept = store.events_for_period(Period::new(2025, 9).unwrap());
    assert_eq!(sept.len(), 4);
}

#[test]
fn service_sorts_limits_and_records_history() {
    let svc = SearchService::new(Arc::new(SearchStore::in_memory()), SearchHistory::default());
    svc.store().add_events(sample());

    let r = svc.search(
        "token",
        SearchFilters::default(),
        SearchOptions {
            sort_by: Some(SortBy::Name),
            order: SortOrder::Desc,
            limit: Some(2),
        },
    );
    let names: Vec<_> = r.events.iter().map(|e| e.event.name.as_str()).collect();
    assert_eq!(names, vec!["Tensor Drop", "Jupiter Perps"]);
    assert_eq!(r.total, 4);

    svc.search("solana", SearchFilters::default(), SearchOptions::default());
    svc.search("token", SearchFilters::default(), SearchOptions::default());
    assert_eq!(svc.history(), vec!["token", "solana"]);
}

#[test]
fn suggestions_cover_tokens_and_chains() {
    let svc = SearchService::new(Arc::new(SearchStore::in_memory()), SearchHistory::default());
    svc.store().add_events(sample());

    let s = svc.suggestions("sol", 5);
    assert!(s
        .iter()
        .any(|x| x.kind == SuggestionKind::Blockchain && x.text == "Solana" && x.count == 3));

    let popular = svc.suggestions("", 3);
    assert_eq!(popular.len(), 3);
    assert!(popular.iter().all(|x| x.count == 0));
}

#[test]
fn store_and_history_survive_a_restart() {
    let dir = tempdir().unwrap();
    {
        let kv: SharedKv = Arc::new(FileKvStore::new(dir.path()).unwrap());
        let svc = SearchService::new(
            Arc::new(SearchStore::with_kv(kv.clone())),
            SearchHistory::persisted(10, kv),
        );
        svc.store().add_events(sample());
        svc.search("arbitrum", SearchFilters::default(), SearchOptions::default());
    }

    let kv: SharedKv = Arc::new(FileKvStore::new(dir.path()).unwrap());
    let store = Arc::new(SearchStore::with_kv(kv.clone()));
    let svc = SearchService::new(store.clone(), SearchHistory::persisted(10, kv));
    assert_eq!(store.load().unwrap(), 4);
    assert_eq!(svc.load_history().unwrap(), 1);

    assert_eq!(svc.history(), vec!["arbitrum"]);
    assert_eq!(store.blockchains(), vec!["Ethereum", "Solana"]);
    let r = store.search(&SearchFilters {
        query: Some("orbit".into()),
        ..SearchFilters::default()
    });
    assert_eq!(r.events[0].event.id, "3");
}

#[tokio::test]
async fn writes_from_async_code_land_after_flush() {
    let dir = tempdir().unwrap();
    let kv: SharedKv = Arc::new(FileKvStore::new(dir.path()).unwrap());
    let svc = SearchService::new(
        Arc::new(SearchStore::with_kv(kv.clone())),
        SearchHistory::persisted(10, kv.clone()),
    );
    svc.store().add_events(sample()[..2].to_vec());
    svc.store().add_events(sample());
    svc.search("jupiter", SearchFilters::default(), SearchOptions::default());
    svc.search("drift", SearchFilters::default(), SearchOptions::default());
    svc.flush().await;

    let store = SearchStore::with_kv(kv.clone());
    assert_eq!(store.load().unwrap(), 4);
    let history = SearchHistory::persisted(10, kv);
    assert_eq!(history.load().unwrap(), 2);
    assert_eq!(history.snapshot(), vec!["drift", "jupiter"]);
}
