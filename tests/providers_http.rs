// tests/providers_http.rs
//
// Adapters against a throwaway local HTTP server. Each route counts its hits
// so retry and pagination behaviour can be asserted exactly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{extract::Query, routing::get, Json, Router};
use chrono::{Duration, Utc};
use http::{HeaderMap, StatusCode};
use serde_json::{json, Value};
use tge_calendar::config::ProviderConfig;
use tge_calendar::ingest::providers::{CoinMarketCalAdapter, CryptoRankAdapter, DefiLlamaAdapter};
use tge_calendar::relevance::KeywordFilter;
use tge_calendar::telemetry::{CountingTelemetry, SharedTelemetry};
use tge_calendar::{Credibility, FetchParams, SourceAdapter};

type Reply = (StatusCode, Json<Value>);

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server");
    });
    format!("http://{addr}")
}

/// Route at `path` answering with `reply(hit_number, query, headers)`.
async fn scripted<F>(path: &str, reply: F) -> (String, Arc<AtomicUsize>)
where
    F: Fn(usize, &HashMap<String, String>, &HeaderMap) -> Reply + Clone + Send + Sync + 'static,
{
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new().route(
        path,
        get(
            move |Query(q): Query<HashMap<String, String>>, headers: HeaderMap| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let out = reply(n, &q, &headers);
                async move { out }
            },
        ),
    );
    (serve(app).await, hits)
}

fn provider(base: &str, key: Option<&str>) -> ProviderConfig {
    let mut cfg = ProviderConfig::new(base, 2);
    cfg.api_key = key.map(str::to_string);
    cfg.max_retries = Some(3);
    cfg.retry_base_ms = Some(5);
    cfg
}

fn telemetry() -> SharedTelemetry {
    Arc::new(CountingTelemetry::new())
}

fn cmc_record(id: u64, title: &str) -> Value {
    json!({
        "id": id,
        "title": {"en": title},
        "date_event": "2025-09-18T00:00:00Z",
        "important": true,
        "coins": [{"name": "Foo", "symbol": "foo", "platform": "Ethereum"}]
    })
}

#[tokio::test]
async fn coinmarketcal_rate_limit_is_not_retried() {
    let (base, hits) = scripted("/v1/events", |_, _, _| {
        (StatusCode::TOO_MANY_REQUESTS, Json(json!({"error": "slow down"})))
    })
    .await;
    let adapter = CoinMarketCalAdapter::from_config(
        &provider(&base, Some("k")),
        KeywordFilter::default(),
        telemetry(),
    )
    .unwrap();

    let out = adapter.fetch(&FetchParams::default()).await.unwrap();
    assert!(out.is_empty());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn coinmarketcal_auth_error_is_not_retried() {
    let (base, hits) = scripted("/v1/events", |_, _, _| {
        (StatusCode::FORBIDDEN, Json(json!({"error": "invalid key"})))
    })
    .await;
    let adapter = CoinMarketCalAdapter::from_config(
        &provider(&base, Some("revoked")),
        KeywordFilter::default(),
        telemetry(),
    )
    .unwrap();

    let out = adapter.fetch(&FetchParams::default()).await.unwrap();
    assert!(out.is_empty());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn coinmarketcal_retries_server_errors_then_succeeds() {
    let (base, hits) = scripted("/v1/events", |n, _, _| {
        if n < 2 {
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({})))
        } else {
            (StatusCode::OK, Json(json!({"body": [cmc_record(7, "Foo Token Launch")]})))
        }
    })
    .await;
    let adapter = CoinMarketCalAdapter::from_config(
        &provider(&base, Some("k")),
        KeywordFilter::default(),
        telemetry(),
    )
    .unwrap();

    let out = adapter.fetch(&FetchParams::default()).await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].id, "coinmarketcal-7");
    assert_eq!(out[0].credibility, Credibility::Verified);
    assert_eq!(out[0].symbol.as_deref(), Some("FOO"));
}

#[tokio::test]
async fn coinmarketcal_pages_are_capped_and_keyword_filtered() {
    let (base, hits) = scripted("/v1/events", |_, q, headers| {
        if headers.get("x-api-key").and_then(|v| v.to_str().ok()) != Some("k") {
            return (StatusCode::UNAUTHORIZED, Json(json!({})));
        }
        let page: u64 = q.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
        let body = match page {
            1 => json!([cmc_record(1, "Foo Mainnet Launch"), cmc_record(2, "Community AMA")]),
            2 => json!([cmc_record(3, "Bar TGE")]),
            _ => json!([cmc_record(99, "Baz Listing")]),
        };
        (StatusCode::OK, Json(json!({"_metadata": {"page_count": 5}, "body": body})))
    })
    .await;
    let mut cfg = provider(&base, Some("k"));
    cfg.max_pages = Some(2);
    let adapter =
        CoinMarketCalAdapter::from_config(&cfg, KeywordFilter::default(), telemetry()).unwrap();

    let out = adapter.fetch(&FetchParams::default()).await.unwrap();
    let ids: Vec<_> = out.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["coinmarketcal-1", "coinmarketcal-3"]);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn coinmarketcal_without_key_makes_no_request() {
    let (base, hits) = scripted("/v1/events", |_, _, _| (StatusCode::OK, Json(json!({"body": []})))).await;
    let adapter =
        CoinMarketCalAdapter::from_config(&provider(&base, None), KeywordFilter::default(), telemetry())
            .unwrap();

    assert!(adapter.fetch(&FetchParams::default()).await.unwrap().is_empty());
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cryptorank_maps_dated_coins_only() {
    let (base, hits) = scripted("/v2/currencies", |_, _, headers| {
        if headers.get("x-api-key").and_then(|v| v.to_str().ok()) != Some("ck") {
            return (StatusCode::FORBIDDEN, Json(json!({})));
        }
        (
            StatusCode::OK,
            Json(json!({"data": [
                {
                    "id": 42,
                    "name": "Foo",
                    "symbol": "FOO",
                    "type": "ido",
                    "status": "upcoming",
                    "launchDate": "2025-09-20",
                    "totalRaised": 1500000.0,
                    "blockchain": {"name": "Solana"},
                    "exchanges": ["Bybit", {"name": "OKX", "url": "https://okx.com"}]
                },
                {"id": 43, "name": "Undated"}
            ]})),
        )
    })
    .await;
    let adapter = CryptoRankAdapter::from_config(&provider(&base, Some("ck")), telemetry()).unwrap();

    let out = adapter.fetch(&FetchParams::default()).await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(out.len(), 1);
    let ev = &out[0];
    assert_eq!(ev.id, "cryptorank-coin-42");
    assert_eq!(ev.name, "Foo (FOO)");
    assert_eq!(ev.blockchain.as_deref(), Some("Solana"));
    assert_eq!(ev.credibility, Credibility::Verified);
    assert!(ev.description.starts_with("IDO"));
    let markets: Vec<_> = ev.markets.iter().map(|m| m.title.as_str()).collect();
    assert_eq!(markets, vec!["Bybit", "OKX"]);
    assert_eq!(ev.announcement_url.as_deref(), Some("https://cryptorank.io/coin/42"));
}

#[tokio::test]
async fn defillama_keeps_only_recent_protocols() {
    let now = Utc::now();
    let fresh = (now - Duration::days(2)).timestamp();
    let stale = (now - Duration::days(90)).timestamp();
    let (base, _) = scripted("/protocols", move |_, _, _| {
        (
            StatusCode::OK,
            Json(json!([
                {"id": "1", "name": "Fresh Swap", "date": fresh, "chain": "Base", "symbol": "-"},
                {"id": "2", "name": "Old Lend", "date": stale, "chain": "Ethereum"},
                {"id": "3", "name": "No Date"}
            ])),
        )
    })
    .await;
    let adapter = DefiLlamaAdapter::from_config(&provider(&base, None), telemetry()).unwrap();

    let out = adapter.fetch(&FetchParams::default()).await.unwrap();
    assert_eq!(out.len(), 1);
    let ev = &out[0];
    assert_eq!(ev.name, "Fresh Swap Protocol Launch");
    assert_eq!(ev.symbol.as_deref(), Some("FRES"));
    assert_eq!(ev.blockchain.as_deref(), Some("Base"));
    assert_eq!(ev.announcement_url.as_deref(), Some("https://defillama.com/protocol/fresh-swap"));
}

#[tokio::test]
async fn unreachable_provider_yields_empty_not_error() {
    let cfg = ProviderConfig {
        max_retries: Some(0),
        ..ProviderConfig::new("http://127.0.0.1:1", 1)
    };
    let adapter = DefiLlamaAdapter::from_config(&cfg, telemetry()).unwrap();
    assert!(adapter.fetch(&FetchParams::default()).await.unwrap().is_empty());
}
