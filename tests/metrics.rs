// tests/metrics.rs
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use tge_calendar::config::ENV_DATA_DIR;

// Full in-process app with persisted state in a throwaway directory.
async fn build_app(data_dir: &std::path::Path) -> Router {
    std::env::set_var(ENV_DATA_DIR, data_dir);
    tge_calendar::app()
        .await
        .expect("app() should build Router in tests")
}

async fn scrape(app: &Router) -> String {
    let resp = app
        .clone()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

#[serial_test::serial]
#[tokio::test]
async fn metrics_endpoint_exposes_cache_ttl_gauge() {
    let tmp = tempfile::tempdir().unwrap();
    let app = build_app(tmp.path()).await;

    let text = scrape(&app).await;
    assert!(
        text.contains("tge_period_cache_ttl_ms"),
        "metrics exposition missing ttl gauge\n{text}"
    );
}

#[serial_test::serial]
#[tokio::test]
async fn app_can_be_built_twice_and_serves_health() {
    let tmp = tempfile::tempdir().unwrap();
    let _first = build_app(tmp.path()).await;
    let app = build_app(tmp.path()).await;

    let resp = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(tmp.path().exists());
}
