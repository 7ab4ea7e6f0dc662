use axum::{routing::get, Router};
use metrics::{describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

static GLOBAL: OnceCell<Metrics> = OnceCell::new();

impl Metrics {
    /// Install the Prometheus recorder and publish the cache TTL as a static
    /// gauge. Fails if another global recorder is already installed.
    pub fn init(ttl_ms: u64) -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        describe_gauge!("tge_period_cache_ttl_ms", "Period cache TTL in milliseconds.");
        gauge!("tge_period_cache_ttl_ms").set(ttl_ms as f64);
        Ok(Self { handle })
    }

    /// Process-wide instance; the first caller's TTL wins.
    pub fn global(ttl_ms: u64) -> anyhow::Result<&'static Metrics> {
        GLOBAL.get_or_try_init(|| Self::init(ttl_ms))
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
