// src/ingest/providers/mod.rs
pub mod coinmarketcal;
pub mod community;
pub mod cryptorank;
pub mod defillama;

use std::sync::Arc;

use crate::config::SourcesConfig;
use crate::ingest::types::SourceAdapter;
use crate::relevance::KeywordFilter;
use crate::telemetry::SharedTelemetry;

pub use coinmarketcal::CoinMarketCalAdapter;
pub use community::CommunityAdapter;
pub use cryptorank::CryptoRankAdapter;
pub use defillama::DefiLlamaAdapter;

/// Enabled adapters in fan-out order. Community goes last so that on a
/// name+day collision the richer upstream record is kept.
pub fn build_adapters(
    cfg: &SourcesConfig,
    keywords: &KeywordFilter,
    telemetry: &SharedTelemetry,
) -> anyhow::Result<Vec<Arc<dyn SourceAdapter>>> {
    let mut out: Vec<Arc<dyn SourceAdapter>> = Vec::new();
    if cfg.coinmarketcal.enabled {
        out.push(Arc::new(CoinMarketCalAdapter::from_config(
            &cfg.coinmarketcal,
            keywords.clone(),
            Arc::clone(telemetry),
        )?));
    }
    if cfg.cryptorank.enabled {
        out.push(Arc::new(CryptoRankAdapter::from_config(
            &cfg.cryptorank,
            Arc::clone(telemetry),
        )?));
    }
    if cfg.defillama.enabled {
        out.push(Arc::new(DefiLlamaAdapter::from_config(
            &cfg.defillama,
            Arc::clone(telemetry),
        )?));
    }
    if cfg.community.enabled {
        out.push(Arc::new(CommunityAdapter));
    }
    Ok(out)
}
