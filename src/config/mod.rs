// src/config/mod.rs
//! Process-wide settings, read once at startup by the composition root.

pub mod keywords;
pub mod sources;

use anyhow::anyhow;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::relevance::KeywordFilter;
pub use keywords::keyword_filter_default;
pub use sources::{CommunityConfig, ProviderConfig, SourcesConfig};

pub const ENV_CACHE_TTL_MS: &str = "TGE_CACHE_TTL_MS";
pub const ENV_CACHE_MAX_PERIODS: &str = "TGE_CACHE_MAX_PERIODS";
pub const ENV_DATA_DIR: &str = "TGE_DATA_DIR";
pub const ENV_EVICTION_INTERVAL_SECS: &str = "TGE_EVICTION_INTERVAL_SECS";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub sources: SourcesConfig,
    pub cache: CacheConfig,
    pub keywords: KeywordFilter,
    pub data_dir: PathBuf,
    pub eviction_interval: Duration,
}

/// Config file lookup shared by every loader: the path in `env_name` when
/// set (it must exist), otherwise the first existing entry of `candidates`.
/// `None` means use built-in defaults.
pub fn locate(env_name: &str, candidates: &[&str]) -> anyhow::Result<Option<PathBuf>> {
    if let Ok(p) = std::env::var(env_name) {
        let path = PathBuf::from(p);
        if !path.exists() {
            return Err(anyhow!("{env_name} points to missing file {}", path.display()));
        }
        return Ok(Some(path));
    }
    Ok(candidates
        .iter()
        .map(Path::new)
        .find(|p| p.exists())
        .map(Path::to_path_buf))
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

impl CacheConfig {
    /// Defaults overridden by `TGE_CACHE_TTL_MS` / `TGE_CACHE_MAX_PERIODS`.
    pub fn from_env() -> Self {
        let d = CacheConfig::default();
        CacheConfig {
            ttl: env_parse::<u64>(ENV_CACHE_TTL_MS)
                .map(Duration::from_millis)
                .unwrap_or(d.ttl),
            max_entries: env_parse::<usize>(ENV_CACHE_MAX_PERIODS)
                .filter(|n| *n > 0)
                .unwrap_or(d.max_entries),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let sources = SourcesConfig::load_default()?;
        Ok(Self {
            sources,
            cache: CacheConfig::from_env(),
            keywords: keyword_filter_default(),
            data_dir: std::env::var(ENV_DATA_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data")),
            eviction_interval: Duration::from_secs(
                env_parse::<u64>(ENV_EVICTION_INTERVAL_SECS).unwrap_or(300).max(1),
            ),
        })
    }
}
