// src/config/sources.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, time::Duration};

use super::locate;

use crate::ingest::http::RetryPolicy;

pub const DEFAULT_SOURCES_CONFIG_PATH: &str = "config/sources.toml";
pub const ENV_SOURCES_CONFIG_PATH: &str = "TGE_SOURCES_CONFIG_PATH";

fn default_true() -> bool {
    true
}
fn default_timeout_secs() -> u64 {
    15
}

/// One HTTP provider. `api_key = "ENV"` (or no key at all) reads the
/// provider's env var; a missing key is not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub retry_base_ms: Option<u64>,
    #[serde(default)]
    pub max_pages: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
}

impl ProviderConfig {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            enabled: true,
            base_url: base_url.into(),
            api_key: None,
            timeout_secs,
            max_retries: None,
            retry_base_ms: None,
            max_pages: None,
            page_size: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let d = RetryPolicy::default();
        RetryPolicy {
            max_retries: self.max_retries.unwrap_or(d.max_retries),
            base_delay: self
                .retry_base_ms
                .map(Duration::from_millis)
                .unwrap_or(d.base_delay),
        }
    }

    fn resolve_key(&mut self, env_name: &str) {
        let explicit = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty() && !k.eq_ignore_ascii_case("env"))
            .map(str::to_string);
        self.api_key = explicit.or_else(|| env::var(env_name).ok().filter(|k| !k.trim().is_empty()));
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for CommunityConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_coinmarketcal() -> ProviderConfig {
    ProviderConfig::new("https://developers.coinmarketcal.com", 15)
}
fn default_cryptorank() -> ProviderConfig {
    ProviderConfig::new("https://api.cryptorank.io", 20)
}
fn default_defillama() -> ProviderConfig {
    ProviderConfig::new("https://api.llama.fi", 10)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_coinmarketcal")]
    pub coinmarketcal: ProviderConfig,
    #[serde(default = "default_cryptorank")]
    pub cryptorank: ProviderConfig,
    #[serde(default = "default_defillama")]
    pub defillama: ProviderConfig,
    #[serde(default)]
    pub community: CommunityConfig,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            coinmarketcal: default_coinmarketcal(),
            cryptorank: default_cryptorank(),
            defillama: default_defillama(),
            community: CommunityConfig::default(),
        }
    }
}

impl SourcesConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let cfg: SourcesConfig = toml::from_str(&data)?;
        Ok(cfg.resolved())
    }

    /// `$TGE_SOURCES_CONFIG_PATH`, then `config/sources.toml`, then built-ins.
    pub fn load_default() -> anyhow::Result<Self> {
        match locate(ENV_SOURCES_CONFIG_PATH, &[DEFAULT_SOURCES_CONFIG_PATH])? {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default().resolved()),
        }
    }

    /// Resolve API keys from the environment.
    pub fn resolved(mut self) -> Self {
        self.coinmarketcal.resolve_key("COINMARKETCAL_API_KEY");
        self.cryptorank.resolve_key("CRYPTORANK_API_KEY");
        self
    }
}
