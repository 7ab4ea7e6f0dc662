// src/config/keywords.rs
//! Relevance keyword list: a TOML table `keywords = [...]` or a bare JSON
//! string array, found through [`super::locate`].

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::relevance::{KeywordFilter, DEFAULT_KEYWORDS};

pub const ENV_KEYWORDS_PATH: &str = "TGE_KEYWORDS_PATH";
pub const KEYWORD_FILES: &[&str] = &["config/relevance_keywords.toml", "config/relevance_keywords.json"];

#[derive(Deserialize)]
struct KeywordFile {
    keywords: Vec<String>,
}

/// Read one keyword file; the extension picks the format, anything else is
/// sniffed as TOML then JSON.
pub fn load_keywords_from(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading keywords from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    parse_keywords(&text, &ext).with_context(|| format!("parsing {}", path.display()))
}

/// `$TGE_KEYWORDS_PATH`, then the files in [`KEYWORD_FILES`], then the
/// built-in list.
pub fn load_keywords_default() -> Result<Vec<String>> {
    match super::locate(ENV_KEYWORDS_PATH, KEYWORD_FILES)? {
        Some(path) => load_keywords_from(&path),
        None => Ok(tidy(DEFAULT_KEYWORDS.iter().map(|k| k.to_string()))),
    }
}

/// Filter from the default locations. A broken file is logged and the
/// built-in set is used.
pub fn keyword_filter_default() -> KeywordFilter {
    match load_keywords_default() {
        Ok(k) => KeywordFilter::new(k),
        Err(e) => {
            tracing::warn!(target: "config", error = ?e, "keyword config unreadable, using built-in list");
            KeywordFilter::default()
        }
    }
}

pub fn parse_keywords(text: &str, ext: &str) -> Result<Vec<String>> {
    let from_toml = || toml::from_str::<KeywordFile>(text).map(|f| f.keywords);
    let from_json = || serde_json::from_str::<Vec<String>>(text);
    let raw = match ext {
        "json" => from_json().context("expected a JSON array of strings")?,
        "toml" => from_toml().context("expected a `keywords` array")?,
        _ => from_toml()
            .ok()
            .or_else(|| from_json().ok())
            .ok_or_else(|| anyhow!("unsupported keyword list format"))?,
    };
    Ok(tidy(raw))
}

/// Trimmed, lower-cased, unique and sorted; blanks dropped.
fn tidy(items: impl IntoIterator<Item = String>) -> Vec<String> {
    items
        .into_iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_follow_the_extension() {
        let toml = r#"keywords = [" TGE ", "", "Mainnet", "mainnet"]"#;
        assert_eq!(parse_keywords(toml, "toml").unwrap(), vec!["mainnet", "tge"]);
        let json = r#"["Airdrop", "  listing  ", ""]"#;
        assert_eq!(parse_keywords(json, "json").unwrap(), vec!["airdrop", "listing"]);
        assert!(parse_keywords(json, "toml").is_err());
    }

    #[test]
    fn unknown_extension_is_sniffed() {
        assert_eq!(parse_keywords(r#"["IDO"]"#, "txt").unwrap(), vec!["ido"]);
        assert_eq!(parse_keywords(r#"keywords = ["IDO"]"#, "").unwrap(), vec!["ido"]);
        assert!(parse_keywords("not a list", "txt").is_err());
    }
}
