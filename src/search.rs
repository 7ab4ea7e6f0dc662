//! Search front-end over [`SearchStore`]: sorting, limits, suggestions and
//! the recent-query history.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::history::SearchHistory;
use crate::store::{slug, SearchFilters, SearchResult, SearchStore, StoreStats};

pub const DEFAULT_SUGGESTION_LIMIT: usize = 5;

const POPULAR_TOKENS: &[&str] = &["Bitcoin", "Ethereum", "Solana", "Polygon", "Arbitrum"];
const POPULAR_CHAINS: &[&str] = &["Ethereum", "Solana", "Polygon", "Arbitrum", "Base"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Date,
    Name,
    /// No scoring model; ordered like `Date`.
    Relevance,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    #[serde(default)]
    pub sort_by: Option<SortBy>,
    #[serde(default)]
    pub order: SortOrder,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionKind {
    Token,
    Blockchain,
    Market,
    Tag,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Facets {
    pub blockchains: Vec<String>,
    pub credibility_levels: Vec<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchAnalytics {
    pub total_searches: usize,
    pub recent_searches: Vec<String>,
    pub store_stats: StoreStats,
}

pub struct SearchService {
    store: Arc<SearchStore>,
    history: SearchHistory,
}

/// Counted matches, highest count first, ties alphabetical.
fn ranked(counts: BTreeMap<String, usize>, kind: SuggestionKind, limit: usize) -> Vec<Suggestion> {
    let mut v: Vec<Suggestion> = counts
        .into_iter()
        .map(|(text, count)| Suggestion { text, kind, count })
        .collect();
    v.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.text.cmp(&b.text)));
    v.truncate(limit);
    v
}

impl SearchService {
    pub fn new(store: Arc<SearchStore>, history: SearchHistory) -> Self {
        Self { store, history }
    }

    pub fn store(&self) -> &Arc<SearchStore> {
        &self.store
    }

    /// Run `query` plus `filters` against the store. Non-blank queries are
    /// recorded in the history.
    pub fn search(&self, query: &str, filters: SearchFilters, options: SearchOptions) -> SearchResult {
        let q = query.trim();
        if !q.is_empty() {
            self.history.push(q);
        }
        let filters = SearchFilters {
            query: (!q.is_empty()).then(|| q.to_string()),
            ..filters
        };
        let mut result = self.store.search(&filters);

        if let Some(sort_by) = options.sort_by {
            result.events.sort_by(|a, b| {
                let ord = match sort_by {
                    SortBy::Date | SortBy::Relevance => a.event.start_date.cmp(&b.event.start_date),
                    SortBy::Name => a.event.name.to_lowercase().cmp(&b.event.name.to_lowercase()),
                };
                match options.order {
                    SortOrder::Asc => ord,
                    SortOrder::Desc => ord.reverse(),
                }
            });
        }
        if let Some(limit) = options.limit {
            result.events.truncate(limit);
        }
        tracing::debug!(target: "search", query = q, total = result.total, returned = result.events.len(), "search served");
        result
    }

    /// Up to `limit` suggestions for a partial query: tokens, then chains,
    /// markets and tags. An empty query yields popular defaults.
    pub fn suggestions(&self, query: &str, limit: usize) -> Vec<Suggestion> {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return Self::popular(limit);
        }

        let events = self.store.all_events();
        let mut tokens: BTreeMap<String, usize> = BTreeMap::new();
        let mut markets: BTreeMap<String, usize> = BTreeMap::new();
        for ie in &events {
            let ev = &ie.event;
            for t in std::iter::once(ev.name.as_str()).chain(ev.symbol.as_deref()) {
                if t.to_lowercase().contains(&q) {
                    *tokens.entry(t.to_string()).or_default() += 1;
                }
            }
            for m in &ev.markets {
                if m.title.to_lowercase().contains(&q) {
                    *markets.entry(m.title.clone()).or_default() += 1;
                }
            }
        }

        let chains: BTreeMap<String, usize> = self
            .store
            .blockchains()
            .into_iter()
            .filter(|c| c.to_lowercase().contains(&q))
            .map(|c| {
                let n = events
                    .iter()
                    .filter(|e| e.event.blockchain.as_deref().is_some_and(|b| b.eq_ignore_ascii_case(&c)))
                    .count();
                (c, n)
            })
            .collect();

        let tag_q = slug(&q);
        let tags: BTreeMap<String, usize> = self
            .store
            .tags()
            .into_iter()
            .filter(|t| t.contains(&tag_q))
            .map(|t| {
                let n = events.iter().filter(|e| e.tags.contains(&t)).count();
                (t, n)
            })
            .collect();

        let mut seen = HashSet::new();
        ranked(tokens, SuggestionKind::Token, limit)
            .into_iter()
            .chain(ranked(chains, SuggestionKind::Blockchain, limit))
            .chain(ranked(markets, SuggestionKind::Market, limit))
            .chain(ranked(tags, SuggestionKind::Tag, limit))
            .filter(|s| seen.insert((s.text.clone(), s.kind)))
            .take(limit)
            .collect()
    }

    fn popular(limit: usize) -> Vec<Suggestion> {
        POPULAR_TOKENS
            .iter()
            .map(|t| (t, SuggestionKind::Token))
            .chain(POPULAR_CHAINS.iter().map(|c| (c, SuggestionKind::Blockchain)))
            .map(|(text, kind)| Suggestion {
                text: text.to_string(),
                kind,
                count: 0,
            })
            .take(limit)
            .collect()
    }

    pub fn facets(&self) -> Facets {
        Facets {
            blockchains: self.store.blockchains(),
            credibility_levels: self
                .store
                .credibility_levels()
                .into_iter()
                .map(|c| c.as_str().to_string())
                .collect(),
            tags: self.store.tags(),
        }
    }

    pub fn history(&self) -> Vec<String> {
        self.history.snapshot()
    }

    pub fn clear_history(&self) {
        self.history.clear();
    }

    pub fn load_history(&self) -> anyhow::Result<usize> {
        self.history.load()
    }

    /// Wait for pending store and history writes.
    pub async fn flush(&self) {
        self.store.flush().await;
        self.history.flush().await;
    }

    pub fn analytics(&self) -> SearchAnalytics {
        let all = self.history.snapshot();
        SearchAnalytics {
            total_searches: all.len(),
            recent_searches: all.into_iter().take(5).collect(),
            store_stats: self.store.stats(),
        }
    }
}
