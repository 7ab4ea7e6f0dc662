//! # Search store
//! Events indexed for search, independent of the period cache.
//!
//! Every event is kept with precomputed search text and tags, and is posted
//! into five inverted indexes: word, blockchain, credibility, month and tag.
//! `add_events` upserts by id: the previous version's postings are retracted
//! first, so a removed tag or renamed chain never lingers in an index. Nothing
//! is deleted except by [`SearchStore::clear`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use crate::ingest::types::{Credibility, TgeEvent};
use crate::period::Period;
use crate::persist::{load_json, SharedKv, SnapshotWriter, EVENTS_KEY};

/// Query tokens and indexed words shorter than this are ignored.
pub const MIN_TOKEN_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedEvent {
    #[serde(flatten)]
    pub event: TgeEvent,
    pub search_text: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockchain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credibility: Option<Credibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.query.as_deref().map_or(true, |q| q.trim().is_empty())
            && self.blockchain.is_none()
            && self.credibility.is_none()
            && self.date_range.is_none()
            && self.tags.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub events: Vec<IndexedEvent>,
    pub total: usize,
    pub query: String,
    pub filters: SearchFilters,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total_events: usize,
    pub blockchains: usize,
    pub credibility_levels: usize,
    pub indexed_words: usize,
    pub months: usize,
    pub tags: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    events: Vec<TgeEvent>,
    saved_at: DateTime<Utc>,
}

type Postings<K> = BTreeMap<K, BTreeSet<String>>;

fn post<K: Ord>(index: &mut Postings<K>, key: K, id: &str) {
    index.entry(key).or_default().insert(id.to_string());
}

fn unpost<K: Ord>(index: &mut Postings<K>, key: &K, id: &str) {
    if let Some(ids) = index.get_mut(key) {
        ids.remove(id);
        if ids.is_empty() {
            index.remove(key);
        }
    }
}

/// Split on whitespace, trim punctuation at the edges, drop short fragments.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| w.chars().count() >= MIN_TOKEN_LEN)
}

pub fn slug(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
}

fn search_text(ev: &TgeEvent) -> String {
    let mut parts: Vec<&str> = vec![ev.name.as_str()];
    parts.extend(ev.symbol.as_deref());
    parts.push(ev.description.as_str());
    parts.extend(ev.blockchain.as_deref());
    parts.extend(ev.markets.iter().map(|m| m.title.as_str()));
    parts.push(ev.credibility.as_str());
    parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

const CATEGORIES: &[(&str, &[&str])] = &[
    ("category-defi", &["defi", "lending", "yield"]),
    ("category-gaming", &["gaming", "nft", "metaverse"]),
    ("category-infrastructure", &["layer", "scaling", "rollup"]),
    ("category-governance", &["governance", "dao"]),
];

fn tags_for(ev: &TgeEvent) -> Vec<String> {
    let mut tags = Vec::new();
    if let Some(chain) = &ev.blockchain {
        tags.push(format!("blockchain-{}", slug(chain)));
    }
    tags.push(format!("credibility-{}", ev.credibility));
    for m in &ev.markets {
        tags.push(format!("market-{}", slug(&m.title)));
    }
    tags.push(format!("month-{}", ev.start_date.format("%Y-%m")));
    tags.push(format!("year-{}", ev.start_date.format("%Y")));
    let desc = ev.description.to_lowercase();
    for (tag, needles) in CATEGORIES {
        if needles.iter().any(|n| desc.contains(n)) {
            tags.push((*tag).to_string());
        }
    }
    tags.sort();
    tags.dedup();
    tags
}

impl IndexedEvent {
    pub fn new(event: TgeEvent) -> Self {
        Self {
            search_text: search_text(&event),
            tags: tags_for(&event),
            event,
        }
    }

    fn words(&self) -> BTreeSet<String> {
        tokenize(&self.search_text).collect()
    }
}

#[derive(Debug, Default)]
struct Inner {
    events: HashMap<String, IndexedEvent>,
    words: Postings<String>,
    /// Keyed by lower-cased chain; the label is the first spelling seen.
    blockchains: Postings<String>,
    blockchain_labels: HashMap<String, String>,
    credibility: Postings<Credibility>,
    periods: Postings<Period>,
    tags: Postings<String>,
}

impl Inner {
    fn index(&mut self, ie: &IndexedEvent) {
        let id = ie.event.id.as_str();
        for w in ie.words() {
            post(&mut self.words, w, id);
        }
        if let Some(chain) = &ie.event.blockchain {
            let key = chain.to_lowercase();
            self.blockchain_labels
                .entry(key.clone())
                .or_insert_with(|| chain.clone());
            post(&mut self.blockchains, key, id);
        }
        post(&mut self.credibility, ie.event.credibility, id);
        post(&mut self.periods, Period::containing(ie.event.start_date), id);
        for t in &ie.tags {
            post(&mut self.tags, t.clone(), id);
        }
    }

    fn retract(&mut self, ie: &IndexedEvent) {
        let id = ie.event.id.as_str();
        for w in ie.words() {
            unpost(&mut self.words, &w, id);
        }
        if let Some(chain) = &ie.event.blockchain {
            let key = chain.to_lowercase();
            unpost(&mut self.blockchains, &key, id);
            if !self.blockchains.contains_key(&key) {
                self.blockchain_labels.remove(&key);
            }
        }
        unpost(&mut self.credibility, &ie.event.credibility, id);
        unpost(&mut self.periods, &Period::containing(ie.event.start_date), id);
        for t in &ie.tags {
            unpost(&mut self.tags, t, id);
        }
    }

    fn upsert(&mut self, ev: TgeEvent) {
        let ie = IndexedEvent::new(ev);
        if let Some(prev) = self.events.remove(&ie.event.id) {
            self.retract(&prev);
        }
        self.index(&ie);
        self.events.insert(ie.event.id.clone(), ie);
    }

    /// Ids of events with an indexed word containing `token`.
    fn word_matches(&self, token: &str) -> BTreeSet<String> {
        self.words
            .iter()
            .filter(|(w, _)| w.contains(token))
            .flat_map(|(_, ids)| ids.iter().cloned())
            .collect()
    }

    fn resolve(&self, ids: impl IntoIterator<Item = String>) -> Vec<IndexedEvent> {
        let mut out: Vec<IndexedEvent> = ids
            .into_iter()
            .filter_map(|id| self.events.get(&id).cloned())
            .collect();
        out.sort_by(|a, b| {
            a.event
                .start_date
                .cmp(&b.event.start_date)
                .then_with(|| a.event.id.cmp(&b.event.id))
        });
        out
    }
}

fn narrow(candidates: &mut Option<BTreeSet<String>>, ids: BTreeSet<String>) {
    *candidates = Some(match candidates.take() {
        None => ids,
        Some(c) => c.intersection(&ids).cloned().collect(),
    });
}

pub struct SearchStore {
    inner: Mutex<Inner>,
    writer: Option<SnapshotWriter>,
}

impl Default for SearchStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl SearchStore {
    /// No persistence.
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            writer: None,
        }
    }

    pub fn with_kv(kv: SharedKv) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            writer: Some(SnapshotWriter::new(kv, EVENTS_KEY)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Upsert by id (last write wins), then persist the snapshot.
    pub fn add_events(&self, events: Vec<TgeEvent>) {
        let n = events.len();
        let total = {
            let mut g = self.lock();
            for ev in events {
                g.upsert(ev);
            }
            g.events.len()
        };
        tracing::debug!(target: "store", added = n, total, "events indexed");
        if let Err(e) = self.persist() {
            tracing::warn!(target: "store", error = ?e, "failed to persist event store");
        }
    }

    pub fn get(&self, id: &str) -> Option<IndexedEvent> {
        self.lock().events.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Intersection of every present filter, sorted by start date.
    /// No filters at all returns every event.
    pub fn search(&self, filters: &SearchFilters) -> SearchResult {
        let g = self.lock();
        let mut candidates: Option<BTreeSet<String>> = None;

        if let Some(q) = filters.query.as_deref().filter(|q| !q.trim().is_empty()) {
            let tokens: BTreeSet<String> = tokenize(q).collect();
            if tokens.is_empty() {
                // Only short fragments: nothing can match.
                narrow(&mut candidates, BTreeSet::new());
            }
            for t in tokens {
                narrow(&mut candidates, g.word_matches(&t));
            }
        }
        if let Some(chain) = &filters.blockchain {
            let ids = g
                .blockchains
                .get(&chain.trim().to_lowercase())
                .cloned()
                .unwrap_or_default();
            narrow(&mut candidates, ids);
        }
        if let Some(c) = filters.credibility {
            narrow(&mut candidates, g.credibility.get(&c).cloned().unwrap_or_default());
        }
        if let Some(range) = filters.date_range {
            let ids = g
                .events
                .values()
                .filter(|e| range.contains(e.event.start_date))
                .map(|e| e.event.id.clone())
                .collect();
            narrow(&mut candidates, ids);
        }
        if !filters.tags.is_empty() {
            let ids = filters
                .tags
                .iter()
                .filter_map(|t| g.tags.get(&t.trim().to_lowercase()))
                .flat_map(|ids| ids.iter().cloned())
                .collect();
            narrow(&mut candidates, ids);
        }

        let events = match candidates {
            Some(ids) => g.resolve(ids),
            None => g.resolve(g.events.keys().cloned().collect::<Vec<_>>()),
        };
        SearchResult {
            total: events.len(),
            events,
            query: filters.query.clone().unwrap_or_default(),
            filters: filters.clone(),
        }
    }

    /// Events whose start date falls in `period`, via the month index.
    pub fn events_for_period(&self, period: Period) -> Vec<IndexedEvent> {
        let g = self.lock();
        let ids = g.periods.get(&period).cloned().unwrap_or_default();
        g.resolve(ids)
    }

    /// Distinct chains, first-seen spelling, sorted.
    pub fn blockchains(&self) -> Vec<String> {
        let g = self.lock();
        let mut out: Vec<String> = g.blockchain_labels.values().cloned().collect();
        out.sort();
        out
    }

    pub fn credibility_levels(&self) -> Vec<Credibility> {
        self.lock().credibility.keys().copied().collect()
    }

    pub fn tags(&self) -> Vec<String> {
        self.lock().tags.keys().cloned().collect()
    }

    pub fn all_events(&self) -> Vec<IndexedEvent> {
        let g = self.lock();
        g.resolve(g.events.keys().cloned().collect::<Vec<_>>())
    }

    pub fn stats(&self) -> StoreStats {
        let g = self.lock();
        StoreStats {
            total_events: g.events.len(),
            blockchains: g.blockchains.len(),
            credibility_levels: g.credibility.len(),
            indexed_words: g.words.len(),
            months: g.periods.len(),
            tags: g.tags.len(),
        }
    }

    /// Drop every event and index, then persist the empty snapshot.
    pub fn clear(&self) {
        *self.lock() = Inner::default();
        tracing::info!(target: "store", "event store cleared");
        if let Err(e) = self.persist() {
            tracing::warn!(target: "store", error = ?e, "failed to persist event store");
        }
    }

    /// Snapshot every event; the file write runs off the async workers.
    pub fn persist(&self) -> anyhow::Result<()> {
        let Some(writer) = &self.writer else { return Ok(()) };
        let snapshot = Snapshot {
            events: self.all_events().into_iter().map(|e| e.event).collect(),
            saved_at: Utc::now(),
        };
        writer.save(&snapshot)
    }

    /// Wait for the last snapshot write to land.
    pub async fn flush(&self) {
        if let Some(writer) = &self.writer {
            writer.flush().await;
        }
    }

    /// Re-index the persisted snapshot. Returns how many events were loaded.
    pub fn load(&self) -> anyhow::Result<usize> {
        let Some(writer) = &self.writer else { return Ok(0) };
        let Some(snapshot) = load_json::<Snapshot>(writer.kv().as_ref(), EVENTS_KEY)? else {
            return Ok(0);
        };
        let n = snapshot.events.len();
        {
            let mut g = self.lock();
            for ev in snapshot.events {
                g.upsert(ev);
            }
        }
        tracing::info!(target: "store", loaded = n, saved_at = %snapshot.saved_at, "event store restored");
        Ok(n)
    }
}
