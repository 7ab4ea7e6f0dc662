//! history.rs: recent search queries, most recent first.

use std::sync::Mutex;

use crate::persist::{load_json, SharedKv, SnapshotWriter, HISTORY_KEY};

pub const MAX_HISTORY: usize = 10;

pub struct SearchHistory {
    inner: Mutex<Vec<String>>,
    cap: usize,
    writer: Option<SnapshotWriter>,
}

impl SearchHistory {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            inner: Mutex::new(Vec::with_capacity(cap.min(1_000))),
            cap: cap.clamp(1, 1_000),
            writer: None,
        }
    }

    pub fn persisted(cap: usize, kv: SharedKv) -> Self {
        Self {
            writer: Some(SnapshotWriter::new(kv, HISTORY_KEY)),
            ..Self::with_capacity(cap)
        }
    }

    /// Move `query` to the front; older duplicates are dropped and the list
    /// is cut to capacity. Blank queries are ignored.
    pub fn push(&self, query: &str) {
        let q = query.trim();
        if q.is_empty() {
            return;
        }
        let snapshot = {
            let mut v = self.inner.lock().unwrap_or_else(|p| p.into_inner());
            v.retain(|item| item != q);
            v.insert(0, q.to_string());
            v.truncate(self.cap);
            v.clone()
        };
        self.save(&snapshot);
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn recent(&self, n: usize) -> Vec<String> {
        let v = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        v.iter().take(n).cloned().collect()
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).clear();
        self.save(&[]);
    }

    /// Restore the persisted list, capped to this history's capacity.
    pub fn load(&self) -> anyhow::Result<usize> {
        let Some(writer) = &self.writer else { return Ok(0) };
        let mut stored: Vec<String> =
            load_json(writer.kv().as_ref(), HISTORY_KEY)?.unwrap_or_default();
        stored.truncate(self.cap);
        let n = stored.len();
        *self.inner.lock().unwrap_or_else(|p| p.into_inner()) = stored;
        Ok(n)
    }

    fn save(&self, items: &[String]) {
        let Some(writer) = &self.writer else { return };
        if let Err(e) = writer.save(&items) {
            tracing::warn!(target: "search", error = ?e, "failed to persist search history");
        }
    }

    pub async fn flush(&self) {
        if let Some(writer) = &self.writer {
            writer.flush().await;
        }
    }
}

impl Default for SearchHistory {
    fn default() -> Self {
        Self::with_capacity(MAX_HISTORY)
    }
}
