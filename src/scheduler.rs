// src/scheduler.rs
//! Fire-and-forget background work (neighbour preloads) and the periodic
//! cache eviction ticker.
//!
//! Tasks never report back to whoever submitted them. A task that returns
//! `Err` or panics is logged and lands in a bounded dead-letter list.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::cache::PeriodCache;

pub const DEAD_LETTER_CAP: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeadLetter {
    pub label: String,
    pub error: String,
    pub at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    handles: Mutex<Vec<JoinHandle<()>>>,
    dead: Mutex<VecDeque<DeadLetter>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

impl Inner {
    fn dead_letter(&self, label: String, error: String) {
        tracing::warn!(target: "calendar", task = %label, error = %error, "background task failed");
        let mut q = lock(&self.dead);
        if q.len() >= DEAD_LETTER_CAP {
            q.pop_front();
        }
        q.push_back(DeadLetter {
            label,
            error,
            at: Utc::now(),
        });
    }
}

#[derive(Clone, Default)]
pub struct BackgroundScheduler {
    inner: Arc<Inner>,
}

impl BackgroundScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `task` on the current runtime and return immediately.
    pub fn submit<F>(&self, label: impl Into<String>, task: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let label = label.into();
        let inner = Arc::clone(&self.inner);
        let work = tokio::spawn(task);
        let watcher = tokio::spawn(async move {
            match work.await {
                Ok(Ok(())) => tracing::debug!(target: "calendar", task = %label, "background task done"),
                Ok(Err(e)) => inner.dead_letter(label, format!("{e:#}")),
                Err(e) => inner.dead_letter(label, e.to_string()),
            }
        });
        let mut handles = lock(&self.inner.handles);
        handles.retain(|h| !h.is_finished());
        handles.push(watcher);
    }

    /// Number of submitted tasks not yet finished.
    pub fn pending(&self) -> usize {
        lock(&self.inner.handles)
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    /// Wait until every submitted task, including ones submitted while
    /// waiting, has finished.
    pub async fn wait_idle(&self) {
        loop {
            let batch: Vec<_> = std::mem::take(&mut *lock(&self.inner.handles));
            if batch.is_empty() {
                return;
            }
            for h in batch {
                // Watchers never panic; a JoinError here means runtime shutdown.
                let _ = h.await;
            }
        }
    }

    /// Oldest first.
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        lock(&self.inner.dead).iter().cloned().collect()
    }
}

/// Call `evict_expired` every `every`, starting one interval from now.
pub fn spawn_eviction_ticker(cache: Arc<PeriodCache>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let removed = cache.evict_expired();
            tracing::debug!(target: "cache", removed, "eviction tick");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn failures_and_panics_go_to_dead_letters() {
        let s = BackgroundScheduler::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let r = ran.clone();
        s.submit("ok", async move {
            r.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        s.submit("err", async { Err(anyhow::anyhow!("upstream down")) });
        s.submit("panic", async {
            let v: Option<()> = None;
            v.expect("boom");
            Ok(())
        });
        s.wait_idle().await;

        assert_eq!(ran.load(Ordering::SeqCst), 1);
        let dl = s.dead_letters();
        let mut labels: Vec<_> = dl.iter().map(|d| d.label.as_str()).collect();
        labels.sort();
        assert_eq!(labels, vec!["err", "panic"]);
        assert!(dl.iter().any(|d| d.error.contains("upstream down")));
        assert_eq!(s.pending(), 0);
    }

    #[tokio::test]
    async fn dead_letter_list_is_bounded() {
        let s = BackgroundScheduler::new();
        for i in 0..(DEAD_LETTER_CAP + 5) {
            s.submit(format!("t{i}"), async { Err(anyhow::anyhow!("x")) });
        }
        s.wait_idle().await;
        assert_eq!(s.dead_letters().len(), DEAD_LETTER_CAP);
    }
}
