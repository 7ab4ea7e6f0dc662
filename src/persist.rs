//! Small key-value persistence for the search store and search history.

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;

pub const EVENTS_KEY: &str = "tge-events-store";
pub const HISTORY_KEY: &str = "tge-search-history";

pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

pub type SharedKv = Arc<dyn KvStore>;

/// Deserialize the JSON under `key`. Missing key -> `Ok(None)`.
pub fn load_json<T: DeserializeOwned>(kv: &dyn KvStore, key: &str) -> Result<Option<T>> {
    match kv.get(key)? {
        Some(s) => Ok(Some(
            serde_json::from_str(&s).with_context(|| format!("decoding stored `{key}`"))?,
        )),
        None => Ok(None),
    }
}

pub fn save_json<T: Serialize>(kv: &dyn KvStore, key: &str, value: &T) -> Result<()> {
    let s = serde_json::to_string(value)?;
    kv.set(key, &s)
}

/// Writes the JSON snapshot of one key. Inside a tokio runtime the write
/// runs on the blocking pool; outside one it happens inline. A write that
/// lands after a newer snapshot was already stored is skipped.
pub struct SnapshotWriter {
    kv: SharedKv,
    key: &'static str,
    next_seq: AtomicU64,
    written: Arc<Mutex<u64>>,
    last: Mutex<Option<JoinHandle<()>>>,
}

fn relock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

fn write_if_newer(kv: &dyn KvStore, key: &str, body: &str, seq: u64, written: &Mutex<u64>) -> Result<()> {
    let mut done = relock(written);
    if *done > seq {
        return Ok(());
    }
    kv.set(key, body)?;
    *done = seq;
    Ok(())
}

impl SnapshotWriter {
    pub fn new(kv: SharedKv, key: &'static str) -> Self {
        Self {
            kv,
            key,
            next_seq: AtomicU64::new(0),
            written: Arc::new(Mutex::new(0)),
            last: Mutex::new(None),
        }
    }

    pub fn kv(&self) -> &SharedKv {
        &self.kv
    }

    /// Serialize `value` now and store it. Errors from a background write
    /// are logged, not returned.
    pub fn save<T: Serialize>(&self, value: &T) -> Result<()> {
        let body = serde_json::to_string(value)?;
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let Ok(rt) = tokio::runtime::Handle::try_current() else {
            return write_if_newer(self.kv.as_ref(), self.key, &body, seq, &self.written);
        };
        let kv = Arc::clone(&self.kv);
        let written = Arc::clone(&self.written);
        let key = self.key;
        let handle = rt.spawn_blocking(move || {
            if let Err(e) = write_if_newer(kv.as_ref(), key, &body, seq, &written) {
                tracing::warn!(target: "persist", key, error = ?e, "snapshot write failed");
            }
        });
        *relock(&self.last) = Some(handle);
        Ok(())
    }

    /// Wait for the most recent background write to finish.
    pub async fn flush(&self) {
        let pending = relock(&self.last).take();
        if let Some(handle) = pending {
            if let Err(e) = handle.await {
                tracing::warn!(target: "persist", key = self.key, error = ?e, "snapshot write task failed");
            }
        }
    }
}

/// One `<key>.json` file per key under `dir`; writes go through a temp file
/// and a rename.
#[derive(Debug, Clone)]
pub struct FileKvStore {
    dir: PathBuf,
}

impl FileKvStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

impl KvStore for FileKvStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading `{key}`")),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let mut f = fs::File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
        f.write_all(value.as_bytes())?;
        f.sync_all()?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryKvStore {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        relock(&self.map)
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }
}
