//! Persisted, capacity-bounded request history.
//!
//! # Design
//! The persisted record is the source of truth. It holds the whole list,
//! newest first, and is rewritten wholesale on every mutation. The in-memory
//! copy is only a cache: it is filled from storage on `open` and `reload`,
//! and replaced after each successful write.
//!
//! Observers register explicitly and are called after every mutation with
//! the new list. They run outside the store's locks, so a callback may read
//! the store or unsubscribe itself.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::HistoryError;
use crate::headers::HeaderEntry;
use crate::http::HttpMethod;
use crate::request::RequestSpec;

/// Maximum number of entries kept.
pub const HISTORY_CAPACITY: usize = 20;

/// Well-known name of the persisted record.
pub const STORAGE_NAME: &str = "requestHistory";

/// One previously executed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub url: String,
    pub method: HttpMethod,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<HeaderEntry>,
}

impl HistoryEntry {
    /// Record `spec` as executed now. `headers` are the rows as edited, not
    /// the assembled mapping, so the auth header is never persisted.
    pub fn record(spec: &RequestSpec, headers: &[HeaderEntry]) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: spec.url.clone(),
            method: spec.method,
            timestamp: Utc::now(),
            body: spec.body.clone(),
            headers: headers.to_vec(),
        }
    }

    /// Short relative age: `42s ago`, `5m ago`, `3h ago`, or the date.
    pub fn time_ago(&self, now: DateTime<Utc>) -> String {
        let secs = (now - self.timestamp).num_seconds().max(0);
        match secs {
            s if s < 60 => format!("{s}s ago"),
            s if s < 3_600 => format!("{}m ago", s / 60),
            s if s < 86_400 => format!("{}h ago", s / 3_600),
            _ => self.timestamp.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Durable home of the history record.
pub trait HistoryStorage: Send + Sync {
    /// The stored list; empty if nothing was ever stored.
    fn load(&self) -> Result<Vec<HistoryEntry>, HistoryError>;
    /// Replace the stored list.
    fn save(&self, entries: &[HistoryEntry]) -> Result<(), HistoryError>;
    fn clear(&self) -> Result<(), HistoryError>;
}

/// One JSON file. Writes go through a sibling temp file and a rename, so a
/// reader sees either the old list or the new one.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<dir>/requestHistory.json`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(format!("{STORAGE_NAME}.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStorage for FileStorage {
    fn load(&self) -> Result<Vec<HistoryEntry>, HistoryError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, entries: &[HistoryEntry]) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), HistoryError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Serialized record held in memory; useful for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    record: Mutex<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self) -> MutexGuard<'_, Option<String>> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl HistoryStorage for MemoryStorage {
    fn load(&self) -> Result<Vec<HistoryEntry>, HistoryError> {
        match self.record().as_deref() {
            Some(raw) => Ok(serde_json::from_str(raw)?),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, entries: &[HistoryEntry]) -> Result<(), HistoryError> {
        *self.record() = Some(serde_json::to_string(entries)?);
        Ok(())
    }

    fn clear(&self) -> Result<(), HistoryError> {
        *self.record() = None;
        Ok(())
    }
}

impl<S: HistoryStorage + ?Sized> HistoryStorage for Arc<S> {
    fn load(&self) -> Result<Vec<HistoryEntry>, HistoryError> {
        (**self).load()
    }

    fn save(&self, entries: &[HistoryEntry]) -> Result<(), HistoryError> {
        (**self).save(entries)
    }

    fn clear(&self) -> Result<(), HistoryError> {
        (**self).clear()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Arc<dyn Fn(&[HistoryEntry]) + Send + Sync>;

pub struct HistoryStore {
    storage: Box<dyn HistoryStorage>,
    entries: Mutex<Vec<HistoryEntry>>,
    observers: Mutex<Vec<(SubscriptionId, Observer)>>,
    next_subscription: AtomicU64,
}

impl HistoryStore {
    /// Open the store, rehydrating from `storage`. An unreadable record is
    /// logged and treated as empty; it is left on disk until the next write.
    pub fn open(storage: impl HistoryStorage + 'static) -> Self {
        let entries = storage.load().unwrap_or_else(|e| {
            warn!(error = %e, "could not load request history; starting empty");
            Vec::new()
        });
        debug!(entries = entries.len(), "request history loaded");
        Self {
            storage: Box::new(storage),
            entries: Mutex::new(entries),
            observers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(0),
        }
    }

    /// Newest first.
    pub fn all(&self) -> Vec<HistoryEntry> {
        self.entries().clone()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Prepend `entry`, evicting anything past `HISTORY_CAPACITY`.
    pub fn append(&self, entry: HistoryEntry) -> Result<(), HistoryError> {
        let list = {
            let mut cached = self.entries();
            let mut list = self.storage.load().unwrap_or_else(|e| {
                warn!(error = %e, "stored request history unreadable; rebuilding from memory");
                cached.clone()
            });
            list.insert(0, entry);
            list.truncate(HISTORY_CAPACITY);
            self.storage.save(&list)?;
            *cached = list.clone();
            list
        };
        self.notify(&list);
        Ok(())
    }

    /// Empty persisted storage and memory. Memory is untouched if storage
    /// could not be cleared.
    pub fn clear(&self) -> Result<(), HistoryError> {
        {
            let mut cached = self.entries();
            self.storage.clear()?;
            cached.clear();
        }
        self.notify(&[]);
        Ok(())
    }

    /// Re-read persisted storage after an external change and broadcast.
    pub fn reload(&self) -> Result<(), HistoryError> {
        let list = {
            let mut cached = self.entries();
            let list = self.storage.load()?;
            *cached = list.clone();
            list
        };
        self.notify(&list);
        Ok(())
    }

    pub fn subscribe(
        &self,
        observer: impl Fn(&[HistoryEntry]) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.observers().push((id, Arc::new(observer)));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers();
        let before = observers.len();
        observers.retain(|(sid, _)| *sid != id);
        observers.len() != before
    }

    fn notify(&self, entries: &[HistoryEntry]) {
        let observers: Vec<Observer> = self
            .observers()
            .iter()
            .map(|(_, o)| Arc::clone(o))
            .collect();
        for observer in observers {
            observer(entries);
        }
    }

    fn entries(&self) -> MutexGuard<'_, Vec<HistoryEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn observers(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Observer)>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
