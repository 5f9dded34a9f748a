use crate::closed::ClosedTab;
use crate::error::TabError;
use crate::tab::TrackedTab;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const TAB_ORDER_KEY: &str = "tab_order";
pub const CLOSED_TABS_KEY: &str = "closed_tabs";

/// Durable key-value storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Value>>;
    fn set(&mut self, key: &str, value: Value) -> anyhow::Result<()>;
    fn get_all(&self) -> anyhow::Result<Map<String, Value>>;
}

/// Store backed by a single JSON object on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
        Ok(self.get_all()?.remove(key))
    }

    /// Replace one key. A file that no longer parses is overwritten rather
    /// than blocking every later write.
    fn set(&mut self, key: &str, value: Value) -> anyhow::Result<()> {
        let mut all = match self.get_all() {
            Ok(all) => all,
            Err(e) if e.downcast_ref::<serde_json::Error>().is_some() => {
                warn!(path = %self.path.display(), "discarding unreadable state file: {e}");
                Map::new()
            }
            Err(e) => return Err(e),
        };
        all.insert(key.to_string(), value);
        let json = serde_json::to_string_pretty(&all)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    fn get_all(&self) -> anyhow::Result<Map<String, Value>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        Ok(serde_json::from_str(&content)?)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Map<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
        Ok(self.data.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> anyhow::Result<()> {
        self.data.insert(key.to_string(), value);
        Ok(())
    }

    fn get_all(&self) -> anyhow::Result<Map<String, Value>> {
        Ok(self.data.clone())
    }
}

#[derive(Debug, Clone)]
struct PendingWrite {
    order: Option<Vec<String>>,
    closed: Option<Vec<ClosedTab>>,
    deadline: Instant,
}

/// Coalescing writer for the tab order and closed tab list.
///
/// The first schedule in an idle gateway fixes the flush deadline; later
/// schedules only replace the payload, so a steady stream of changes still
/// reaches storage once per window.
#[derive(Debug)]
pub struct PersistenceGateway<S> {
    store: S,
    delay: Duration,
    pending: Option<PendingWrite>,
}

impl<S: KeyValueStore> PersistenceGateway<S> {
    pub fn new(store: S, delay: Duration) -> Self {
        Self {
            store,
            delay,
            pending: None,
        }
    }

    pub fn schedule_persist(&mut self, sequence: &[TrackedTab], now: Instant) {
        let urls = sequence.iter().map(|t| t.url.clone()).collect();
        self.pending_mut(now).order = Some(urls);
    }

    pub fn schedule_closed(&mut self, closed: Vec<ClosedTab>, now: Instant) {
        self.pending_mut(now).closed = Some(closed);
    }

    fn pending_mut(&mut self, now: Instant) -> &mut PendingWrite {
        let delay = self.delay;
        self.pending.get_or_insert_with(|| PendingWrite {
            order: None,
            closed: None,
            deadline: now + delay,
        })
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.deadline)
    }

    /// Write the pending payload if its deadline has passed. Returns whether
    /// anything was written.
    pub fn flush_due(&mut self, now: Instant) -> Result<bool, TabError> {
        match &self.pending {
            Some(p) if p.deadline <= now => self.flush(),
            _ => Ok(false),
        }
    }

    /// Write the pending payload immediately. Both keys are attempted even
    /// if one fails, and the first error is returned. A failed write is
    /// dropped; the next change schedules a fresh one.
    pub fn flush(&mut self) -> Result<bool, TabError> {
        let Some(pending) = self.pending.take() else {
            return Ok(false);
        };
        let mut order_written = Ok(());
        if let Some(order) = pending.order {
            debug!(tabs = order.len(), "persisting tab order");
            order_written = self.write(TAB_ORDER_KEY, Value::from(order));
        }
        let mut closed_written = Ok(());
        if let Some(closed) = pending.closed {
            closed_written = serde_json::to_value(&closed)
                .map_err(|e| TabError::StorageUnavailable(e.to_string()))
                .and_then(|value| self.write(CLOSED_TABS_KEY, value));
        }
        order_written.and(closed_written).map(|()| true)
    }

    fn write(&mut self, key: &str, value: Value) -> Result<(), TabError> {
        self.store.set(key, value).map_err(|e| {
            warn!(key, "failed to persist: {e}");
            TabError::StorageUnavailable(e.to_string())
        })
    }

    /// URLs in their last persisted order; empty when nothing usable is
    /// stored.
    pub fn load_prior_order(&self) -> Vec<String> {
        self.load(TAB_ORDER_KEY).unwrap_or_default()
    }

    pub fn load_closed_tabs(&self) -> Vec<ClosedTab> {
        self.load(CLOSED_TABS_KEY).unwrap_or_default()
    }

    fn load<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = match self.store.get(key) {
            Ok(Some(v)) => v,
            Ok(None) => return None,
            Err(e) => {
                let err = TabError::StorageUnavailable(e.to_string());
                warn!(key, "{err}");
                return None;
            }
        };
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                let err = TabError::MalformedPersistedOrder(e.to_string());
                warn!(key, "{err}, starting cold");
                None
            }
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }
}
