//! MemoryStore - in-process backing store
//!
//! Producers push serialized records under a key; the pump drains a key
//! with a single take under the lock.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use contracts::{AnalyticsStore, BoxFuture, ContractError, StoreOptions};
use tracing::{debug, warn};

/// In-process `AnalyticsStore`
///
/// Options:
/// - `max_entries`: per-key cap, further pushes are rejected (0 = unlimited)
#[derive(Debug, Default)]
pub struct MemoryStore {
    sets: Mutex<HashMap<String, Vec<Bytes>>>,
    max_entries: usize,
}

impl MemoryStore {
    /// Create an empty, unbounded store
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one serialized record under `key`
    ///
    /// Returns false if the key is at capacity and the entry was rejected.
    pub fn push(&self, key: &str, entry: impl Into<Bytes>) -> bool {
        let mut sets = self.lock();
        let set = sets.entry(key.to_string()).or_default();
        if self.max_entries > 0 && set.len() >= self.max_entries {
            warn!(key, max = self.max_entries, "Analytics set full, entry rejected");
            return false;
        }
        set.push(entry.into());
        true
    }

    /// Number of pending entries under `key`
    pub fn len(&self, key: &str) -> usize {
        self.lock().get(key).map_or(0, Vec::len)
    }

    /// Whether nothing is pending under `key`
    pub fn is_empty(&self, key: &str) -> bool {
        self.len(key) == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Bytes>>> {
        self.sets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn drain(&self, key: &str) -> Vec<Bytes> {
        self.lock().remove(key).unwrap_or_default()
    }
}

impl AnalyticsStore for MemoryStore {
    fn kind(&self) -> &str {
        "memory"
    }

    fn init<'a>(
        &'a mut self,
        options: &'a StoreOptions,
    ) -> BoxFuture<'a, Result<(), ContractError>> {
        Box::pin(async move {
            if let Some(raw) = options.get("max_entries") {
                self.max_entries = raw.parse().map_err(|e| {
                    ContractError::store_init("memory", format!("invalid max_entries '{raw}': {e}"))
                })?;
            }
            debug!(max_entries = self.max_entries, "MemoryStore initialized");
            Ok(())
        })
    }

    fn get_and_delete_set<'a>(
        &'a self,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Bytes>, ContractError>> {
        Box::pin(async move { Ok(self.drain(key)) })
    }
}
