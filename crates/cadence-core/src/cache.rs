//! In-process memo of resolved lookups.
//!
//! Entries are keyed by the exact pair of names used for the lookup (for
//! example artist and album title). Keys are case-sensitive and never
//! normalised. Entries never expire; they are only
//! replaced by another `set` or dropped by `clear`.
//!
//! A second, narrower map holds bare identifiers for pairs that were resolved
//! by some other route (a barcode lookup, say) before the full record was
//! fetched.
//!
//! There is no single-flight: two tasks missing on the same key will both
//! go to the network and the later `set` wins.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

const KEY_SEPARATOR: char = '|';

type Key = (String, String);

fn key(primary: &str, secondary: &str) -> Key {
    (primary.to_string(), secondary.to_string())
}

/// Display form of a key, as listed by [`MetadataCache::stats`].
fn display_key((primary, secondary): &Key) -> String {
    format!("{primary}{KEY_SEPARATOR}{secondary}")
}

/// Snapshot of cache contents for monitoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of full records.
    pub entries: usize,
    /// Keys of full records as `"primary|secondary"`, sorted.
    pub keys: Vec<String>,
    /// Number of bare resolved identifiers.
    pub resolved_ids: usize,
}

/// Thread-safe memo of resolved records and identifiers. Clones share state.
#[derive(Debug)]
pub struct MetadataCache<V> {
    records: Arc<RwLock<HashMap<Key, V>>>,
    resolved_ids: Arc<RwLock<HashMap<Key, String>>>,
}

impl<V> Clone for MetadataCache<V> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
            resolved_ids: Arc::clone(&self.resolved_ids),
        }
    }
}

impl<V> Default for MetadataCache<V> {
    fn default() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            resolved_ids: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| {
        tracing::warn!("Recovered from poisoned cache lock");
        poisoned.into_inner()
    })
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| {
        tracing::warn!("Recovered from poisoned cache lock");
        poisoned.into_inner()
    })
}

impl<V: Clone> MetadataCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, primary: &str, secondary: &str) -> Option<V> {
        read(&self.records)
            .get(&key(primary, secondary))
            .cloned()
    }

    pub fn set(&self, primary: &str, secondary: &str, value: V) {
        write(&self.records).insert(key(primary, secondary), value);
    }

    /// Identifier resolved for the pair without the full record.
    pub fn get_id(&self, primary: &str, secondary: &str) -> Option<String> {
        read(&self.resolved_ids)
            .get(&key(primary, secondary))
            .cloned()
    }

    pub fn set_id(&self, primary: &str, secondary: &str, id: impl Into<String>) {
        write(&self.resolved_ids).insert(key(primary, secondary), id.into());
    }

    /// Drop every record and identifier.
    pub fn clear(&self) {
        write(&self.records).clear();
        write(&self.resolved_ids).clear();
    }

    pub fn stats(&self) -> CacheStats {
        let mut keys: Vec<String> = read(&self.records).keys().map(display_key).collect();
        keys.sort();
        CacheStats {
            entries: keys.len(),
            keys,
            resolved_ids: read(&self.resolved_ids).len(),
        }
    }
}
