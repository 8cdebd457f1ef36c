use parking_lot::Mutex;
use std::{collections::HashMap, fmt, sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::debug;

/// Callback invoked with every value the cache drops on expiry or on `clear`.
pub type EvictionCallback<V> = Arc<dyn Fn(V) + Send + Sync>;

/// Cache entry con TTL absoluto desde la inserción
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) > ttl
    }
}

/// String-keyed cache whose entries die `ttl` after insertion.
///
/// Reads never refresh an entry's age. Dead entries are removed lazily on the
/// next `get` of their key, or eagerly by [`TtlCache::purge_expired`] and
/// [`TtlCache::clear`]; each of those paths hands the removed value to the
/// eviction callback exactly once. Overwriting a key with `put` is not an
/// eviction and the previous value is returned to the caller instead.
///
/// All operations run under a single lock per cache instance. The eviction
/// callback always runs after the lock is released, so it may call back into
/// the cache.
pub struct TtlCache<V> {
    data: Mutex<HashMap<String, CacheEntry<V>>>,
    ttl: Duration,
    on_evict: Option<EvictionCallback<V>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
            ttl,
            on_evict: None,
        }
    }

    pub fn with_eviction<F>(ttl: Duration, on_evict: F) -> Self
    where
        F: Fn(V) + Send + Sync + 'static,
    {
        Self {
            data: Mutex::new(HashMap::new()),
            ttl,
            on_evict: Some(Arc::new(on_evict)),
        }
    }

    /// Returns the live value for `key`, evicting it first if it outlived the TTL.
    pub fn get(&self, key: &str) -> Option<V> {
        let expired = {
            let mut data = self.data.lock();
            let entry = data.get(key)?;
            if !entry.is_expired(self.ttl, Instant::now()) {
                return Some(entry.value.clone());
            }
            data.remove(key).map(|entry| entry.value)
        };

        if let Some(value) = expired {
            debug!("⏰ Entrada expirada removida del cache: {}", key);
            self.evict(value);
        }
        None
    }

    /// Inserts `value` with a fresh timestamp and returns the value it replaced.
    pub fn put(&self, key: impl Into<String>, value: V) -> Option<V> {
        self.data
            .lock()
            .insert(key.into(), CacheEntry::new(value))
            .map(|old| old.value)
    }

    /// Evicts every held value and empties the cache.
    pub fn clear(&self) {
        let drained: Vec<V> = {
            let mut data = self.data.lock();
            data.drain().map(|(_, entry)| entry.value).collect()
        };

        if !drained.is_empty() {
            debug!("🧹 Cache vaciado: {} entradas", drained.len());
        }
        for value in drained {
            self.evict(value);
        }
    }

    /// Limpia entradas expiradas y retorna el número de elementos removidos
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<V> = {
            let mut data = self.data.lock();
            let keys: Vec<String> = data
                .iter()
                .filter(|(_, entry)| entry.is_expired(self.ttl, now))
                .map(|(key, _)| key.clone())
                .collect();
            keys.iter()
                .filter_map(|key| data.remove(key))
                .map(|entry| entry.value)
                .collect()
        };

        let removed = expired.len();
        for value in expired {
            self.evict(value);
        }

        if removed > 0 {
            debug!("Limpiadas {} entradas expiradas del cache", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.lock().is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn evict(&self, value: V) {
        if let Some(on_evict) = &self.on_evict {
            on_evict(value);
        }
    }
}

impl<V> fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("entries", &self.data.lock().len())
            .field("ttl", &self.ttl)
            .field("has_eviction", &self.on_evict.is_some())
            .finish()
    }
}
