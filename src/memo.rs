//! Bounded in-memory LRU memo with optional TTL.
//!
//! Process-wide, shared behind `Arc`. Once `capacity` is reached the least
//! recently used entry is dropped. `ttl = None` keeps entries until evicted.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

pub struct Memo<K, V> {
    cache: Mutex<LruCache<K, (Instant, V)>>,
    ttl: Option<Duration>,
}

impl<K: Eq + Hash + Clone, V: Clone> Memo<K, V> {
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Entries never expire; only capacity eviction applies.
    pub fn permanent(capacity: usize) -> Self {
        Self::new(capacity, None)
    }

    /// A hit refreshes the entry's recency; an expired entry is dropped.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut cache = self.cache.lock().expect("memo mutex poisoned");
        let expired = match cache.get(key) {
            None => return None,
            Some((at, _)) => self.ttl.is_some_and(|ttl| at.elapsed() >= ttl),
        };
        if expired {
            cache.pop(key);
            return None;
        }
        cache.get(key).map(|(_, v)| v.clone())
    }

    pub fn insert(&self, key: K, value: V) {
        self.cache
            .lock()
            .expect("memo mutex poisoned")
            .put(key, (Instant::now(), value));
    }

    pub fn len(&self) -> usize {
        self.cache.lock().expect("memo mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
