use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use indexmap::IndexMap;
use serde_json::Value;

use crate::space::StoryId;
use crate::sync::DEFAULT_CONTENT_CACHE_CAPACITY;

/// Bounded LRU cache of fully fetched payloads, keyed by record id.
///
/// The map is kept in recency order: the front is the least recently used
/// entry, the back the most recent.
#[derive(Debug)]
pub struct ContentCache {
    entries: Mutex<IndexMap<StoryId, Value>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::new(DEFAULT_CONTENT_CACHE_CAPACITY)
    }
}

impl ContentCache {
    /// Create a cache holding at most `capacity` payloads (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, IndexMap<StoryId, Value>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Look up a payload, marking it most recently used.
    pub fn get(&self, id: StoryId) -> Option<Value> {
        let mut entries = self.lock();
        match entries.get_index_of(&id) {
            Some(index) => {
                let last = entries.len() - 1;
                entries.move_index(index, last);
                self.hits.fetch_add(1, Ordering::Relaxed);
                entries.get_index(last).map(|(_, v)| v.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or refresh a payload.
    ///
    /// At capacity, the least recently used entries are evicted first.
    pub fn insert(&self, id: StoryId, value: Value) {
        let mut entries = self.lock();
        if let Some(index) = entries.get_index_of(&id) {
            let last = entries.len() - 1;
            entries.move_index(index, last);
            if let Some(slot) = entries.get_mut(&id) {
                *slot = value;
            }
            return;
        }

        if entries.len() >= self.capacity {
            let excess = entries.len() - self.capacity + 1;
            for _ in 0..excess {
                entries.shift_remove_index(0);
            }
        }
        entries.insert(id, value);
    }

    pub fn contains(&self, id: StoryId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Drop every entry and reset the counters.
    pub fn clear(&self) {
        self.lock().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}
