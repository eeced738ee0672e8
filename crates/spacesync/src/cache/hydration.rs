use std::sync::{Mutex, MutexGuard};

use indexmap::IndexMap;
use serde_json::Value;

use crate::space::{ContentVersion, StoryId};
use crate::sync::DEFAULT_HYDRATION_CAPACITY;

/// Prefetched variants of one record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheEntry {
    pub draft: Option<Value>,
    pub published: Option<Value>,
}

impl CacheEntry {
    /// Preferred payload: draft over published.
    #[must_use]
    pub fn best(&self) -> Option<&Value> {
        self.draft.as_ref().or(self.published.as_ref())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.draft.is_none() && self.published.is_none()
    }
}

/// Bulk-prefetched content store, evicting in insertion order.
///
/// Updating an existing entry keeps its original position, so a record whose
/// draft and published variants arrive separately is evicted as one unit.
#[derive(Debug)]
pub struct HydrationCache {
    entries: Mutex<IndexMap<StoryId, CacheEntry>>,
    capacity: usize,
}

impl Default for HydrationCache {
    fn default() -> Self {
        Self::new(DEFAULT_HYDRATION_CAPACITY)
    }
}

impl HydrationCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, IndexMap<StoryId, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn put_draft(&self, id: StoryId, value: Value) {
        self.put(id, ContentVersion::Draft, value);
    }

    pub fn put_published(&self, id: StoryId, value: Value) {
        self.put(id, ContentVersion::Published, value);
    }

    /// Store one variant of a record.
    pub fn put(&self, id: StoryId, version: ContentVersion, value: Value) {
        let mut entries = self.lock();
        if !entries.contains_key(&id) {
            while entries.len() >= self.capacity {
                entries.shift_remove_index(0);
            }
        }

        let entry = entries.entry(id).or_default();
        match version {
            ContentVersion::Draft => entry.draft = Some(value),
            ContentVersion::Published => entry.published = Some(value),
        }
    }

    /// Both variants of a record, if any were prefetched.
    pub fn get(&self, id: StoryId) -> Option<CacheEntry> {
        self.lock().get(&id).cloned()
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

    pub fn clear(&self) {
        self.lock().clear();
    }
}
