//! In-memory content caches used during a sync run.
//!
//! - [`ContentCache`] holds payloads fetched on demand, evicting the least
//!   recently used entries.
//! - [`HydrationCache`] holds draft and published variants prefetched in bulk,
//!   evicting in insertion order.
//!
//! Both are safe to share between workers; no lock is held across an await.

mod content;
mod hydration;

pub use content::ContentCache;
pub use hydration::{CacheEntry, HydrationCache};

use serde::Serialize;

/// Snapshot of both caches for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Entries in the on-demand cache.
    pub content_entries: usize,
    /// Capacity of the on-demand cache.
    pub content_capacity: usize,
    /// Lookups served by the on-demand cache.
    pub content_hits: u64,
    /// Lookups the on-demand cache could not serve.
    pub content_misses: u64,
    /// Entries in the hydration cache.
    pub hydration_entries: usize,
    /// Capacity of the hydration cache.
    pub hydration_capacity: usize,
}
