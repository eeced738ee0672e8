//! Progress reporting types for sync operations.
//!
//! The engine reports what it does through [`SyncProgress`] events delivered to
//! an optional callback. Callers that only want log output can use
//! [`tracing_reporter`].

use crate::space::SpaceId;

/// Progress events emitted during a sync run.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// A plan was built.
    PlanReady {
        /// Items selected by the caller.
        selected: usize,
        /// Executable steps after deduplication and ancestor insertion.
        steps: usize,
        /// Items marked skip.
        skipped: usize,
    },

    /// Starting to prefetch content.
    HydrationStarted {
        /// Non-folder items to prefetch.
        total: usize,
        /// Concurrent workers.
        workers: usize,
    },

    /// Prefetch finished.
    HydrationComplete {
        total: usize,
        drafts: usize,
        published: usize,
        misses: usize,
    },

    /// Starting to sync an item.
    ItemStarted {
        /// Full path of the item.
        full_slug: String,
        /// `create` or `update`.
        operation: &'static str,
    },

    /// An item was written to the target.
    ItemSynced {
        full_slug: String,
        operation: &'static str,
        /// Transport retries observed for the item.
        retries: u32,
    },

    /// An item failed.
    ItemFailed {
        full_slug: String,
        /// Error message.
        error: String,
    },

    /// An ancestor folder was created in the target.
    FolderCreated {
        full_slug: String,
    },

    /// A write was rejected for a missing parent; the ancestor chain is being
    /// rebuilt before one retry.
    AncestorRepair {
        full_slug: String,
    },

    /// The target record's identity was aligned with the source.
    IdentityReconciled {
        full_slug: String,
    },

    /// The space throttled a request and its rate was lowered.
    Throttled {
        space: SpaceId,
        /// New rate in requests per second.
        rate: f64,
    },

    /// Throttled, backing off before a transport retry.
    RateLimitBackoff {
        /// Name of the retried call.
        label: String,
        /// Time to wait before retry (ms).
        retry_after_ms: u64,
        /// Current attempt number.
        attempt: u32,
    },

    /// Warning message (non-fatal).
    Warning {
        /// Warning message.
        message: String,
    },
}

/// Callback for progress updates during sync operations.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
///
/// # Example
///
/// ```ignore
/// use spacesync::sync::{emit, SyncProgress, ProgressCallback};
///
/// fn my_step(on_progress: Option<&ProgressCallback>) {
///     emit(on_progress, SyncProgress::FolderCreated { full_slug: "app".into() });
/// }
/// ```
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}

/// A callback that forwards every event to `tracing`.
pub fn tracing_reporter() -> ProgressCallback {
    Box::new(|event| match event {
        SyncProgress::PlanReady {
            selected,
            steps,
            skipped,
        } => tracing::info!(selected, steps, skipped, "Plan ready"),
        SyncProgress::HydrationStarted { total, workers } => {
            tracing::info!(total, workers, "Hydrating content")
        }
        SyncProgress::HydrationComplete {
            total,
            drafts,
            published,
            misses,
        } => tracing::info!(total, drafts, published, misses, "Hydration complete"),
        SyncProgress::ItemStarted {
            full_slug,
            operation,
        } => tracing::debug!(%full_slug, operation, "Syncing item"),
        SyncProgress::ItemSynced {
            full_slug,
            operation,
            retries,
        } => tracing::info!(%full_slug, operation, retries, "Item synced"),
        SyncProgress::ItemFailed { full_slug, error } => {
            tracing::error!(%full_slug, %error, "Item failed")
        }
        SyncProgress::FolderCreated { full_slug } => {
            tracing::info!(%full_slug, "Created folder")
        }
        SyncProgress::AncestorRepair { full_slug } => {
            tracing::warn!(%full_slug, "Parent missing, rebuilding ancestors")
        }
        SyncProgress::IdentityReconciled { full_slug } => {
            tracing::debug!(%full_slug, "Identity reconciled")
        }
        SyncProgress::Throttled { space, rate } => {
            tracing::warn!(space, rate, "Throttled, lowering request rate")
        }
        SyncProgress::RateLimitBackoff {
            label,
            retry_after_ms,
            attempt,
        } => tracing::debug!(%label, retry_after_ms, attempt, "Backing off"),
        SyncProgress::Warning { message } => tracing::warn!("{}", message),
    })
}
