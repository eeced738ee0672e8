//! Sync context: one run's clients, limiter, caches and options.
//!
//! # Example
//!
//! ```ignore
//! use spacesync::sync::{PreflightPlanner, SyncContext, TargetIndex};
//!
//! let ctx = SyncContext::builder()
//!     .source(client.clone())
//!     .target(client)
//!     .source_space(1001)
//!     .target_space(2002)
//!     .progress(Arc::new(spacesync::sync::tracing_reporter()))
//!     .build()?;
//!
//! let planner = PreflightPlanner::new(source_nodes, target_nodes.clone());
//! let mut items = planner.optimize(planner.preflight(&selection));
//! ctx.hydrate(&items).await;
//!
//! let mut index = TargetIndex::from_nodes(target_nodes);
//! let summary = ctx.execute_preflight(&mut items, &mut index).await;
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::error::{Result, SyncError};
use super::gate::RequestGate;
use super::index::TargetIndex;
use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::{
    ItemReport, ItemState, PreflightItem, RunStatus, RunSummary, SyncOptions, SyncPlanStep,
};
use crate::cache::{CacheStats, ContentCache, HydrationCache};
use crate::retry::{self, RetryCounter};
use crate::space::{ContentNode, SpaceClient, SpaceId, SpaceRateLimiter};

/// Builder for creating a `SyncContext`.
pub struct SyncContextBuilder<C> {
    source: Option<Arc<C>>,
    target: Option<Arc<C>>,
    source_space: Option<SpaceId>,
    target_space: Option<SpaceId>,
    options: Option<SyncOptions>,
    limiter: Option<Arc<SpaceRateLimiter>>,
    progress: Option<Arc<ProgressCallback>>,
    cancel: Option<CancellationToken>,
}

impl<C> Default for SyncContextBuilder<C> {
    fn default() -> Self {
        Self {
            source: None,
            target: None,
            source_space: None,
            target_space: None,
            options: None,
            limiter: None,
            progress: None,
            cancel: None,
        }
    }
}

impl<C: SpaceClient + 'static> SyncContextBuilder<C> {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the client used to read the source space.
    pub fn source(self, client: C) -> Self {
        self.source_shared(Arc::new(client))
    }

    /// Set a shared client used to read the source space.
    pub fn source_shared(mut self, client: Arc<C>) -> Self {
        self.source = Some(client);
        self
    }

    /// Set the client used to write the target space.
    pub fn target(self, client: C) -> Self {
        self.target_shared(Arc::new(client))
    }

    /// Set a shared client used to write the target space.
    pub fn target_shared(mut self, client: Arc<C>) -> Self {
        self.target = Some(client);
        self
    }

    pub fn source_space(mut self, space: SpaceId) -> Self {
        self.source_space = Some(space);
        self
    }

    pub fn target_space(mut self, space: SpaceId) -> Self {
        self.target_space = Some(space);
        self
    }

    /// Set sync options.
    pub fn options(mut self, options: SyncOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Share a rate limiter with other runs against the same spaces.
    pub fn limiter(mut self, limiter: Arc<SpaceRateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Set the progress callback.
    pub fn progress(mut self, callback: Arc<ProgressCallback>) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Set the cancellation token for graceful shutdown.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Build the sync context.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::MissingField` if required fields are not set.
    pub fn build(self) -> Result<SyncContext<C>> {
        let source = self
            .source
            .ok_or(SyncError::MissingField { field: "source" })?;
        let target = self
            .target
            .ok_or(SyncError::MissingField { field: "target" })?;
        let source_space = self
            .source_space
            .ok_or(SyncError::MissingField {
                field: "source_space",
            })?;
        let target_space = self
            .target_space
            .ok_or(SyncError::MissingField {
                field: "target_space",
            })?;
        let options = self.options.unwrap_or_default();
        let limiter = self
            .limiter
            .unwrap_or_else(|| Arc::new(SpaceRateLimiter::new()));
        let cancel = self.cancel.unwrap_or_default();

        let gate = RequestGate::new(
            Arc::clone(&limiter),
            cancel.clone(),
            options.nudge,
            self.progress.clone(),
        );

        Ok(SyncContext {
            source,
            target,
            source_space,
            target_space,
            content_cache: ContentCache::new(options.content_cache_capacity),
            hydration: Arc::new(HydrationCache::new(options.hydration_capacity)),
            limiter,
            gate,
            options,
            progress: self.progress,
            cancel,
        })
    }
}

/// Context for one sync run.
///
/// Owns the caches and shares the limiter; the caller owns the plan and the
/// [`TargetIndex`] and lends them for execution.
pub struct SyncContext<C> {
    pub(crate) source: Arc<C>,
    pub(crate) target: Arc<C>,
    pub(crate) source_space: SpaceId,
    pub(crate) target_space: SpaceId,
    pub(crate) content_cache: ContentCache,
    pub(crate) hydration: Arc<HydrationCache>,
    pub(crate) limiter: Arc<SpaceRateLimiter>,
    pub(crate) gate: RequestGate,
    pub(crate) options: SyncOptions,
    pub(crate) progress: Option<Arc<ProgressCallback>>,
    pub(crate) cancel: CancellationToken,
}

impl<C: SpaceClient + 'static> SyncContext<C> {
    /// Create a new builder.
    pub fn builder() -> SyncContextBuilder<C> {
        SyncContextBuilder::new()
    }

    /// Get a reference to the options.
    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Get a reference to the shared rate limiter.
    pub fn limiter(&self) -> &Arc<SpaceRateLimiter> {
        &self.limiter
    }

    /// Token that cancels this run.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn source_space(&self) -> SpaceId {
        self.source_space
    }

    pub fn target_space(&self) -> SpaceId {
        self.target_space
    }

    pub(crate) fn emit(&self, event: SyncProgress) {
        emit(self.progress.as_deref(), event);
    }

    /// Execute one plan step under the per-item time budget.
    ///
    /// Folders first materialize their own ancestor chain, then sync the folder
    /// itself. Stories go straight through the story state machine. The report
    /// always carries the retries observed and any folders created, even when
    /// the item fails.
    pub async fn execute_item(&self, step: &SyncPlanStep, index: &mut TargetIndex) -> ItemReport {
        let span = tracing::info_span!(
            "execute_item",
            full_slug = %step.node.full_slug,
            operation = step.action.as_str(),
        );

        let mut report = ItemReport::new(step);
        let counter = RetryCounter::new();
        let timeout = self.options.item_timeout;

        self.emit(SyncProgress::ItemStarted {
            full_slug: step.node.full_slug.clone(),
            operation: step.action.as_str(),
        });

        let outcome = retry::scope(
            counter.clone(),
            tokio::time::timeout(timeout, self.run_item(step, index, &mut report)),
        )
        .instrument(span)
        .await;

        report.retries = counter.get();
        match outcome {
            Ok(Ok(node)) => report.node = Some(node),
            Ok(Err(e)) => report.error = Some(e),
            Err(_) => report.error = Some(SyncError::Timeout(timeout)),
        }

        match &report.error {
            None => self.emit(SyncProgress::ItemSynced {
                full_slug: report.full_slug.clone(),
                operation: report.operation.as_str(),
                retries: report.retries,
            }),
            Some(e) => self.emit(SyncProgress::ItemFailed {
                full_slug: report.full_slug.clone(),
                error: e.to_string(),
            }),
        }

        report
    }

    async fn run_item(
        &self,
        step: &SyncPlanStep,
        index: &mut TargetIndex,
        report: &mut ItemReport,
    ) -> Result<ContentNode> {
        let outcome = if step.node.is_folder {
            self.ensure_folder_path_into(&step.node.full_slug, index, &mut report.created_folders)
                .await?;
            self.sync_folder(step, index, &mut report.created_folders).await
        } else {
            self.sync_story(step, index, &mut report.created_folders).await
        };

        report.operation = outcome.operation;
        report.warning = outcome.warning;
        outcome.result
    }

    /// Execute a plan in order.
    ///
    /// Items in state skip are counted and left untouched. Every executed item
    /// moves from pending through running to success or failed. Once the run
    /// is cancelled no further items are started.
    pub async fn execute_preflight(
        &self,
        items: &mut [PreflightItem],
        index: &mut TargetIndex,
    ) -> RunSummary {
        let mut summary = RunSummary::default();

        for item in items.iter_mut() {
            if item.state == ItemState::Skip {
                summary.skipped += 1;
                continue;
            }
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let Some(step) = item.to_step() else {
                continue;
            };

            item.run = RunStatus::Running;
            let report = self.execute_item(&step, index).await;
            item.run = if report.is_success() {
                RunStatus::Success
            } else {
                RunStatus::Failed
            };
            if let Some(node) = &report.node {
                item.target_id = node.id;
            }
            summary.record(report);
        }

        if self.cancel.is_cancelled() {
            summary.cancelled = true;
        }

        tracing::info!(
            created = summary.created,
            updated = summary.updated,
            skipped = summary.skipped,
            failed = summary.failed,
            "Sync run finished"
        );

        summary
    }

    /// Sizes and counters of both caches.
    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            content_entries: self.content_cache.len(),
            content_capacity: self.content_cache.capacity(),
            content_hits: self.content_cache.hits(),
            content_misses: self.content_cache.misses(),
            hydration_entries: self.hydration.len(),
            hydration_capacity: self.hydration.capacity(),
        }
    }

    /// Drop every cached payload.
    pub fn clear_caches(&self) {
        self.content_cache.clear();
        self.hydration.clear();
    }
}
