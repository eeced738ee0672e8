//! Shared sync types and constants.

use std::time::Duration;

use serde::Serialize;

use super::error::SyncError;
use crate::space::{ContentNode, StoryId};

/// Default number of hydration workers.
pub const DEFAULT_HYDRATION_WORKERS: usize = 10;

/// Default capacity of the bulk hydration cache.
pub const DEFAULT_HYDRATION_CAPACITY: usize = 1000;

/// Default capacity of the on-demand content cache.
pub const DEFAULT_CONTENT_CACHE_CAPACITY: usize = 500;

/// Fixed time budget for a single plan item.
pub const DEFAULT_ITEM_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum backoff delay in milliseconds when throttled.
pub const MAX_BACKOFF_MS: u64 = 30_000;

/// Initial backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1_000;

/// Maximum transport retries for a throttled request.
pub const MAX_THROTTLE_RETRIES: u32 = 5;

/// Adaptive rate controller settings.
///
/// Rates move by `increase` after each unthrottled call and by `-decrease`
/// after each throttled one, always within `[min_rate, max_rate]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NudgeSettings {
    pub increase: f64,
    pub decrease: f64,
    pub min_rate: f64,
    pub max_rate: f64,
}

impl Default for NudgeSettings {
    fn default() -> Self {
        Self {
            increase: 0.5,
            decrease: 1.0,
            min_rate: 1.0,
            max_rate: 14.0,
        }
    }
}

/// Options for a sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Concurrent hydration workers.
    pub hydration_workers: usize,
    /// Entries kept by the hydration cache.
    pub hydration_capacity: usize,
    /// Entries kept by the on-demand content cache.
    pub content_cache_capacity: usize,
    /// Time budget for each plan item.
    pub item_timeout: Duration,
    /// Publish stories that are published in the source. Folders never publish.
    pub publish: bool,
    /// Adaptive rate controller.
    pub nudge: NudgeSettings,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            hydration_workers: DEFAULT_HYDRATION_WORKERS,
            hydration_capacity: DEFAULT_HYDRATION_CAPACITY,
            content_cache_capacity: DEFAULT_CONTENT_CACHE_CAPACITY,
            item_timeout: DEFAULT_ITEM_TIMEOUT,
            publish: true,
            nudge: NudgeSettings::default(),
        }
    }
}

impl SyncOptions {
    /// Whether pushing `node` publishes it in the target.
    #[must_use]
    pub fn publishes(&self, node: &ContentNode) -> bool {
        self.publish && node.published && !node.is_folder
    }
}

/// Remote operation performed for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
}

impl Operation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
        }
    }
}

/// Planned handling of a preflight item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    Create,
    Update,
    Skip,
}

/// Execution status of a preflight item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Pending,
    Running,
    Success,
    Failed,
}

/// One entry of a sync plan, before and during execution.
#[derive(Debug, Clone, Serialize)]
pub struct PreflightItem {
    /// Source node, renamed when forked.
    pub node: ContentNode,
    pub state: ItemState,
    pub run: RunStatus,
    /// Selected by the caller, as opposed to inserted as a missing ancestor.
    pub selected: bool,
    /// The target already holds this path.
    pub collision: bool,
    /// Create a renamed copy instead of overwriting.
    pub fork: bool,
    /// Id of the existing target record, for updates.
    pub target_id: Option<StoryId>,
}

impl PreflightItem {
    /// Plan step for this item, or `None` when skipped.
    #[must_use]
    pub fn to_step(&self) -> Option<SyncPlanStep> {
        let action = match self.state {
            ItemState::Create => Operation::Create,
            ItemState::Update => Operation::Update,
            ItemState::Skip => return None,
        };

        Some(SyncPlanStep {
            node: self.node.clone(),
            action,
            target_id: match action {
                Operation::Create => None,
                Operation::Update => self.target_id,
            },
            name: self.node.name.clone(),
            fork: self.fork,
        })
    }
}

/// Executable step of a sync plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncPlanStep {
    pub node: ContentNode,
    pub action: Operation,
    /// `None` for creates.
    pub target_id: Option<StoryId>,
    pub name: String,
    pub fork: bool,
}

/// Result of executing one item.
///
/// Partial data is kept on failure: folders created before the error and the
/// observed retry count are always reported.
#[derive(Debug)]
pub struct ItemReport {
    pub full_slug: String,
    pub operation: Operation,
    /// Resulting target record, on success.
    pub node: Option<ContentNode>,
    /// Non-fatal problem, such as a failed identity update.
    pub warning: Option<String>,
    /// Transport retries observed while executing the item.
    pub retries: u32,
    /// Ancestor folders created on demand, in creation order.
    pub created_folders: Vec<ContentNode>,
    pub error: Option<SyncError>,
}

impl ItemReport {
    pub(crate) fn new(step: &SyncPlanStep) -> Self {
        Self {
            full_slug: step.node.full_slug.clone(),
            operation: step.action,
            node: None,
            warning: None,
            retries: 0,
            created_folders: Vec::new(),
            error: None,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of executing a whole plan.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Whether execution stopped early because the run was cancelled.
    pub cancelled: bool,
    pub reports: Vec<ItemReport>,
}

impl RunSummary {
    pub(crate) fn record(&mut self, report: ItemReport) {
        match (&report.error, report.operation) {
            (Some(_), _) => self.failed += 1,
            (None, Operation::Create) => self.created += 1,
            (None, Operation::Update) => self.updated += 1,
        }
        self.reports.push(report);
    }

    /// Total retries across every executed item.
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.reports.iter().map(|r| r.retries).sum()
    }
}

/// Outcome of a hydration pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HydrationStats {
    /// Non-folder items considered.
    pub total: usize,
    /// Draft variants cached.
    pub drafts: usize,
    /// Published variants cached.
    pub published: usize,
    /// Items for which no variant was cached.
    pub misses: usize,
}
