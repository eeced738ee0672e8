//! Spacesync - mirror a content tree from one space into another.
//!
//! A space holds a tree of folders and content records addressed by slash-joined
//! paths. This library plans which records of a source space must be created or
//! updated in a target space, then executes that plan against remote spaces
//! under per-space rate limits, creating missing ancestor folders on the way.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use spacesync::{PreflightPlanner, SyncContext, tracing_reporter};
//!
//! let mut planner = PreflightPlanner::new(source_inventory, target_inventory);
//! let mut plan = planner.plan(["blog/article"], ["blog/article"]);
//! let mut index = planner.target_index().clone();
//!
//! let ctx = SyncContext::builder()
//!     .source(source_client)
//!     .target(target_client)
//!     .source_space(1001)
//!     .target_space(2002)
//!     .progress(Arc::new(tracing_reporter()))
//!     .build()?;
//!
//! ctx.hydrate(&plan.items).await;
//! let summary = ctx.execute_preflight(&mut plan.items, &mut index).await;
//! ```

pub mod cache;
pub mod retry;
pub mod slug;
pub mod space;
pub mod sync;

pub use cache::CacheStats;
pub use space::{
    ApiKey, ContentNode, ContentVersion, RawStory, RawStoryApi, SpaceClient, SpaceError, SpaceId,
    SpaceRateLimiter, StoryId, TokenAccess, TranslatedSlug, rate_limits,
};
pub use sync::{
    ItemReport, PreflightItem, PreflightPlanner, ProgressCallback, RunSummary, SyncContext,
    SyncError, SyncOptions, SyncPlan, SyncPlanStep, SyncProgress, TargetIndex, tracing_reporter,
};
