//! Space-to-space sync engine.
//!
//! This module plans and executes the mirroring of a selection of folders and
//! content records from a source space into a target space.
//!
//! # Module Structure
//!
//! - [`types`] - Core types: `SyncOptions`, `PreflightItem`, `ItemReport`, constants
//! - [`progress`] - Progress reporting: `SyncProgress`, `ProgressCallback`, `emit()`
//! - [`preflight`] - Plan construction: `PreflightPlanner`
//! - [`context`] - Execution: `SyncContext` and its builder
//! - [`payload`] - Write payload construction
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use spacesync::sync::{PreflightPlanner, SyncContext, tracing_reporter};
//!
//! async fn mirror<C: SpaceClient + 'static>(source: C, target: C, inventories: Inventories) {
//!     let mut planner = PreflightPlanner::new(inventories.source, inventories.target);
//!     let mut plan = planner.plan(["app/de/page"], Vec::<&str>::new());
//!     let mut index = planner.target_index().clone();
//!
//!     let ctx = SyncContext::builder()
//!         .source(source)
//!         .target(target)
//!         .source_space(1)
//!         .target_space(2)
//!         .progress(Arc::new(tracing_reporter()))
//!         .build()?;
//!
//!     ctx.hydrate(&plan.items).await;
//!     let summary = ctx.execute_preflight(&mut plan.items, &mut index).await;
//!     println!("{} created, {} updated", summary.created, summary.updated);
//! }
//! ```

mod content;
mod context;
mod error;
mod folders;
mod gate;
mod hydrate;
mod index;
pub mod payload;
mod preflight;
mod progress;
mod story;
mod types;

pub use context::{SyncContext, SyncContextBuilder};
pub use error::{FolderPathError, Result, SyncError};
pub use index::TargetIndex;
pub use preflight::{PreflightPlanner, SyncPlan};

// Re-export types
pub use types::{
    HydrationStats, ItemReport, ItemState, NudgeSettings, Operation, PreflightItem, RunStatus,
    RunSummary, SyncOptions, SyncPlanStep,
};

// Re-export constants
pub use types::{
    DEFAULT_CONTENT_CACHE_CAPACITY, DEFAULT_HYDRATION_CAPACITY, DEFAULT_HYDRATION_WORKERS,
    DEFAULT_ITEM_TIMEOUT, INITIAL_BACKOFF_MS, MAX_BACKOFF_MS, MAX_THROTTLE_RETRIES,
};

// Re-export progress types
pub use progress::{ProgressCallback, SyncProgress, emit, tracing_reporter};
