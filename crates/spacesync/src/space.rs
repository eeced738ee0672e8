//! Space-agnostic model and client trait for content spaces.
//!
//! This module defines the `SpaceClient` trait that the sync engine drives, the
//! `ContentNode` tree model it moves between spaces, and the adaptive
//! per-space rate limiter shared by every worker.
//!
//! # Example
//!
//! ```ignore
//! use spacesync::space::{SpaceClient, SpaceError};
//!
//! async fn print_story<C: SpaceClient>(client: &C, space: u64) -> Result<(), SpaceError> {
//!     if let Some(story) = client.get_story_by_path(space, "app/de/page").await? {
//!         println!("{} ({:?})", story.full_slug, story.id);
//!     }
//!     Ok(())
//! }
//! ```

mod client;
mod errors;
mod rate_limit;
mod types;

#[cfg(test)]
pub(crate) mod mock;

pub use client::{RawStory, RawStoryApi, SpaceClient};
pub use errors::{Result, SpaceError, short_error_message};
pub use rate_limit::{Cancelled, Direction, RateSettings, SpaceRateLimiter, rate_limits};
pub use types::{
    ApiKey, ContentNode, ContentVersion, SpaceId, StoryId, TokenAccess, TranslatedSlug,
    is_empty_payload,
};
