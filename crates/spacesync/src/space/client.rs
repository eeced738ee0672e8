use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::errors::Result;
use super::types::{ApiKey, ContentNode, ContentVersion, SpaceId, StoryId};

/// Raw JSON representation of a record, including fields the typed model omits.
pub type RawStory = Map<String, Value>;

/// Trait for content space clients.
///
/// One client may serve several spaces; every call names the space it targets.
/// The sync engine is generic over this trait, so the HTTP transport, its
/// credentials, and its own low-level retry policy all live behind it.
///
/// # Implementation Notes
///
/// Implementors should:
/// - Handle pagination internally for `walk_stories`
/// - Report transport-level retries with [`crate::retry::record_retry`] (or wrap
///   calls in [`crate::retry::with_retry`]) so they surface in item reports
/// - Convert HTTP errors to `SpaceError`, using `Throttled` for 429 and
///   `Unprocessable` for 422 where possible
#[async_trait]
pub trait SpaceClient: Send + Sync {
    /// Look up a record by its exact full path. Returns `Ok(None)` when absent.
    async fn get_story_by_path(
        &self,
        space: SpaceId,
        full_slug: &str,
    ) -> Result<Option<ContentNode>>;

    /// Fetch the full typed record, including its content payload.
    async fn get_story(&self, space: SpaceId, id: StoryId) -> Result<ContentNode>;

    /// Create a record from the typed model.
    async fn create_story(
        &self,
        space: SpaceId,
        node: &ContentNode,
        publish: bool,
    ) -> Result<ContentNode>;

    /// Update an existing record from the typed model.
    async fn update_story(
        &self,
        space: SpaceId,
        id: StoryId,
        node: &ContentNode,
        publish: bool,
    ) -> Result<ContentNode>;

    /// Overwrite the cross-space identity of a record.
    async fn update_story_uuid(&self, space: SpaceId, id: StoryId, uuid: Uuid) -> Result<()>;

    /// List the content delivery credentials of a space.
    async fn list_api_keys(&self, space: SpaceId) -> Result<Vec<ApiKey>>;

    /// Walk every record whose full path starts with `starts_with`, reading the
    /// requested variant with the given credential.
    async fn walk_stories(
        &self,
        space: SpaceId,
        key: &ApiKey,
        starts_with: &str,
        version: ContentVersion,
    ) -> Result<Vec<ContentNode>>;

    /// Raw-preserving calls, when this client supports them.
    fn raw_api(&self) -> Option<&dyn RawStoryApi> {
        None
    }
}

/// Optional raw-preserving capability of a [`SpaceClient`].
///
/// Raw calls carry the complete record, so fields unknown to [`ContentNode`]
/// survive a round trip from one space to another.
#[async_trait]
pub trait RawStoryApi: Send + Sync {
    /// Fetch the complete untyped record.
    async fn get_story_raw(&self, space: SpaceId, id: StoryId) -> Result<RawStory>;

    /// Create a record from an untyped payload.
    async fn create_story_raw(
        &self,
        space: SpaceId,
        payload: &RawStory,
        publish: bool,
    ) -> Result<ContentNode>;

    /// Update a record from an untyped payload.
    async fn update_story_raw(
        &self,
        space: SpaceId,
        id: StoryId,
        payload: &RawStory,
        publish: bool,
    ) -> Result<ContentNode>;
}
