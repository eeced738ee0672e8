//! In-memory [`SpaceClient`] used by unit tests.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use uuid::Uuid;

use super::client::{RawStory, RawStoryApi, SpaceClient};
use super::errors::{Result, SpaceError};
use super::types::{ApiKey, ContentNode, ContentVersion, SpaceId, StoryId};
use crate::slug;

/// Kind of call, used to target injected failures and to filter the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    GetByPath,
    Get,
    GetRaw,
    Create,
    Update,
    UpdateUuid,
    ListKeys,
    Walk,
}

/// A call recorded by the mock.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub op: MockOp,
    pub space: SpaceId,
    pub id: Option<StoryId>,
    pub path: Option<String>,
    pub payload: Option<RawStory>,
    pub publish: bool,
    pub raw: bool,
    pub version: Option<ContentVersion>,
}

impl MockCall {
    fn new(op: MockOp, space: SpaceId) -> Self {
        Self {
            op,
            space,
            id: None,
            path: None,
            payload: None,
            publish: false,
            raw: false,
            version: None,
        }
    }
}

#[derive(Default)]
struct Inner {
    records: HashMap<SpaceId, BTreeMap<StoryId, RawStory>>,
    published: HashMap<(SpaceId, StoryId), Value>,
    api_keys: HashMap<SpaceId, Vec<ApiKey>>,
    failures: HashMap<MockOp, VecDeque<SpaceError>>,
    calls: Vec<MockCall>,
    next_id: StoryId,
    raw_enabled: bool,
    strict_parents: bool,
    delay: Option<Duration>,
}

/// A mock space client holding several spaces in memory.
///
/// Records are stored raw, so unknown fields survive raw round trips. Every
/// created record receives a fresh uuid, like a real space does.
#[derive(Clone, Default)]
pub struct MockSpaceClient {
    inner: Arc<Mutex<Inner>>,
}

impl MockSpaceClient {
    pub fn new() -> Self {
        let client = Self::default();
        client.lock().next_id = 1000;
        client
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .expect("mock space client lock should not be poisoned")
    }

    /// Expose [`RawStoryApi`] through `raw_api()`.
    pub fn with_raw(self) -> Self {
        self.lock().raw_enabled = true;
        self
    }

    /// Reject writes whose parent folder does not exist with a 422.
    pub fn with_strict_parents(self) -> Self {
        self.lock().strict_parents = true;
        self
    }

    /// Delay every call by `delay`.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.lock().delay = Some(delay);
        self
    }

    /// Seed a record. Its id is kept when set, otherwise one is assigned.
    pub fn insert(&self, space: SpaceId, mut node: ContentNode) -> ContentNode {
        let mut inner = self.lock();
        let id = match node.id {
            Some(id) => {
                inner.next_id = inner.next_id.max(id + 1);
                id
            }
            None => inner.allocate_id(),
        };
        node.id = Some(id);
        let raw = to_raw(&node);
        inner.records.entry(space).or_default().insert(id, raw);
        node
    }

    /// Seed a raw record, including fields the typed model does not know.
    pub fn insert_raw(&self, space: SpaceId, id: StoryId, mut raw: RawStory) {
        let mut inner = self.lock();
        inner.next_id = inner.next_id.max(id + 1);
        raw.insert("id".to_string(), json!(id));
        inner.records.entry(space).or_default().insert(id, raw);
    }

    /// Set the published variant of a record's content.
    pub fn set_published_content(&self, space: SpaceId, id: StoryId, content: Value) {
        self.lock().published.insert((space, id), content);
    }

    pub fn set_api_keys(&self, space: SpaceId, keys: Vec<ApiKey>) {
        self.lock().api_keys.insert(space, keys);
    }

    /// Fail the next call of kind `op` with `error`.
    pub fn fail_next(&self, op: MockOp, error: SpaceError) {
        self.lock().failures.entry(op).or_default().push_back(error);
    }

    #[must_use]
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    #[must_use]
    pub fn calls_of(&self, op: MockOp) -> Vec<MockCall> {
        self.calls().into_iter().filter(|c| c.op == op).collect()
    }

    /// Typed view of the record at `full_slug`.
    #[must_use]
    pub fn find(&self, space: SpaceId, full_slug: &str) -> Option<ContentNode> {
        self.lock().find(space, full_slug).map(|(_, node)| node)
    }

    /// Raw view of a record.
    #[must_use]
    pub fn raw(&self, space: SpaceId, id: StoryId) -> Option<RawStory> {
        self.lock().records.get(&space)?.get(&id).cloned()
    }

    #[must_use]
    pub fn len(&self, space: SpaceId) -> usize {
        self.lock().records.get(&space).map_or(0, BTreeMap::len)
    }

    async fn begin(&self, call: MockCall) -> Result<()> {
        let delay = self.lock().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.lock();
        let op = call.op;
        inner.calls.push(call);
        match inner.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn write(
        &self,
        space: SpaceId,
        id: Option<StoryId>,
        payload: &RawStory,
        publish: bool,
    ) -> Result<ContentNode> {
        let mut inner = self.lock();
        let mut record = payload.clone();
        for field in ["id", "created_at", "updated_at", "published_at"] {
            record.remove(field);
        }

        let full_slug = record
            .get("full_slug")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let parent_id = record.get("parent_id").and_then(Value::as_u64);
        if inner.strict_parents && !inner.parent_exists(space, &full_slug, parent_id) {
            return Err(SpaceError::unprocessable(format!(
                "parent folder missing for {}",
                full_slug
            )));
        }

        let (id, uuid, was_published) = match id {
            Some(id) => {
                let existing = inner
                    .records
                    .get(&space)
                    .and_then(|r| r.get(&id))
                    .ok_or_else(|| SpaceError::not_found(format!("story {}", id)))?;
                let uuid = existing.get("uuid").cloned().unwrap_or(Value::Null);
                let published = existing
                    .get("published")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                (id, uuid, published)
            }
            None => (inner.allocate_id(), json!(Uuid::new_v4()), false),
        };

        record.insert("id".to_string(), json!(id));
        record.insert("uuid".to_string(), uuid);
        record.insert("published".to_string(), json!(publish || was_published));
        inner.records.entry(space).or_default().insert(id, record.clone());
        from_raw(&record)
    }
}

impl Inner {
    fn allocate_id(&mut self) -> StoryId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn find(&self, space: SpaceId, full_slug: &str) -> Option<(StoryId, ContentNode)> {
        let full_slug = slug::trim_path(full_slug);
        self.records.get(&space)?.iter().find_map(|(id, raw)| {
            let path = raw.get("full_slug").and_then(Value::as_str)?;
            if slug::trim_path(path) == full_slug {
                from_raw(raw).ok().map(|node| (*id, node))
            } else {
                None
            }
        })
    }

    fn parent_exists(&self, space: SpaceId, full_slug: &str, parent_id: Option<StoryId>) -> bool {
        let parent_path = slug::parent_path(full_slug);
        if parent_path.is_empty() {
            return parent_id.is_none();
        }
        match (parent_id, self.find(space, parent_path)) {
            (Some(pid), Some((id, node))) => pid == id && node.is_folder,
            _ => false,
        }
    }
}

fn to_raw(node: &ContentNode) -> RawStory {
    match serde_json::to_value(node) {
        Ok(Value::Object(map)) => map,
        _ => RawStory::new(),
    }
}

fn from_raw(raw: &RawStory) -> Result<ContentNode> {
    serde_json::from_value(Value::Object(raw.clone()))
        .map_err(|e| SpaceError::internal(format!("invalid record: {}", e)))
}

#[async_trait]
impl SpaceClient for MockSpaceClient {
    async fn get_story_by_path(
        &self,
        space: SpaceId,
        full_slug: &str,
    ) -> Result<Option<ContentNode>> {
        let mut call = MockCall::new(MockOp::GetByPath, space);
        call.path = Some(full_slug.to_string());
        self.begin(call).await?;
        Ok(self.lock().find(space, full_slug).map(|(_, node)| node))
    }

    async fn get_story(&self, space: SpaceId, id: StoryId) -> Result<ContentNode> {
        let mut call = MockCall::new(MockOp::Get, space);
        call.id = Some(id);
        self.begin(call).await?;
        let raw = self
            .raw(space, id)
            .ok_or_else(|| SpaceError::not_found(format!("story {}", id)))?;
        from_raw(&raw)
    }

    async fn create_story(
        &self,
        space: SpaceId,
        node: &ContentNode,
        publish: bool,
    ) -> Result<ContentNode> {
        let payload = to_raw(node);
        let mut call = MockCall::new(MockOp::Create, space);
        call.payload = Some(payload.clone());
        call.publish = publish;
        self.begin(call).await?;
        self.write(space, None, &payload, publish)
    }

    async fn update_story(
        &self,
        space: SpaceId,
        id: StoryId,
        node: &ContentNode,
        publish: bool,
    ) -> Result<ContentNode> {
        let payload = to_raw(node);
        let mut call = MockCall::new(MockOp::Update, space);
        call.id = Some(id);
        call.payload = Some(payload.clone());
        call.publish = publish;
        self.begin(call).await?;
        self.write(space, Some(id), &payload, publish)
    }

    async fn update_story_uuid(&self, space: SpaceId, id: StoryId, uuid: Uuid) -> Result<()> {
        let mut call = MockCall::new(MockOp::UpdateUuid, space);
        call.id = Some(id);
        self.begin(call).await?;
        let mut inner = self.lock();
        let record = inner
            .records
            .get_mut(&space)
            .and_then(|r| r.get_mut(&id))
            .ok_or_else(|| SpaceError::not_found(format!("story {}", id)))?;
        record.insert("uuid".to_string(), json!(uuid));
        Ok(())
    }

    async fn list_api_keys(&self, space: SpaceId) -> Result<Vec<ApiKey>> {
        self.begin(MockCall::new(MockOp::ListKeys, space)).await?;
        Ok(self.lock().api_keys.get(&space).cloned().unwrap_or_default())
    }

    async fn walk_stories(
        &self,
        space: SpaceId,
        _key: &ApiKey,
        starts_with: &str,
        version: ContentVersion,
    ) -> Result<Vec<ContentNode>> {
        let mut call = MockCall::new(MockOp::Walk, space);
        call.path = Some(starts_with.to_string());
        call.version = Some(version);
        self.begin(call).await?;

        let inner = self.lock();
        let Some(records) = inner.records.get(&space) else {
            return Ok(Vec::new());
        };

        let mut nodes = Vec::new();
        for (id, raw) in records {
            let mut node = from_raw(raw)?;
            if !node.full_slug.starts_with(starts_with) {
                continue;
            }
            if version == ContentVersion::Published {
                if !node.published {
                    continue;
                }
                if let Some(content) = inner.published.get(&(space, *id)) {
                    node.content = Some(content.clone());
                }
            }
            nodes.push(node);
        }
        Ok(nodes)
    }

    fn raw_api(&self) -> Option<&dyn RawStoryApi> {
        if self.lock().raw_enabled {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl RawStoryApi for MockSpaceClient {
    async fn get_story_raw(&self, space: SpaceId, id: StoryId) -> Result<RawStory> {
        let mut call = MockCall::new(MockOp::GetRaw, space);
        call.id = Some(id);
        self.begin(call).await?;
        self.raw(space, id)
            .ok_or_else(|| SpaceError::not_found(format!("story {}", id)))
    }

    async fn create_story_raw(
        &self,
        space: SpaceId,
        payload: &RawStory,
        publish: bool,
    ) -> Result<ContentNode> {
        let mut call = MockCall::new(MockOp::Create, space);
        call.payload = Some(payload.clone());
        call.publish = publish;
        call.raw = true;
        self.begin(call).await?;
        self.write(space, None, payload, publish)
    }

    async fn update_story_raw(
        &self,
        space: SpaceId,
        id: StoryId,
        payload: &RawStory,
        publish: bool,
    ) -> Result<ContentNode> {
        let mut call = MockCall::new(MockOp::Update, space);
        call.id = Some(id);
        call.payload = Some(payload.clone());
        call.publish = publish;
        call.raw = true;
        self.begin(call).await?;
        self.write(space, Some(id), payload, publish)
    }
}
