use super::context::SyncContext;
use super::error::{Result, SyncError};
use super::index::TargetIndex;
use super::payload;
use super::progress::SyncProgress;
use super::types::{Operation, SyncPlanStep};
use crate::space::{ContentNode, RawStory, SpaceClient, SpaceError, StoryId, short_error_message};

/// Result of pushing one node, with everything observed on the way.
#[derive(Debug)]
pub(crate) struct StoryOutcome {
    pub(crate) operation: Operation,
    pub(crate) result: Result<ContentNode>,
    pub(crate) warning: Option<String>,
}

/// Write payload for the target.
#[derive(Debug, Clone)]
enum Payload {
    Raw(RawStory),
    Typed(ContentNode),
}

/// Source data a payload is built from.
struct SourceRecord {
    raw: Option<RawStory>,
    typed: Option<ContentNode>,
}

impl<C: SpaceClient + 'static> SyncContext<C> {
    /// Create or update one story in the target.
    ///
    /// Runs resolve-existing, resolve-parent, build-payload, push and
    /// reconcile-identity in order. A push rejected as unprocessable is
    /// treated as a missing ancestor: the folder chain is rebuilt and the push
    /// retried exactly once. Folders created by the repair are appended to
    /// `created_folders` as they are created.
    #[tracing::instrument(
        skip(self, step, index, created_folders),
        fields(full_slug = %step.node.full_slug)
    )]
    pub(crate) async fn sync_story(
        &self,
        step: &SyncPlanStep,
        index: &mut TargetIndex,
        created_folders: &mut Vec<ContentNode>,
    ) -> StoryOutcome {
        self.sync_node(step, index, false, created_folders).await
    }

    /// Create or update one folder in the target.
    ///
    /// Same as [`Self::sync_story`] but never publishes, and the parent is
    /// resolved by remote lookup since folders usually run before the index
    /// knows their parents.
    #[tracing::instrument(
        skip(self, step, index, created_folders),
        fields(full_slug = %step.node.full_slug)
    )]
    pub(crate) async fn sync_folder(
        &self,
        step: &SyncPlanStep,
        index: &mut TargetIndex,
        created_folders: &mut Vec<ContentNode>,
    ) -> StoryOutcome {
        self.sync_node(step, index, true, created_folders).await
    }

    async fn sync_node(
        &self,
        step: &SyncPlanStep,
        index: &mut TargetIndex,
        folder: bool,
        created_folders: &mut Vec<ContentNode>,
    ) -> StoryOutcome {
        let mut operation = step.action;
        let mut warning = None;

        let result = match self
            .push_node(step, index, folder, &mut operation, created_folders)
            .await
        {
            Ok(mut node) => {
                if !step.fork {
                    warning = self.reconcile_identity(step, &mut node).await;
                }
                index.insert(node.clone());
                Ok(node)
            }
            Err(e) => Err(e),
        };

        StoryOutcome {
            operation,
            result,
            warning,
        }
    }

    async fn push_node(
        &self,
        step: &SyncPlanStep,
        index: &mut TargetIndex,
        folder: bool,
        operation: &mut Operation,
        created_folders: &mut Vec<ContentNode>,
    ) -> Result<ContentNode> {
        let node = &step.node;

        let existing = self.resolve_existing(&node.full_slug, index).await?;
        let target_id = existing.as_ref().and_then(|e| e.id).or(step.target_id);
        *operation = if target_id.is_some() {
            Operation::Update
        } else {
            Operation::Create
        };

        let parent_id = self.resolve_parent(node, index, folder).await?;
        let source = self.load_source(node, folder).await?;
        let publish = !folder && self.options.publishes(node);

        let first = self.build_payload(&source, step, parent_id, existing.as_ref())?;
        match self.push(&first, target_id, publish).await {
            Err(e) if e.is_unprocessable() => {
                tracing::warn!(
                    full_slug = %node.full_slug,
                    "Push rejected ({}), rebuilding ancestors",
                    short_error_message(&e)
                );
                self.emit(SyncProgress::AncestorRepair {
                    full_slug: node.full_slug.clone(),
                });

                self.ensure_folder_path_into(&node.full_slug, index, created_folders).await?;

                let parent_id = index.id_for(node.parent_path());
                let retry = self.build_payload(&source, step, parent_id, existing.as_ref())?;
                self.push(&retry, target_id, publish).await
            }
            other => other,
        }
    }

    /// Existing target record at `full_slug`: index first, then a remote lookup.
    async fn resolve_existing(
        &self,
        full_slug: &str,
        index: &mut TargetIndex,
    ) -> Result<Option<ContentNode>> {
        if let Some(existing) = index.get(full_slug) {
            return Ok(Some(existing.clone()));
        }

        let target = &self.target;
        let space = self.target_space;
        let found = self
            .gate
            .read(space, || target.get_story_by_path(space, full_slug))
            .await?;
        if let Some(node) = &found {
            index.insert(node.clone());
        }
        Ok(found)
    }

    async fn resolve_parent(
        &self,
        node: &ContentNode,
        index: &mut TargetIndex,
        folder: bool,
    ) -> Result<Option<StoryId>> {
        let parent_path = node.parent_path();
        if parent_path.is_empty() {
            return Ok(None);
        }
        if !folder {
            return Ok(index.id_for(parent_path));
        }

        let target = &self.target;
        let space = self.target_space;
        let parent = self
            .gate
            .read(space, || target.get_story_by_path(space, parent_path))
            .await?;
        Ok(match parent {
            Some(parent) => {
                let id = parent.id;
                index.insert(parent);
                id
            }
            None => None,
        })
    }

    /// Load what the payload is built from.
    ///
    /// The raw source record is used whenever both sides support raw calls.
    /// Otherwise the typed node is used, with its content ensured for stories.
    async fn load_source(&self, node: &ContentNode, folder: bool) -> Result<SourceRecord> {
        let raw_capable = self.target.raw_api().is_some();

        if raw_capable
            && let (Some(api), Some(id)) = (self.source.raw_api(), node.id)
        {
            let space = self.source_space;
            let raw = self
                .gate
                .read(space, || api.get_story_raw(space, id))
                .await?;
            return Ok(SourceRecord {
                raw: Some(raw),
                typed: None,
            });
        }

        let typed = if folder {
            node.clone()
        } else {
            self.ensure_content(node).await?
        };
        Ok(SourceRecord {
            raw: None,
            typed: Some(typed),
        })
    }

    fn build_payload(
        &self,
        source: &SourceRecord,
        step: &SyncPlanStep,
        parent_id: Option<StoryId>,
        existing: Option<&ContentNode>,
    ) -> Result<Payload> {
        let node = &step.node;
        match (&source.raw, &source.typed) {
            (Some(raw), _) => Ok(Payload::Raw(payload::build_story_payload(
                raw.clone(),
                node,
                parent_id,
                existing,
                step.fork,
            ))),
            (None, Some(typed)) if self.target.raw_api().is_some() => {
                let raw = match serde_json::to_value(typed)? {
                    serde_json::Value::Object(map) => map,
                    _ => RawStory::new(),
                };
                Ok(Payload::Raw(payload::build_story_payload(
                    raw, node, parent_id, existing, step.fork,
                )))
            }
            (None, Some(typed)) => Ok(Payload::Typed(payload::build_typed_payload(
                typed, parent_id, existing, step.fork,
            ))),
            (None, None) => Err(SyncError::MissingId {
                path: node.full_slug.clone(),
            }),
        }
    }

    async fn push(
        &self,
        payload: &Payload,
        target_id: Option<StoryId>,
        publish: bool,
    ) -> Result<ContentNode> {
        let target = &self.target;
        let space = self.target_space;

        match (payload, target_id) {
            (Payload::Raw(raw), target_id) => {
                let api = target.raw_api().ok_or_else(|| {
                    SpaceError::internal("target space does not accept raw payloads")
                })?;
                match target_id {
                    None => {
                        self.gate
                            .write(space, || api.create_story_raw(space, raw, publish))
                            .await
                    }
                    Some(id) => {
                        self.gate
                            .write(space, || api.update_story_raw(space, id, raw, publish))
                            .await
                    }
                }
            }
            (Payload::Typed(node), None) => {
                self.gate
                    .write(space, || target.create_story(space, node, publish))
                    .await
            }
            (Payload::Typed(node), Some(id)) => {
                self.gate
                    .write(space, || target.update_story(space, id, node, publish))
                    .await
            }
        }
    }

    /// Align the target record's identity with the source.
    ///
    /// Returns a warning instead of failing: the record itself was written.
    async fn reconcile_identity(
        &self,
        step: &SyncPlanStep,
        pushed: &mut ContentNode,
    ) -> Option<String> {
        let source_uuid = step.node.uuid?;
        if pushed.uuid == Some(source_uuid) {
            return None;
        }

        let Some(id) = pushed.id else {
            return Some(format!(
                "Cannot reconcile identity of {}: record has no id",
                pushed.full_slug
            ));
        };

        let target = &self.target;
        let space = self.target_space;
        match self
            .gate
            .write(space, || target.update_story_uuid(space, id, source_uuid))
            .await
        {
            Ok(()) => {
                pushed.uuid = Some(source_uuid);
                self.emit(SyncProgress::IdentityReconciled {
                    full_slug: pushed.full_slug.clone(),
                });
                None
            }
            Err(e) => {
                let message = format!(
                    "Failed to reconcile identity of {}: {}",
                    pushed.full_slug,
                    short_error_message(&e)
                );
                tracing::warn!("{}", message);
                self.emit(SyncProgress::Warning {
                    message: message.clone(),
                });
                Some(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::space::TranslatedSlug;
    use crate::space::mock::{MockOp, MockSpaceClient};

    const SOURCE: u64 = 1;
    const TARGET: u64 = 2;

    fn context(client: &MockSpaceClient) -> SyncContext<MockSpaceClient> {
        SyncContext::builder()
            .source(client.clone())
            .target(client.clone())
            .source_space(SOURCE)
            .target_space(TARGET)
            .build()
            .unwrap()
    }

    fn source_story(client: &MockSpaceClient, path: &str, published: bool) -> ContentNode {
        let mut node = ContentNode::story("Page", path);
        node.uuid = Some(Uuid::new_v4());
        node.published = published;
        node.content = Some(json!({"component": "page", "title": path}));
        node.translated_slugs = vec![TranslatedSlug {
            lang: "de".to_string(),
            path: path.replace("page", "seite"),
            name: Some("Seite".to_string()),
            id: Some(900),
        }];
        let mut stored = client.insert(SOURCE, node);
        stored.content = None;
        stored
    }

    fn step(node: ContentNode, action: Operation, target_id: Option<StoryId>) -> SyncPlanStep {
        SyncPlanStep {
            name: node.name.clone(),
            node,
            action,
            target_id,
            fork: false,
        }
    }

    fn creates_for(client: &MockSpaceClient, path: &str) -> usize {
        client
            .calls_of(MockOp::Create)
            .iter()
            .filter(|c| {
                c.payload
                    .as_ref()
                    .and_then(|p| p.get("full_slug"))
                    .and_then(|v| v.as_str())
                    == Some(path)
            })
            .count()
    }

    #[tokio::test]
    async fn test_create_resolves_parent_and_reconciles_identity() {
        let client = MockSpaceClient::new().with_strict_parents();
        let parent = client.insert(TARGET, ContentNode::folder("App", "app"));
        let node = source_story(&client, "app/page", true);
        let ctx = context(&client);
        let mut index = TargetIndex::from_nodes([parent.clone()]);
        let mut created = Vec::new();

        let outcome = ctx
            .sync_story(&step(node.clone(), Operation::Create, None), &mut index, &mut created)
            .await;

        let pushed = outcome.result.unwrap();
        assert_eq!(outcome.operation, Operation::Create);
        assert!(outcome.warning.is_none());
        assert_eq!(pushed.parent_id, parent.id);
        assert_eq!(pushed.uuid, node.uuid);
        assert_eq!(pushed.content, Some(json!({"component": "page", "title": "app/page"})));

        let create = &client.calls_of(MockOp::Create)[0];
        assert!(create.publish);
        assert!(!create.raw);
        assert_eq!(client.calls_of(MockOp::UpdateUuid).len(), 1);
        assert_eq!(client.find(TARGET, "app/page").unwrap().uuid, node.uuid);
        assert_eq!(index.id_for("app/page"), pushed.id);
    }

    #[tokio::test]
    async fn test_existing_record_is_updated() {
        let client = MockSpaceClient::new().with_raw();
        let node = source_story(&client, "page", false);
        let mut existing = ContentNode::story("Old", "page");
        existing.uuid = node.uuid;
        existing.translated_slugs = vec![TranslatedSlug {
            lang: "de".to_string(),
            path: "seite".to_string(),
            name: None,
            id: Some(4242),
        }];
        let existing = client.insert(TARGET, existing);
        let ctx = context(&client);
        let mut index = TargetIndex::new();
        let mut created = Vec::new();

        let outcome = ctx
            .sync_story(&step(node, Operation::Create, None), &mut index, &mut created)
            .await;

        assert_eq!(outcome.operation, Operation::Update);
        let pushed = outcome.result.unwrap();
        assert_eq!(pushed.id, existing.id);
        assert_eq!(pushed.name, "Page");

        let update = &client.calls_of(MockOp::Update)[0];
        assert!(update.raw);
        assert_eq!(update.id, existing.id);
        assert_eq!(
            update.payload.as_ref().unwrap()["translated_slugs_attributes"],
            json!([{"lang": "de", "slug": "seite", "name": "Seite", "id": 4242}])
        );
        assert!(client.calls_of(MockOp::Create).is_empty());
        assert!(client.calls_of(MockOp::UpdateUuid).is_empty());
    }

    #[tokio::test]
    async fn test_unprocessable_triggers_one_repair_and_one_retry() {
        let client = MockSpaceClient::new().with_strict_parents();
        client.insert(SOURCE, ContentNode::folder("App", "app"));
        let node = source_story(&client, "app/page", false);
        let ctx = context(&client);
        let mut index = TargetIndex::new();
        let mut created = Vec::new();

        let outcome = ctx
            .sync_story(&step(node, Operation::Create, None), &mut index, &mut created)
            .await;

        let pushed = outcome.result.unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].full_slug, "app");
        assert_eq!(pushed.parent_id, created[0].id);
        assert_eq!(creates_for(&client, "app"), 1);
        assert_eq!(creates_for(&client, "app/page"), 2);
    }

    #[tokio::test]
    async fn test_second_unprocessable_is_surfaced() {
        let client = MockSpaceClient::new();
        let parent = client.insert(TARGET, ContentNode::folder("App", "app"));
        let node = source_story(&client, "app/page", false);
        client.fail_next(MockOp::Create, SpaceError::api(422, "parent invalid"));
        client.fail_next(MockOp::Create, SpaceError::api(422, "parent invalid"));
        let ctx = context(&client);
        let mut index = TargetIndex::new();
        let mut created = Vec::new();

        let outcome = ctx
            .sync_story(&step(node, Operation::Create, None), &mut index, &mut created)
            .await;

        let err = outcome.result.unwrap_err();
        assert!(err.is_unprocessable());
        assert!(created.is_empty());
        assert_eq!(client.calls_of(MockOp::Create).len(), 2);
        // The repair found the existing folder remotely.
        assert_eq!(index.id_for("app"), parent.id);
    }

    #[tokio::test]
    async fn test_other_push_errors_are_not_retried() {
        let client = MockSpaceClient::new();
        let node = source_story(&client, "page", false);
        client.fail_next(MockOp::Create, SpaceError::api(500, "server error"));
        let ctx = context(&client);
        let mut index = TargetIndex::new();
        let mut created = Vec::new();

        let outcome = ctx
            .sync_story(&step(node, Operation::Create, None), &mut index, &mut created)
            .await;

        assert!(matches!(
            outcome.result,
            Err(SyncError::Space(SpaceError::Api { status: 500, .. }))
        ));
        assert_eq!(client.calls_of(MockOp::Create).len(), 1);
        assert!(!index.contains("page"));
    }

    #[tokio::test]
    async fn test_not_found_with_status_digits_in_path_is_not_repaired() {
        let client = MockSpaceClient::new();
        let node = source_story(&client, "blog/top-422-tips", false);
        client.insert(SOURCE, ContentNode::folder("Blog", "blog"));
        client.fail_next(MockOp::Create, SpaceError::not_found("blog/top-422-tips"));
        let ctx = context(&client);
        let mut index = TargetIndex::new();
        let mut created = Vec::new();

        let outcome = ctx
            .sync_story(&step(node, Operation::Create, None), &mut index, &mut created)
            .await;

        assert!(matches!(
            outcome.result,
            Err(SyncError::Space(SpaceError::NotFound { .. }))
        ));
        assert!(created.is_empty());
        assert_eq!(client.calls_of(MockOp::Create).len(), 1);
    }

    #[tokio::test]
    async fn test_identity_failure_becomes_warning() {
        let client = MockSpaceClient::new();
        let node = source_story(&client, "page", false);
        client.fail_next(MockOp::UpdateUuid, SpaceError::api(403, "forbidden"));
        let ctx = context(&client);
        let mut index = TargetIndex::new();
        let mut created = Vec::new();

        let outcome = ctx
            .sync_story(&step(node.clone(), Operation::Create, None), &mut index, &mut created)
            .await;

        let pushed = outcome.result.unwrap();
        assert_ne!(pushed.uuid, node.uuid);
        assert!(outcome.warning.unwrap().contains("forbidden"));
    }

    #[tokio::test]
    async fn test_fork_skips_identity_and_keeps_new_paths() {
        let client = MockSpaceClient::new().with_raw();
        let source = source_story(&client, "page", false);
        let mut forked = source.clone();
        forked.name = "Page (copy)".to_string();
        forked.slug = "page-copy".to_string();
        forked.full_slug = "page-copy".to_string();
        forked.uuid = None;
        let ctx = context(&client);
        let mut index = TargetIndex::new();
        let mut created = Vec::new();

        let mut fork_step = step(forked, Operation::Create, None);
        fork_step.fork = true;
        let outcome = ctx.sync_story(&fork_step, &mut index, &mut created).await;

        let pushed = outcome.result.unwrap();
        assert_eq!(pushed.full_slug, "page-copy");
        assert_eq!(pushed.name, "Page (copy)");
        assert_ne!(pushed.uuid, source.uuid);
        assert!(client.calls_of(MockOp::UpdateUuid).is_empty());

        let payload = client.calls_of(MockOp::Create)[0].payload.clone().unwrap();
        assert!(!payload.contains_key("uuid"));
        assert_eq!(
            payload["translated_slugs_attributes"],
            json!([{"lang": "de", "slug": "page-copy", "name": "Seite"}])
        );
    }

    #[tokio::test]
    async fn test_raw_push_preserves_unknown_fields() {
        let client = MockSpaceClient::new().with_raw();
        let mut raw = serde_json::Map::new();
        raw.insert("name".into(), json!("Page"));
        raw.insert("slug".into(), json!("page"));
        raw.insert("full_slug".into(), json!("page"));
        raw.insert("content".into(), json!({"component": "page"}));
        raw.insert("position".into(), json!(-30));
        raw.insert("tag_list".into(), json!(["a", "b"]));
        client.insert_raw(SOURCE, 50, raw);
        let node = client.find(SOURCE, "page").unwrap();
        let ctx = context(&client);
        let mut index = TargetIndex::new();
        let mut created = Vec::new();

        let outcome = ctx
            .sync_story(&step(node, Operation::Create, None), &mut index, &mut created)
            .await;

        let id = outcome.result.unwrap().id.unwrap();
        let stored = client.raw(TARGET, id).unwrap();
        assert_eq!(stored["position"], json!(-30));
        assert_eq!(stored["tag_list"], json!(["a", "b"]));
        assert!(client.calls_of(MockOp::Get).is_empty());
        assert_eq!(client.calls_of(MockOp::GetRaw).len(), 1);
    }

    #[tokio::test]
    async fn test_sync_folder_never_publishes_and_looks_up_parent() {
        let client = MockSpaceClient::new().with_strict_parents();
        let parent = client.insert(TARGET, ContentNode::folder("App", "app"));
        let mut folder = ContentNode::folder("De", "app/de");
        folder.published = true;
        let folder = client.insert(SOURCE, folder);
        let ctx = context(&client);
        let mut index = TargetIndex::new();
        let mut created = Vec::new();

        let outcome = ctx
            .sync_folder(&step(folder, Operation::Create, None), &mut index, &mut created)
            .await;

        let pushed = outcome.result.unwrap();
        assert!(pushed.is_folder);
        assert_eq!(pushed.parent_id, parent.id);
        assert!(!client.calls_of(MockOp::Create)[0].publish);
        assert_eq!(index.id_for("app"), parent.id);
    }
}
