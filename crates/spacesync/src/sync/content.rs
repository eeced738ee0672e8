use serde_json::{Value, json};

use super::context::SyncContext;
use super::error::Result;
use crate::space::{ContentNode, SpaceClient, is_empty_payload};

impl<C: SpaceClient + 'static> SyncContext<C> {
    /// Make sure `node` carries its content payload.
    ///
    /// Lookup order: the node itself, prefetched variants (draft first), the
    /// on-demand cache, then a rate-limited fetch from the source. An empty
    /// remote payload becomes `{}`; only transport errors fail.
    pub async fn ensure_content(&self, node: &ContentNode) -> Result<ContentNode> {
        if node.content.is_some() {
            return Ok(node.clone());
        }

        let mut resolved = node.clone();
        let Some(id) = node.id else {
            resolved.content = Some(json!({}));
            return Ok(resolved);
        };

        if let Some(content) = self.hydration.get(id).and_then(|e| e.best().cloned()) {
            resolved.content = Some(content);
            return Ok(resolved);
        }

        if let Some(content) = self.content_cache.get(id) {
            resolved.content = Some(content);
            return Ok(resolved);
        }

        let source = &self.source;
        let space = self.source_space;
        let fetched = self
            .gate
            .read(space, || source.get_story(space, id))
            .await?;

        let content = match fetched.content {
            Some(content) if !is_empty_payload(&content) => content,
            _ => {
                tracing::debug!(full_slug = %node.full_slug, "Source returned no content");
                Value::Object(Default::default())
            }
        };

        self.content_cache.insert(id, content.clone());
        resolved.content = Some(content);
        Ok(resolved)
    }
}
