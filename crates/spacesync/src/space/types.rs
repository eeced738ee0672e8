use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::slug;

/// Numeric id of a content space.
pub type SpaceId = u64;

/// Space-assigned id of a story or folder.
pub type StoryId = u64;

/// A localized path variant of a content node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatedSlug {
    /// Language code (e.g. `de`).
    pub lang: String,
    /// Full localized path.
    pub path: String,
    /// Localized display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Id of the variant within its space.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

/// A folder or content record in a space (space-agnostic representation).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContentNode {
    /// Space-assigned id. Unset until the record exists in a space.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<StoryId>,
    /// Cross-space stable identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
    /// Display name.
    pub name: String,
    /// Single path segment.
    pub slug: String,
    /// Slash-joined ancestor chain ending in `slug`.
    pub full_slug: String,
    /// Id of the parent folder, `None` for roots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<StoryId>,
    /// Whether this node is a folder.
    #[serde(default)]
    pub is_folder: bool,
    /// Whether the record has a published version.
    #[serde(default)]
    pub published: bool,
    /// Opaque structured payload. `None` means not loaded yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,
    /// Localized path variants.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub translated_slugs: Vec<TranslatedSlug>,
    /// When the record was created (system-owned).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// When the record was last updated (system-owned).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// When the record was last published (system-owned).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl ContentNode {
    /// Create a folder node with no id.
    pub fn folder(name: impl Into<String>, full_slug: impl Into<String>) -> Self {
        Self::new(name, full_slug, true)
    }

    /// Create a story node with no id.
    pub fn story(name: impl Into<String>, full_slug: impl Into<String>) -> Self {
        Self::new(name, full_slug, false)
    }

    fn new(name: impl Into<String>, full_slug: impl Into<String>, is_folder: bool) -> Self {
        let full_slug = slug::trim_path(&full_slug.into()).to_string();
        Self {
            name: name.into(),
            slug: slug::last_segment(&full_slug).to_string(),
            full_slug,
            is_folder,
            ..Self::default()
        }
    }

    /// Parent path derived from `full_slug`.
    #[inline]
    #[must_use]
    pub fn parent_path(&self) -> &str {
        slug::parent_path(&self.full_slug)
    }

    /// Depth of the node in the tree (roots are 1).
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        slug::depth(&self.full_slug)
    }

    /// Whether the payload has been loaded and is not empty.
    #[must_use]
    pub fn has_content(&self) -> bool {
        self.content.as_ref().is_some_and(|c| !is_empty_payload(c))
    }

    /// Clear system-owned fields (identity and timestamps).
    pub fn strip_system_fields(&mut self) {
        self.id = None;
        self.uuid = None;
        self.created_at = None;
        self.updated_at = None;
        self.published_at = None;
    }
}

/// Whether a payload carries no data (`null` or an empty object).
pub fn is_empty_payload(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Which variant of a record to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentVersion {
    Draft,
    Published,
}

impl ContentVersion {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ContentVersion::Draft => "draft",
            ContentVersion::Published => "published",
        }
    }
}

/// Access class of a content delivery credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenAccess {
    /// Can read drafts and published content.
    Preview,
    /// Can read published content only.
    Public,
}

/// A content delivery credential of a space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    pub access: TokenAccess,
    pub token: String,
}

impl ApiKey {
    /// Pick the most capable key: preview over public.
    pub fn best(keys: &[ApiKey]) -> Option<&ApiKey> {
        keys.iter()
            .find(|k| k.access == TokenAccess::Preview)
            .or_else(|| keys.iter().find(|k| k.access == TokenAccess::Public))
    }
}
