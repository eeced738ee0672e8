//! Write payloads for target records.
//!
//! Everything here is pure: payloads are derived from the source record, the
//! node being synced, the resolved parent and the existing target record.

use serde::Serialize;
use serde_json::{Value, json};

use crate::slug;
use crate::space::{ContentNode, RawStory, StoryId, TranslatedSlug};

/// Fields owned by the space that must never be copied between spaces.
pub const SYSTEM_FIELDS: &[&str] = &[
    "id",
    "uuid",
    "created_at",
    "updated_at",
    "published_at",
    "first_published_at",
];

/// Localized path variant as sent on writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslatedSlugAttribute {
    pub lang: String,
    /// Last segment of the localized path.
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Id of the variant on the existing target record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

/// Remove system-owned fields from a raw record.
pub fn strip_system_fields(raw: &mut RawStory) {
    for field in SYSTEM_FIELDS {
        raw.remove(*field);
    }
}

/// Localized variants to write for `node`.
///
/// Variant ids are taken from `existing` by language, so updates keep the
/// target's variants and creates never carry foreign ids. On a fork every
/// variant path ends in the node's new slug.
pub fn translated_slug_attributes(
    variants: &[TranslatedSlug],
    node: &ContentNode,
    existing: Option<&ContentNode>,
    fork: bool,
) -> Vec<TranslatedSlugAttribute> {
    variants
        .iter()
        .map(|variant| {
            let path = if fork {
                slug::replace_last_segment(&variant.path, &node.slug)
            } else {
                variant.path.clone()
            };
            let id = existing.and_then(|target| {
                target
                    .translated_slugs
                    .iter()
                    .find(|t| t.lang == variant.lang)
                    .and_then(|t| t.id)
            });

            TranslatedSlugAttribute {
                lang: variant.lang.clone(),
                slug: slug::last_segment(&path).to_string(),
                name: variant.name.clone(),
                id,
            }
        })
        .collect()
}

/// Build a raw write payload from the complete source record.
///
/// Unknown fields of `raw` pass through untouched. System fields are removed,
/// `parent_id` is replaced by the resolved target parent (or null), and a
/// fork takes its name and paths from the renamed `node`.
pub fn build_story_payload(
    mut raw: RawStory,
    node: &ContentNode,
    parent_id: Option<StoryId>,
    existing: Option<&ContentNode>,
    fork: bool,
) -> RawStory {
    strip_system_fields(&mut raw);
    raw.insert(
        "parent_id".to_string(),
        parent_id.map_or(Value::Null, |id| json!(id)),
    );

    if fork {
        raw.insert("name".to_string(), json!(node.name));
        raw.insert("slug".to_string(), json!(node.slug));
        raw.insert("full_slug".to_string(), json!(node.full_slug));
    }

    let variants = if node.translated_slugs.is_empty() {
        raw.get("translated_slugs")
            .and_then(|v| serde_json::from_value::<Vec<TranslatedSlug>>(v.clone()).ok())
            .unwrap_or_default()
    } else {
        node.translated_slugs.clone()
    };
    raw.remove("translated_slugs");

    let attributes = translated_slug_attributes(&variants, node, existing, fork);
    if !attributes.is_empty() {
        raw.insert(
            "translated_slugs_attributes".to_string(),
            json!(attributes),
        );
    }

    raw
}

/// Build a typed write payload when raw records are not available.
///
/// `node` must already carry its content.
pub fn build_typed_payload(
    node: &ContentNode,
    parent_id: Option<StoryId>,
    existing: Option<&ContentNode>,
    fork: bool,
) -> ContentNode {
    let mut payload = node.clone();
    payload.strip_system_fields();
    payload.parent_id = parent_id;
    let attributes = translated_slug_attributes(&node.translated_slugs, node, existing, fork);
    payload.translated_slugs = attributes
        .into_iter()
        .zip(&node.translated_slugs)
        .map(|(attr, variant)| TranslatedSlug {
            lang: attr.lang,
            path: if fork {
                slug::replace_last_segment(&variant.path, &node.slug)
            } else {
                variant.path.clone()
            },
            name: attr.name,
            id: attr.id,
        })
        .collect();
    payload
}
