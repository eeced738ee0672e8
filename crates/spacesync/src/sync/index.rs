use std::collections::HashMap;

use crate::slug;
use crate::space::{ContentNode, StoryId};

/// Target records by full path.
///
/// Owned by the caller and lent to the engine for a run. Entries are only
/// added or refreshed during a run, never removed.
#[derive(Debug, Clone, Default)]
pub struct TargetIndex {
    by_path: HashMap<String, ContentNode>,
}

impl TargetIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a target inventory. Later duplicates of a path win.
    pub fn from_nodes<I: IntoIterator<Item = ContentNode>>(nodes: I) -> Self {
        let mut index = Self::new();
        for node in nodes {
            index.insert(node);
        }
        index
    }

    #[must_use]
    pub fn get(&self, full_slug: &str) -> Option<&ContentNode> {
        self.by_path.get(slug::trim_path(full_slug))
    }

    /// Id of the record at `full_slug`, if known and assigned.
    #[must_use]
    pub fn id_for(&self, full_slug: &str) -> Option<StoryId> {
        self.get(full_slug).and_then(|n| n.id)
    }

    #[must_use]
    pub fn contains(&self, full_slug: &str) -> bool {
        self.by_path.contains_key(slug::trim_path(full_slug))
    }

    pub fn insert(&mut self, node: ContentNode) {
        let key = slug::trim_path(&node.full_slug).to_string();
        self.by_path.insert(key, node);
    }

    /// Paths of every indexed folder.
    pub fn folder_paths(&self) -> impl Iterator<Item = &str> {
        self.by_path
            .iter()
            .filter(|(_, n)| n.is_folder)
            .map(|(path, _)| path.as_str())
    }

    /// Every indexed path.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.by_path.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}
