//! Plan construction.
//!
//! A selection of source paths becomes an ordered list of [`PreflightItem`]s:
//! each selected path is classified against the target, forks are renamed,
//! duplicates are skipped and missing ancestor folders are inserted so that
//! every parent runs before its children.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;

use super::index::TargetIndex;
use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::{ItemState, PreflightItem, RunStatus, SyncPlanStep};
use crate::slug;
use crate::space::ContentNode;

/// Suffix appended to the slug of a forked copy.
const FORK_SLUG_SUFFIX: &str = "-copy";
/// Suffix appended to the name of a forked copy.
const FORK_NAME_SUFFIX: &str = " (copy)";

/// An ordered plan: the items with their planning state, and the executable
/// steps derived from them.
#[derive(Debug, Clone, Serialize)]
pub struct SyncPlan {
    pub items: Vec<PreflightItem>,
    pub steps: Vec<SyncPlanStep>,
}

/// Builds sync plans from a source and a target inventory.
pub struct PreflightPlanner {
    source: HashMap<String, ContentNode>,
    target: TargetIndex,
    /// Paths taken on either side, plus the paths handed out to forks.
    known: HashSet<String>,
    progress: Option<Arc<ProgressCallback>>,
}

impl PreflightPlanner {
    /// Index both inventories by path.
    pub fn new<S, T>(source_inventory: S, target_inventory: T) -> Self
    where
        S: IntoIterator<Item = ContentNode>,
        T: IntoIterator<Item = ContentNode>,
    {
        let source: HashMap<String, ContentNode> = source_inventory
            .into_iter()
            .map(|node| (slug::trim_path(&node.full_slug).to_string(), node))
            .collect();
        let target = TargetIndex::from_nodes(target_inventory);

        let known = source
            .keys()
            .cloned()
            .chain(target.paths().map(str::to_string))
            .collect();

        Self {
            source,
            target,
            known,
            progress: None,
        }
    }

    /// Report [`SyncProgress::PlanReady`] when a plan is built.
    pub fn with_progress(mut self, progress: Arc<ProgressCallback>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Target inventory as an index, for handing to the executor.
    #[must_use]
    pub fn target_index(&self) -> &TargetIndex {
        &self.target
    }

    /// One item per selected path found in the source.
    ///
    /// Paths already present in the target become updates of that record;
    /// everything else is a create. Unknown paths are dropped.
    pub fn preflight<I, P>(&self, selection: I) -> Vec<PreflightItem>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        selection
            .into_iter()
            .filter_map(|path| {
                let path = slug::trim_path(path.as_ref());
                let Some(node) = self.source.get(path) else {
                    tracing::warn!(path, "Selected path not found in source, dropping");
                    return None;
                };

                let existing = self.target.get(path);
                Some(PreflightItem {
                    node: node.clone(),
                    state: if existing.is_some() {
                        ItemState::Update
                    } else {
                        ItemState::Create
                    },
                    run: RunStatus::Pending,
                    selected: true,
                    collision: existing.is_some(),
                    fork: false,
                    target_id: existing.and_then(|n| n.id),
                })
            })
            .collect()
    }

    /// Turn `item` into a create of a renamed copy next to the original.
    ///
    /// The copy gets a `-copy` slug made unique in its folder, a ` (copy)`
    /// name, rewritten localized paths and no uuid.
    pub fn fork(&mut self, mut item: PreflightItem) -> PreflightItem {
        let parent = item.node.parent_path().to_string();
        let candidate = slug::normalize_slug(&format!("{}{}", item.node.slug, FORK_SLUG_SUFFIX));
        let new_slug = slug::ensure_unique_slug_in_folder(&parent, &candidate, &self.known);
        let full_slug = slug::join_path(&parent, &new_slug);
        self.known.insert(full_slug.clone());

        let node = &mut item.node;
        node.name = format!("{}{}", node.name, FORK_NAME_SUFFIX);
        node.translated_slugs = slug::rewrite_translated_paths(&node.translated_slugs, &new_slug);
        node.slug = new_slug;
        node.full_slug = full_slug;
        node.uuid = None;

        item.state = ItemState::Create;
        item.collision = false;
        item.target_id = None;
        item.fork = true;
        item
    }

    /// Deduplicate, complete and order a list of items.
    ///
    /// 1. The first item for a path wins; later ones are marked skip but kept.
    /// 2. Ancestor folders missing from the target are inserted as unselected
    ///    creates when the source has them.
    /// 3. Folders sort before content, then shallower before deeper, then by
    ///    path. The sort is stable.
    ///
    /// Running it again on its own output changes nothing.
    #[must_use]
    pub fn optimize(&self, items: Vec<PreflightItem>) -> Vec<PreflightItem> {
        let mut seen = HashSet::new();
        let mut items: Vec<PreflightItem> = items
            .into_iter()
            .map(|mut item| {
                if !seen.insert(slug::trim_path(&item.node.full_slug).to_string()) {
                    item.state = ItemState::Skip;
                }
                item
            })
            .collect();

        let target_folders: HashSet<&str> = self.target.folder_paths().collect();
        let mut missing = Vec::new();
        for item in items.iter().filter(|i| i.state != ItemState::Skip) {
            for ancestor in slug::ancestor_paths(&item.node.full_slug) {
                if target_folders.contains(ancestor.as_str()) || seen.contains(&ancestor) {
                    continue;
                }
                match self.source.get(&ancestor) {
                    Some(folder) if folder.is_folder => {
                        seen.insert(ancestor);
                        missing.push(PreflightItem {
                            node: folder.clone(),
                            state: ItemState::Create,
                            run: RunStatus::Pending,
                            selected: false,
                            collision: false,
                            fork: false,
                            target_id: None,
                        });
                    }
                    _ => {
                        tracing::debug!(path = %ancestor, "Ancestor missing on both sides");
                    }
                }
            }
        }
        items.extend(missing);

        items.sort_by(|a, b| {
            b.node
                .is_folder
                .cmp(&a.node.is_folder)
                .then_with(|| a.node.depth().cmp(&b.node.depth()))
                .then_with(|| a.node.full_slug.cmp(&b.node.full_slug))
        });
        items
    }

    /// Executable steps for the non-skipped items, in order.
    #[must_use]
    pub fn steps(items: &[PreflightItem]) -> Vec<SyncPlanStep> {
        items.iter().filter_map(PreflightItem::to_step).collect()
    }

    /// Build the plan for `selection`, forking the paths listed in `forks`.
    pub fn plan<I, P, F, Q>(&mut self, selection: I, forks: F) -> SyncPlan
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
        F: IntoIterator<Item = Q>,
        Q: AsRef<str>,
    {
        let forks: HashSet<String> = forks
            .into_iter()
            .map(|p| slug::trim_path(p.as_ref()).to_string())
            .collect();

        let items = self.preflight(selection);
        let selected = items.len();

        // Duplicates are settled on the selected path, before forks rename it.
        let mut seen = HashSet::new();
        let items: Vec<PreflightItem> = items
            .into_iter()
            .map(|mut item| {
                let path = slug::trim_path(&item.node.full_slug).to_string();
                if !seen.insert(path.clone()) {
                    item.state = ItemState::Skip;
                    item
                } else if forks.contains(&path) {
                    self.fork(item)
                } else {
                    item
                }
            })
            .collect();

        let items = self.optimize(items);
        let steps = Self::steps(&items);
        let skipped = items.len() - steps.len();

        emit(
            self.progress.as_deref(),
            SyncProgress::PlanReady {
                selected,
                steps: steps.len(),
                skipped,
            },
        );

        SyncPlan { items, steps }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::TranslatedSlug;
    use crate::sync::Operation;

    fn with_id(mut node: ContentNode, id: u64) -> ContentNode {
        node.id = Some(id);
        node
    }

    fn source_inventory() -> Vec<ContentNode> {
        vec![
            with_id(ContentNode::folder("App", "app"), 1),
            with_id(ContentNode::folder("De", "app/de"), 2),
            with_id(ContentNode::story("Page", "app/de/page"), 3),
            with_id(ContentNode::story("Other", "app/de/other"), 4),
            with_id(ContentNode::story("Home", "home"), 5),
        ]
    }

    fn paths(items: &[PreflightItem]) -> Vec<&str> {
        items.iter().map(|i| i.node.full_slug.as_str()).collect()
    }

    #[test]
    fn test_plan_inserts_missing_ancestors_parent_first() {
        let mut planner = PreflightPlanner::new(source_inventory(), Vec::new());

        let plan = planner.plan(["app/de/page"], Vec::<&str>::new());

        assert_eq!(paths(&plan.items), vec!["app", "app/de", "app/de/page"]);
        assert!(!plan.items[0].selected);
        assert!(!plan.items[1].selected);
        assert!(plan.items[2].selected);
        assert_eq!(plan.steps.len(), 3);
        assert!(plan.steps.iter().all(|s| s.action == Operation::Create));
    }

    #[test]
    fn test_existing_target_folders_are_not_inserted() {
        let target = vec![with_id(ContentNode::folder("App", "app"), 90)];
        let planner = PreflightPlanner::new(source_inventory(), target);

        let items = planner.optimize(planner.preflight(["app/de/page"]));

        assert_eq!(paths(&items), vec!["app/de", "app/de/page"]);
    }

    #[test]
    fn test_collision_becomes_update() {
        let target = vec![with_id(ContentNode::story("Home", "home"), 77)];
        let planner = PreflightPlanner::new(source_inventory(), target);

        let items = planner.preflight(["home", "missing/path"]);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].state, ItemState::Update);
        assert!(items[0].collision);
        assert_eq!(items[0].target_id, Some(77));

        let steps = PreflightPlanner::steps(&items);
        assert_eq!(steps[0].action, Operation::Update);
        assert_eq!(steps[0].target_id, Some(77));
    }

    #[test]
    fn test_duplicates_are_skipped_but_kept() {
        let planner = PreflightPlanner::new(source_inventory(), Vec::new());

        let items = planner.optimize(planner.preflight(["home", "home/", "home"]));

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].state, ItemState::Create);
        assert!(items[1..].iter().all(|i| i.state == ItemState::Skip));
        assert_eq!(PreflightPlanner::steps(&items).len(), 1);
    }

    #[test]
    fn test_optimize_is_idempotent() {
        let planner = PreflightPlanner::new(
            source_inventory(),
            vec![with_id(ContentNode::story("Home", "home"), 9)],
        );
        let items = planner.preflight(["app/de/other", "home", "app/de/page", "home"]);

        let once = planner.optimize(items);
        let twice = planner.optimize(once.clone());

        assert_eq!(paths(&once), paths(&twice));
        let states: Vec<_> = once.iter().map(|i| (i.state, i.selected)).collect();
        let states_again: Vec<_> = twice.iter().map(|i| (i.state, i.selected)).collect();
        assert_eq!(states, states_again);
    }

    #[test]
    fn test_sort_order() {
        let planner = PreflightPlanner::new(source_inventory(), Vec::new());

        let items =
            planner.optimize(planner.preflight(["home", "app/de/page", "app/de/other", "app"]));

        assert_eq!(
            paths(&items),
            vec!["app", "app/de", "home", "app/de/other", "app/de/page"]
        );
        assert!(items[0].selected);
    }

    #[test]
    fn test_fork_renames_and_clears_identity() {
        let mut page = ContentNode::story("Page", "app/de/page");
        page.id = Some(3);
        page.uuid = Some(uuid::Uuid::new_v4());
        page.translated_slugs = vec![TranslatedSlug {
            lang: "en".to_string(),
            path: "app/en/page-en".to_string(),
            name: None,
            id: Some(55),
        }];
        let target = vec![with_id(ContentNode::story("Page", "app/de/page"), 70)];
        let mut planner = PreflightPlanner::new(vec![page], target);

        let item = planner.preflight(["app/de/page"]).remove(0);
        let forked = planner.fork(item);

        assert!(forked.fork);
        assert_eq!(forked.state, ItemState::Create);
        assert_eq!(forked.target_id, None);
        assert!(!forked.collision);
        assert_eq!(forked.node.name, "Page (copy)");
        assert_eq!(forked.node.slug, "page-copy");
        assert_eq!(forked.node.full_slug, "app/de/page-copy");
        assert_eq!(forked.node.uuid, None);
        assert_eq!(forked.node.id, Some(3));
        assert_eq!(
            forked.node.translated_slugs,
            vec![TranslatedSlug {
                lang: "en".to_string(),
                path: "app/en/page-copy".to_string(),
                name: None,
                id: None,
            }]
        );
    }

    #[test]
    fn test_repeated_forks_get_unique_slugs() {
        let mut inventory = source_inventory();
        inventory.push(ContentNode::story("Home copy", "home-copy"));
        let mut planner = PreflightPlanner::new(inventory, Vec::new());

        let item = planner.preflight(["home"]).remove(0);
        let first = planner.fork(item.clone());
        let second = planner.fork(item);

        assert_eq!(first.node.full_slug, "home-copy-1");
        assert_eq!(second.node.full_slug, "home-copy-2");
    }

    #[test]
    fn test_plan_applies_forks_and_reports() {
        let events = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let callback: ProgressCallback = Box::new(move |event| {
            sink.lock().unwrap().push(event);
        });
        let target = vec![
            with_id(ContentNode::folder("App", "app"), 10),
            with_id(ContentNode::folder("De", "app/de"), 11),
            with_id(ContentNode::story("Page", "app/de/page"), 12),
        ];
        let mut planner =
            PreflightPlanner::new(source_inventory(), target).with_progress(Arc::new(callback));

        let plan = planner.plan(["app/de/page", "app/de/other"], ["app/de/page"]);

        assert_eq!(paths(&plan.items), vec!["app/de/other", "app/de/page-copy"]);
        assert_eq!(plan.steps.len(), 2);
        assert!(!plan.steps[0].fork);
        assert!(plan.steps[1].fork && plan.steps[1].action == Operation::Create);

        let events = events.lock().unwrap();
        assert!(matches!(
            events.as_slice(),
            [SyncProgress::PlanReady {
                selected: 2,
                steps: 2,
                skipped: 0
            }]
        ));
    }

    #[test]
    fn test_duplicate_selection_is_forked_once() {
        let mut planner = PreflightPlanner::new(source_inventory(), Vec::new());

        let plan = planner.plan(["home", "home/", "home"], ["home"]);

        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].node.full_slug, "home-copy");
        assert!(plan.steps[0].fork);
        assert_eq!(paths(&plan.items), vec!["home", "home", "home-copy"]);
        assert_eq!(
            plan.items
                .iter()
                .filter(|i| i.state == ItemState::Skip)
                .count(),
            2
        );
    }
}
