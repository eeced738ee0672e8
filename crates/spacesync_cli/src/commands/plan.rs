use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use spacesync::sync::{ItemState, SyncOptions};
use spacesync::{ContentNode, PreflightItem, PreflightPlanner, SpaceId, SyncPlan, tracing_reporter};

use crate::commands::output::{OutputFormat, render};
use crate::config::Config;

/// One plan item for display.
#[derive(Debug, Clone, tabled::Tabled)]
pub(crate) struct PlanRow {
    #[tabled(rename = "#")]
    pub position: usize,
    #[tabled(rename = "Path")]
    pub path: String,
    #[tabled(rename = "Kind")]
    pub kind: &'static str,
    #[tabled(rename = "Action")]
    pub action: &'static str,
    #[tabled(rename = "Selected")]
    pub selected: &'static str,
    #[tabled(rename = "Target")]
    pub target: String,
    #[tabled(rename = "Publish")]
    pub publish: &'static str,
}

impl PlanRow {
    fn from_item(position: usize, item: &PreflightItem, options: &SyncOptions) -> Self {
        let action = match (item.state, item.fork) {
            (ItemState::Skip, _) => "skip",
            (ItemState::Create, true) => "fork",
            (ItemState::Create, false) => "create",
            (ItemState::Update, _) => "update",
        };

        Self {
            position,
            path: item.node.full_slug.clone(),
            kind: if item.node.is_folder { "folder" } else { "story" },
            action,
            selected: if item.selected { "yes" } else { "ancestor" },
            target: item
                .target_id
                .map_or_else(|| "-".to_string(), |id| id.to_string()),
            publish: match item.state {
                ItemState::Skip => "-",
                _ if options.publishes(&item.node) => "yes",
                _ => "no",
            },
        }
    }
}

/// JSON form of a plan, with the spaces it is meant for.
#[derive(Debug, Serialize)]
struct PlanOutput<'a> {
    source_space: Option<SpaceId>,
    target_space: Option<SpaceId>,
    publish: bool,
    item_timeout_secs: u64,
    #[serde(flatten)]
    plan: &'a SyncPlan,
}

/// Read an inventory file: a JSON array of content nodes.
pub(crate) fn load_inventory(path: &Path) -> Result<Vec<ContentNode>, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let nodes = serde_json::from_str(&content)
        .map_err(|e| format!("Invalid inventory {}: {}", path.display(), e))?;
    Ok(nodes)
}

pub(crate) fn build_plan(
    source: Vec<ContentNode>,
    target: Vec<ContentNode>,
    select: &[String],
    fork: &[String],
) -> SyncPlan {
    let mut planner =
        PreflightPlanner::new(source, target).with_progress(Arc::new(tracing_reporter()));
    planner.plan(select, fork)
}

fn plan_rows(plan: &SyncPlan, options: &SyncOptions) -> Vec<PlanRow> {
    plan.items
        .iter()
        .enumerate()
        .map(|(i, item)| PlanRow::from_item(i + 1, item, options))
        .collect()
}

pub(crate) fn handle_plan(
    config: &Config,
    source: &Path,
    target: &Path,
    select: &[String],
    fork: &[String],
    output: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let source_space = config.source.space_id;
    let target_space = config.target.space_id;
    if let Some(space) = source_space
        && target_space == Some(space)
    {
        return Err(format!("source and target space are both {space}").into());
    }

    let options = config.sync_options();
    let plan = build_plan(load_inventory(source)?, load_inventory(target)?, select, fork);

    let json = PlanOutput {
        source_space,
        target_space,
        publish: options.publish,
        item_timeout_secs: options.item_timeout.as_secs(),
        plan: &plan,
    };
    println!("{}", render(plan_rows(&plan, &options), &json, output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_inventory(nodes: &[ContentNode]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(nodes).unwrap().as_bytes())
            .unwrap();
        file
    }

    fn source() -> Vec<ContentNode> {
        let mut nodes = vec![
            ContentNode::folder("App", "app"),
            ContentNode::folder("De", "app/de"),
            ContentNode::story("Page", "app/de/page"),
        ];
        for (i, node) in nodes.iter_mut().enumerate() {
            node.id = Some(i as u64 + 1);
        }
        nodes
    }

    #[test]
    fn test_load_inventory_round_trips_file() {
        let file = write_inventory(&source());
        let nodes = load_inventory(file.path()).unwrap();
        assert_eq!(nodes, source());
    }

    #[test]
    fn test_load_inventory_reports_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{not json").unwrap();
        let err = load_inventory(file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid inventory"));
    }

    #[test]
    fn test_plan_rows_describe_items() {
        let mut target_page = ContentNode::story("Page", "app/de/page");
        target_page.id = Some(70);
        let plan = build_plan(source(), vec![target_page], &["app/de/page".to_string()], &[]);

        let rows = plan_rows(&plan, &SyncOptions::default());

        let summary: Vec<(&str, &str, &str, &str)> = rows
            .iter()
            .map(|r| (r.path.as_str(), r.kind, r.action, r.selected))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("app", "folder", "create", "ancestor"),
                ("app/de", "folder", "create", "ancestor"),
                ("app/de/page", "story", "update", "yes"),
            ]
        );
        assert_eq!(rows[2].target, "70");
    }

    #[test]
    fn test_forked_rows() {
        let plan = build_plan(
            source(),
            Vec::new(),
            &["app/de/page".to_string()],
            &["app/de/page".to_string()],
        );

        let row = PlanRow::from_item(3, &plan.items[2], &SyncOptions::default());
        assert_eq!(row.path, "app/de/page-copy");
        assert_eq!(row.action, "fork");
    }

    #[test]
    fn test_publish_column_follows_config() {
        let mut nodes = source();
        nodes[2].published = true;
        let plan = build_plan(nodes, Vec::new(), &["app/de/page".to_string()], &[]);

        let publish: Vec<&str> = plan_rows(&plan, &SyncOptions::default())
            .iter()
            .map(|r| r.publish)
            .collect();
        assert_eq!(publish, vec!["no", "no", "yes"]);

        let mut config = Config::default();
        config.sync.publish = false;
        let rows = plan_rows(&plan, &config.sync_options());
        assert!(rows.iter().all(|r| r.publish == "no"));
    }

    #[test]
    fn test_plan_rejects_same_source_and_target_space() {
        let file = write_inventory(&source());
        let mut config = Config::default();
        config.source.space_id = Some(7);
        config.target.space_id = Some(7);

        let err = handle_plan(
            &config,
            file.path(),
            file.path(),
            &["home".to_string()],
            &[],
            OutputFormat::Json,
        )
        .unwrap_err();
        assert!(err.to_string().contains("both 7"));
    }

    #[test]
    fn test_json_output_carries_spaces_and_steps() {
        let plan = build_plan(source(), Vec::new(), &["app/de/page".to_string()], &[]);
        let output = PlanOutput {
            source_space: Some(1),
            target_space: Some(2),
            publish: true,
            item_timeout_secs: 30,
            plan: &plan,
        };

        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["source_space"], 1);
        assert_eq!(json["target_space"], 2);
        assert_eq!(json["steps"].as_array().unwrap().len(), 3);
        assert_eq!(json["items"].as_array().unwrap().len(), 3);
    }
}
