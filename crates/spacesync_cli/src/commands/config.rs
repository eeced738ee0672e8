use serde::Serialize;

use crate::commands::output::{OutputFormat, render};
use crate::config::Config;

/// One effective setting for display.
#[derive(Debug, Clone, Serialize, tabled::Tabled)]
pub(crate) struct SettingRow {
    #[tabled(rename = "Setting")]
    pub key: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

impl SettingRow {
    fn new(key: &str, value: impl ToString) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

fn space_id(id: Option<u64>) -> String {
    id.map_or_else(|| "(unset)".to_string(), |id| id.to_string())
}

pub(crate) fn setting_rows(config: &Config) -> Vec<SettingRow> {
    let config_path = Config::default_config_path()
        .map_or_else(|| "(none)".to_string(), |p| p.display().to_string());
    let options = config.sync_options();
    let rate = config.rate_settings();

    vec![
        SettingRow::new("config_file", config_path),
        SettingRow::new("source.space_id", space_id(config.source.space_id)),
        SettingRow::new("target.space_id", space_id(config.target.space_id)),
        SettingRow::new("sync.hydration_workers", options.hydration_workers),
        SettingRow::new("sync.hydration_capacity", options.hydration_capacity),
        SettingRow::new("sync.content_cache_capacity", options.content_cache_capacity),
        SettingRow::new("sync.item_timeout_secs", options.item_timeout.as_secs()),
        SettingRow::new("sync.publish", options.publish),
        SettingRow::new("rate.rps", rate.rate),
        SettingRow::new("rate.burst", rate.burst),
    ]
}

pub(crate) fn handle_config(
    config: &Config,
    output: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render(setting_rows(config), config, output)?);
    Ok(())
}
