use clap::ValueEnum;
use serde::Serialize;
use tabled::Tabled;

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Display as a formatted table (default)
    #[default]
    Table,
    /// Display as JSON
    Json,
}

/// Render `rows` as a rounded table, or `json` as pretty JSON.
pub(crate) fn render<R, J>(
    rows: Vec<R>,
    json: &J,
    format: OutputFormat,
) -> Result<String, serde_json::Error>
where
    R: Tabled,
    J: Serialize + ?Sized,
{
    match format {
        OutputFormat::Table => {
            let mut table = tabled::Table::new(rows);
            table.with(tabled::settings::Style::rounded());
            Ok(table.to_string())
        }
        OutputFormat::Json => serde_json::to_string_pretty(json),
    }
}
