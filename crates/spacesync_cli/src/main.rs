//! Spacesync CLI - offline planning and inspection for space mirroring.

mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::Term;
use tracing_subscriber::EnvFilter;

use crate::commands::output::OutputFormat;

#[derive(Parser)]
#[command(name = "spacesync")]
#[command(version)]
#[command(about = "Mirror a content tree from one space into another")]
#[command(
    long_about = "Spacesync plans one-directional mirroring of folders and content records \
from a source space into a target space. Plans are built offline from inventory \
exports, so they can be reviewed before anything is written."
)]
#[command(after_long_help = r#"EXAMPLES
    Plan a page together with its missing ancestor folders:
        $ spacesync plan --source source.json --target target.json --select app/de/page

    Plan a renamed copy next to an existing page:
        $ spacesync plan -s source.json -t target.json --select blog/post --fork blog/post

    Suggest a unique slug inside a folder:
        $ spacesync slug "Über uns" --parent about --existing about/ueber-uns

    Generate shell completions:
        $ spacesync completions bash > ~/.local/share/bash-completion/completions/spacesync

CONFIGURATION
    Spacesync reads configuration from:
      1. ~/.config/spacesync/config.toml (or $XDG_CONFIG_HOME/spacesync/config.toml)
      2. ./spacesync.toml
      3. Environment variables (SPACESYNC_* prefix, e.g., SPACESYNC_TARGET__SPACE_ID)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    SPACESYNC_SOURCE__SPACE_ID        Source space id
    SPACESYNC_TARGET__SPACE_ID        Target space id
    SPACESYNC_SYNC__ITEM_TIMEOUT_SECS Per-item time budget (default: 30)
    SPACESYNC_RATE__RPS               Requests per second per space (default: 7)
    RUST_LOG                          Log filter (default: spacesync=info,spacesync_cli=info)
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a sync plan from inventory exports
    Plan {
        /// Source inventory (JSON array of content nodes)
        #[arg(short, long)]
        source: PathBuf,

        /// Target inventory (JSON array of content nodes)
        #[arg(short, long)]
        target: PathBuf,

        /// Source path(s) to sync - can specify multiple
        #[arg(long, required = true)]
        select: Vec<String>,

        /// Selected path(s) to copy under a new name instead of overwriting
        #[arg(long)]
        fork: Vec<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Normalize text into a slug
    Slug {
        /// Text to normalize
        text: String,

        /// Folder the slug must be unique in
        #[arg(short, long)]
        parent: Option<String>,

        /// Full paths already taken - can specify multiple
        #[arg(short, long)]
        existing: Vec<String>,
    },
    /// Show the effective configuration
    Config {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
    /// Generate man page(s)
    Man {
        /// Output directory for man pages (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Structured logging only when not attached to a TTY
    if !Term::stdout().is_term() {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new("spacesync=info,spacesync_cli=info"),
        };

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    let cli = Cli::parse();
    let config = config::Config::load();

    match cli.command {
        Commands::Plan {
            source,
            target,
            select,
            fork,
            output,
        } => commands::plan::handle_plan(&config, &source, &target, &select, &fork, output)?,
        Commands::Slug {
            text,
            parent,
            existing,
        } => commands::slug::handle_slug(&text, parent.as_deref(), &existing)?,
        Commands::Config { output } => commands::config::handle_config(&config, output)?,
        Commands::Completions { shell } => commands::meta::handle_completions(shell)?,
        Commands::Man { output } => commands::meta::handle_man(output)?,
    }

    Ok(())
}
