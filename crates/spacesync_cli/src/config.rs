//! Configuration file support for spacesync.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `SPACESYNC_`, e.g., `SPACESYNC_SOURCE__SPACE_ID`)
//! 3. Config file (./spacesync.toml or ~/.config/spacesync/config.toml)
//! 4. Built-in defaults
//!
//! Example config file:
//! ```toml
//! [source]
//! space_id = 1001
//!
//! [target]
//! space_id = 2002
//!
//! [sync]
//! hydration_workers = 10
//! hydration_capacity = 1000
//! content_cache_capacity = 500
//! item_timeout_secs = 30
//! publish = true
//!
//! [rate]
//! rps = 7.0
//! burst = 7
//! ```

use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use spacesync::space::RateSettings;
use spacesync::sync::{
    DEFAULT_CONTENT_CACHE_CAPACITY, DEFAULT_HYDRATION_CAPACITY, DEFAULT_HYDRATION_WORKERS,
    DEFAULT_ITEM_TIMEOUT, SyncOptions,
};
use spacesync::{SpaceId, rate_limits};

/// Top-level configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Space records are read from.
    pub source: SpaceConfig,
    /// Space records are written to.
    pub target: SpaceConfig,
    /// Default sync options.
    pub sync: SyncConfig,
    /// Default request rate per space.
    pub rate: RateConfig,
}

/// One side of a sync.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SpaceConfig {
    /// Numeric space id.
    pub space_id: Option<SpaceId>,
}

/// Default sync options.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Concurrent hydration workers.
    pub hydration_workers: usize,
    /// Prefetched entries kept in memory.
    pub hydration_capacity: usize,
    /// Fetched payloads kept in memory.
    pub content_cache_capacity: usize,
    /// Time budget of a single item, in seconds.
    pub item_timeout_secs: u64,
    /// Publish records that are published in the source.
    pub publish: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            hydration_workers: DEFAULT_HYDRATION_WORKERS,
            hydration_capacity: DEFAULT_HYDRATION_CAPACITY,
            content_cache_capacity: DEFAULT_CONTENT_CACHE_CAPACITY,
            item_timeout_secs: DEFAULT_ITEM_TIMEOUT.as_secs(),
            publish: true,
        }
    }
}

/// Token bucket settings applied to every space.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct RateConfig {
    /// Requests per second.
    pub rps: f64,
    /// Requests allowed back to back.
    pub burst: u32,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            rps: rate_limits::DEFAULT_RPS,
            burst: rate_limits::DEFAULT_BURST,
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/spacesync/config.toml)
    /// 3. Local config file (./spacesync.toml)
    /// 4. Environment variables with SPACESYNC_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(xdg_config) = Self::default_config_path()
            && xdg_config.exists()
        {
            tracing::debug!("Loading config from {:?}", xdg_config);
            builder = builder.add_source(
                File::from(xdg_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // Local config file (higher priority than XDG)
        let local_config = PathBuf::from("spacesync.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./spacesync.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // e.g., SPACESYNC_TARGET__SPACE_ID -> target.space_id
        builder = builder.add_source(
            Environment::with_prefix("SPACESYNC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// Library options for a sync run.
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            hydration_workers: self.sync.hydration_workers,
            hydration_capacity: self.sync.hydration_capacity,
            content_cache_capacity: self.sync.content_cache_capacity,
            item_timeout: Duration::from_secs(self.sync.item_timeout_secs),
            publish: self.sync.publish,
            ..SyncOptions::default()
        }
    }

    /// Rate limiter defaults.
    pub fn rate_settings(&self) -> RateSettings {
        RateSettings::new(self.rate.rps, self.rate.burst)
    }

    /// Get the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "spacesync").map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
