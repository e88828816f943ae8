//! Configuration system for the thermal server with multi-source loading.
//!
//! Merges settings from CLI args, environment variables, and config files.
//! Priority: CLI > Environment > File > Defaults

mod defaults;
mod loading;
mod validation;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub use defaults::*;
pub use loading::CONFIG_FILE_NAME;

/// Server configuration - loaded from thermal.config.json, `THERMAL_*`
/// environment variables and CLI args.
///
/// Immutable once the server is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ServeConfig {
    /// Directory whose files are served and watched; only ever set from
    /// the command line
    #[serde(skip, default = "default_root")]
    pub root: PathBuf,

    /// Enable change detection and live reload
    #[serde(default)]
    pub watch: bool,

    /// TCP port to listen on (all interfaces)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Open the system browser once listening
    #[serde(default)]
    pub open: bool,

    /// Document served for `/` and for directory requests
    #[serde(default = "default_document")]
    pub default_document: String,

    /// Base delay between scans
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Delay after a scan that found changes
    #[serde(default = "default_active_poll_interval_ms")]
    pub active_poll_interval_ms: u64,

    /// Delay once the tree has been quiet for `idle_after_scans` scans
    #[serde(default = "default_idle_poll_interval_ms")]
    pub idle_poll_interval_ms: u64,

    /// Lower bound for every poll delay
    #[serde(default = "default_min_poll_interval_ms")]
    pub min_poll_interval_ms: u64,

    /// Consecutive quiet scans before switching to the idle delay
    #[serde(default = "default_idle_after_scans")]
    pub idle_after_scans: u32,

    /// Seconds between subscriber liveness sweeps
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Maximum number of cached files
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Largest file (bytes) stored in the content cache
    #[serde(default = "default_max_cache_file_size")]
    pub max_cache_file_size: u64,

    /// Largest file (bytes) tracked by the change detector
    #[serde(default = "default_max_watch_file_size")]
    pub max_watch_file_size: u64,

    /// File extensions never watched (without the dot)
    #[serde(default = "default_ignored_extensions")]
    pub ignored_extensions: Vec<String>,

    /// Directory names never traversed
    #[serde(default = "default_ignored_directories")]
    pub ignored_directories: Vec<String>,
}

impl ServeConfig {
    /// Base poll delay.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Poll delay used right after changes were detected.
    pub fn active_poll_interval(&self) -> Duration {
        Duration::from_millis(self.active_poll_interval_ms)
    }

    /// Poll delay used while the tree is idle.
    pub fn idle_poll_interval(&self) -> Duration {
        Duration::from_millis(self.idle_poll_interval_ms)
    }

    /// Floor under every poll delay.
    pub fn min_poll_interval(&self) -> Duration {
        Duration::from_millis(self.min_poll_interval_ms)
    }

    /// Period of the subscriber sweep.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// URL announced to the user and handed to the browser.
    pub fn server_url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            watch: false,
            port: default_port(),
            open: false,
            default_document: default_document(),
            poll_interval_ms: default_poll_interval_ms(),
            active_poll_interval_ms: default_active_poll_interval_ms(),
            idle_poll_interval_ms: default_idle_poll_interval_ms(),
            min_poll_interval_ms: default_min_poll_interval_ms(),
            idle_after_scans: default_idle_after_scans(),
            sweep_interval_secs: default_sweep_interval_secs(),
            cache_capacity: default_cache_capacity(),
            max_cache_file_size: default_max_cache_file_size(),
            max_watch_file_size: default_max_watch_file_size(),
            ignored_extensions: default_ignored_extensions(),
            ignored_directories: default_ignored_directories(),
        }
    }
}
