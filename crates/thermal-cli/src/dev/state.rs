//! Shared state for the development server.
//!
//! One `ServerState` is built per process and handed to every task as an
//! `Arc`. The cache and the subscriber registry guard themselves with
//! parking_lot mutexes; the configuration is immutable.

use crate::config::ServeConfig;
use crate::dev::cache::ContentCache;
use crate::dev::filter::PathFilter;
use crate::dev::hub::ReloadHub;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared development server state.
#[derive(Debug)]
pub struct ServerState {
    config: ServeConfig,
    filter: PathFilter,
    cache: ContentCache,
    hub: ReloadHub,
    disk_reads: AtomicU64,
}

impl ServerState {
    /// Create state for a validated configuration.
    pub fn new(config: ServeConfig) -> Self {
        let filter = PathFilter::from_config(&config);
        let cache = ContentCache::new(config.cache_capacity, filter.clone());

        Self {
            config,
            filter,
            cache,
            hub: ReloadHub::new(),
            disk_reads: AtomicU64::new(0),
        }
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServeConfig {
        &self.config
    }

    /// Get the served root directory.
    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Get the watch/cache eligibility rules.
    pub fn filter(&self) -> &PathFilter {
        &self.filter
    }

    /// Get the content cache.
    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    /// Get the reload notification hub.
    pub fn hub(&self) -> &ReloadHub {
        &self.hub
    }

    /// Count one full file read performed while serving a request.
    pub fn record_disk_read(&self) {
        self.disk_reads.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of file reads that went to disk instead of the cache.
    pub fn disk_reads(&self) -> u64 {
        self.disk_reads.load(Ordering::Relaxed)
    }
}

/// Shared state handle for passing around the application.
pub type SharedState = Arc<ServerState>;
