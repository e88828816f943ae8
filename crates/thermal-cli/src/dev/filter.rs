//! Eligibility rules for watching and caching files.
//!
//! Every check here is a pure predicate. Anything that cannot be stat'ed is
//! treated as ignored rather than reported as an error, so a scan never fails
//! because of a single odd entry.

use crate::config::ServeConfig;
use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::Path;

/// Default ceiling for files tracked by the change detector (10 MiB).
pub const DEFAULT_MAX_WATCH_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Default ceiling for files kept in the content cache (1 MiB).
pub const DEFAULT_MAX_CACHE_FILE_SIZE: u64 = 1024 * 1024;

/// Decides which files are monitored, which directories are traversed,
/// and which contents are small enough to cache.
#[derive(Debug, Clone)]
pub struct PathFilter {
    ignored_extensions: HashSet<String>,
    ignored_directories: HashSet<String>,
    max_watch_file_size: u64,
    max_cache_file_size: u64,
}

impl PathFilter {
    /// Create a filter from explicit rule sets.
    ///
    /// Extensions are matched without the leading dot and case-insensitively,
    /// so `".LOG"` and `"log"` name the same rule.
    pub fn new<E, D>(
        ignored_extensions: E,
        ignored_directories: D,
        max_watch_file_size: u64,
        max_cache_file_size: u64,
    ) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        D: IntoIterator,
        D::Item: AsRef<str>,
    {
        Self {
            ignored_extensions: ignored_extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            ignored_directories: ignored_directories
                .into_iter()
                .map(|dir| dir.as_ref().to_string())
                .collect(),
            max_watch_file_size,
            max_cache_file_size,
        }
    }

    /// Build the filter described by a server configuration.
    pub fn from_config(config: &ServeConfig) -> Self {
        Self::new(
            &config.ignored_extensions,
            &config.ignored_directories,
            config.max_watch_file_size,
            config.max_cache_file_size,
        )
    }

    /// Whether a file should be tracked by the change detector.
    ///
    /// Hidden files, files with an ignored extension, oversized files and
    /// files whose size cannot be read are all rejected.
    pub fn is_monitorable(&self, path: &Path) -> bool {
        if self.is_excluded_by_name(path) {
            return false;
        }

        match std::fs::metadata(path) {
            Ok(meta) => meta.len() <= self.max_watch_file_size,
            Err(_) => false,
        }
    }

    /// Name-only part of [`Self::is_monitorable`], usable when the caller
    /// already holds metadata for the entry.
    pub fn is_excluded_by_name(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(OsStr::to_str) else {
            return true;
        };

        if name.starts_with('.') {
            return true;
        }

        path.extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| self.ignored_extensions.contains(&ext.to_ascii_lowercase()))
    }

    /// Whether a file of `size` bytes fits under the watch ceiling.
    pub fn within_watch_ceiling(&self, size: u64) -> bool {
        size <= self.max_watch_file_size
    }

    /// Whether content of `size` bytes may be stored in the cache.
    pub fn is_cacheable(&self, size: u64) -> bool {
        size <= self.max_cache_file_size
    }

    /// Whether a directory with this name is skipped during traversal.
    pub fn is_ignored_directory(&self, name: &str) -> bool {
        self.ignored_directories.contains(name)
    }
}

impl Default for PathFilter {
    fn default() -> Self {
        Self::from_config(&ServeConfig::default())
    }
}
