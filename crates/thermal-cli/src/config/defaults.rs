use crate::dev::filter::{DEFAULT_MAX_CACHE_FILE_SIZE, DEFAULT_MAX_WATCH_FILE_SIZE};
use std::path::PathBuf;

pub fn default_root() -> PathBuf {
    PathBuf::from(".")
}

pub fn default_port() -> u16 {
    8080
}

pub fn default_document() -> String {
    "index.html".to_string()
}

pub fn default_poll_interval_ms() -> u64 {
    1000
}

pub fn default_active_poll_interval_ms() -> u64 {
    500
}

pub fn default_idle_poll_interval_ms() -> u64 {
    2000
}

pub fn default_min_poll_interval_ms() -> u64 {
    250
}

pub fn default_idle_after_scans() -> u32 {
    10
}

pub fn default_sweep_interval_secs() -> u64 {
    30
}

pub fn default_cache_capacity() -> usize {
    100
}

pub fn default_max_cache_file_size() -> u64 {
    DEFAULT_MAX_CACHE_FILE_SIZE
}

pub fn default_max_watch_file_size() -> u64 {
    DEFAULT_MAX_WATCH_FILE_SIZE
}

pub fn default_ignored_extensions() -> Vec<String> {
    ["tmp", "swp", "log", "lock"]
        .into_iter()
        .map(String::from)
        .collect()
}

pub fn default_ignored_directories() -> Vec<String> {
    [".git", ".vs", ".svn", ".hg", "node_modules", "build", "target"]
        .into_iter()
        .map(String::from)
        .collect()
}
