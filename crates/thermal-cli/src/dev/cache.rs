//! Bounded in-memory cache of served file contents.
//!
//! Entries are keyed by the resolved on-disk path and remember the
//! modification time observed when they were stored. Every read re-stats the
//! file, so a stale entry is never served even if the change detector has not
//! caught up yet.

use crate::dev::filter::PathFilter;
use bytes::Bytes;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A cached file body with the metadata needed to serve and validate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedFile {
    /// File content as served
    pub content: Bytes,
    /// MIME type (e.g., "text/css")
    pub content_type: String,
    /// Modification time captured when the entry was stored
    pub modified: SystemTime,
}

/// Counters describing cache effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub invalidations: u64,
}

#[derive(Debug, Default)]
struct CacheInner {
    /// Insertion-ordered so the front is always the oldest entry
    entries: IndexMap<PathBuf, CachedFile>,
    stats: CacheStats,
}

/// Size-bounded content cache with validate-on-read semantics.
///
/// Eviction removes the oldest *inserted* entry once `capacity` is reached.
/// Lookup, validation, eviction and insertion each run under a single lock,
/// so the cache can be shared freely between connection tasks and the
/// change detector.
#[derive(Debug)]
pub struct ContentCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
    filter: PathFilter,
}

impl ContentCache {
    /// Create a cache holding at most `capacity` entries.
    ///
    /// Content larger than the filter's cache ceiling is never stored.
    pub fn new(capacity: usize, filter: PathFilter) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            capacity: capacity.max(1),
            filter,
        }
    }

    /// Look up a file, validating it against the on-disk modification time.
    ///
    /// A mismatched or un-stat-able file drops the entry and reports a miss.
    pub fn get(&self, path: &Path) -> Option<CachedFile> {
        let mut inner = self.inner.lock();

        let Some(entry) = inner.entries.get(path) else {
            inner.stats.misses += 1;
            return None;
        };

        let live = std::fs::metadata(path).and_then(|meta| meta.modified());
        match live {
            Ok(modified) if modified == entry.modified => {
                let hit = entry.clone();
                inner.stats.hits += 1;
                Some(hit)
            }
            _ => {
                tracing::debug!("Dropping stale cache entry for {}", path.display());
                inner.entries.shift_remove(path);
                inner.stats.misses += 1;
                inner.stats.invalidations += 1;
                None
            }
        }
    }

    /// Store file content, capturing the file's current modification time.
    ///
    /// Silently ignored if the content is too large to cache or the file can
    /// no longer be stat'ed.
    pub fn put(&self, path: impl Into<PathBuf>, content: Bytes, content_type: impl Into<String>) {
        let path = path.into();
        match std::fs::metadata(&path).and_then(|meta| meta.modified()) {
            Ok(modified) => {
                self.put_at(path, content, content_type, modified);
            }
            Err(e) => {
                tracing::debug!("Not caching {}: {}", path.display(), e);
            }
        }
    }

    /// Store file content under an explicitly observed modification time.
    ///
    /// Callers that stat the file before reading it should pass that
    /// timestamp, so a write racing the read is caught by the next `get`.
    /// Returns whether the content was stored.
    pub fn put_at(
        &self,
        path: impl Into<PathBuf>,
        content: Bytes,
        content_type: impl Into<String>,
        modified: SystemTime,
    ) -> bool {
        if !self.filter.is_cacheable(content.len() as u64) {
            return false;
        }

        let path = path.into();
        let mut inner = self.inner.lock();

        // Re-inserting moves the key to the back of the eviction order
        inner.entries.shift_remove(&path);

        while inner.entries.len() >= self.capacity {
            if let Some((evicted, _)) = inner.entries.shift_remove_index(0) {
                tracing::trace!("Evicted {} from cache", evicted.display());
                inner.stats.evictions += 1;
            }
        }

        inner.entries.insert(
            path,
            CachedFile {
                content,
                content_type: content_type.into(),
                modified,
            },
        );
        true
    }

    /// Remove an entry unconditionally. Returns whether one was present.
    pub fn invalidate(&self, path: &Path) -> bool {
        let mut inner = self.inner.lock();
        let removed = inner.entries.shift_remove(path).is_some();
        if removed {
            inner.stats.invalidations += 1;
        }
        removed
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Whether an entry for `path` is resident, without validating it.
    pub fn contains(&self, path: &Path) -> bool {
        self.inner.lock().entries.contains_key(path)
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Snapshot of the hit/miss counters.
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn bump_mtime(path: &Path, secs: i64) {
        filetime::set_file_mtime(path, FileTime::from_unix_time(secs, 0)).unwrap();
    }

    #[test]
    fn test_put_then_get_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = write_file(temp.path(), "style.css", "body {}");
        let cache = ContentCache::new(10, PathFilter::default());

        cache.put(&path, Bytes::from_static(b"body {}"), "text/css");

        let hit = cache.get(&path).expect("fresh entry should hit");
        assert_eq!(hit.content, Bytes::from_static(b"body {}"));
        assert_eq!(hit.content_type, "text/css");
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_get_misses_after_mtime_change_without_invalidate() {
        let temp = TempDir::new().unwrap();
        let path = write_file(temp.path(), "app.js", "let a = 1;");
        bump_mtime(&path, 1_600_000_000);

        let cache = ContentCache::new(10, PathFilter::default());
        cache.put(&path, Bytes::from_static(b"let a = 1;"), "application/javascript");
        assert!(cache.get(&path).is_some());

        bump_mtime(&path, 1_600_000_100);

        assert!(cache.get(&path).is_none());
        assert!(!cache.contains(&path), "stale entry should be dropped");
    }

    #[test]
    fn test_get_misses_when_file_deleted() {
        let temp = TempDir::new().unwrap();
        let path = write_file(temp.path(), "gone.txt", "bye");
        let cache = ContentCache::new(10, PathFilter::default());
        cache.put(&path, Bytes::from_static(b"bye"), "text/plain");

        fs::remove_file(&path).unwrap();

        assert!(cache.get(&path).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_put_rejects_oversized_content() {
        let temp = TempDir::new().unwrap();
        let path = write_file(temp.path(), "big.bin", "0123456789");
        let filter = PathFilter::new(Vec::<String>::new(), Vec::<String>::new(), 100, 4);
        let cache = ContentCache::new(10, filter);

        cache.put(&path, Bytes::from_static(b"0123456789"), "application/octet-stream");

        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_bound_evicts_oldest_inserted() {
        let temp = TempDir::new().unwrap();
        let cache = ContentCache::new(3, PathFilter::default());

        let paths: Vec<PathBuf> = (0..5)
            .map(|i| write_file(temp.path(), &format!("f{i}.txt"), "x"))
            .collect();

        for path in &paths {
            cache.put(path, Bytes::from_static(b"x"), "text/plain");
            assert!(cache.len() <= 3);
        }

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains(&paths[0]));
        assert!(!cache.contains(&paths[1]));
        assert!(cache.contains(&paths[4]));
        assert_eq!(cache.stats().evictions, 2);
    }

    #[test]
    fn test_reinsert_refreshes_eviction_order() {
        let temp = TempDir::new().unwrap();
        let cache = ContentCache::new(2, PathFilter::default());
        let a = write_file(temp.path(), "a.txt", "a");
        let b = write_file(temp.path(), "b.txt", "b");
        let c = write_file(temp.path(), "c.txt", "c");

        cache.put(&a, Bytes::from_static(b"a"), "text/plain");
        cache.put(&b, Bytes::from_static(b"b"), "text/plain");
        cache.put(&a, Bytes::from_static(b"a"), "text/plain");
        cache.put(&c, Bytes::from_static(b"c"), "text/plain");

        assert!(cache.contains(&a));
        assert!(!cache.contains(&b));
        assert!(cache.contains(&c));
    }

    #[test]
    fn test_invalidate_is_unconditional_and_idempotent() {
        let temp = TempDir::new().unwrap();
        let path = write_file(temp.path(), "index.html", "<html></html>");
        let cache = ContentCache::new(10, PathFilter::default());
        cache.put(&path, Bytes::from_static(b"<html></html>"), "text/html");

        assert!(cache.invalidate(&path));
        assert!(!cache.invalidate(&path));
        assert!(cache.get(&path).is_none());
    }

    #[test]
    fn test_concurrent_access() {
        let temp = TempDir::new().unwrap();
        let cache = Arc::new(ContentCache::new(16, PathFilter::default()));
        let paths: Vec<PathBuf> = (0..32)
            .map(|i| write_file(temp.path(), &format!("c{i}.txt"), "data"))
            .collect();
        let paths = Arc::new(paths);

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = Arc::clone(&cache);
                let paths = Arc::clone(&paths);
                std::thread::spawn(move || {
                    for (i, path) in paths.iter().enumerate() {
                        if i % 4 == t {
                            cache.put(path, Bytes::from_static(b"data"), "text/plain");
                        } else if i % 3 == 0 {
                            cache.invalidate(path);
                        } else {
                            let _ = cache.get(path);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(cache.len() <= 16);
    }
}
