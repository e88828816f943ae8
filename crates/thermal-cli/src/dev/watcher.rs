//! Polling change detector for development mode.
//!
//! Walks the served root on a timer and compares modification times against
//! the previous walk. Ignored directories are pruned during traversal and
//! non-monitorable files are skipped, so `.git` or `node_modules` never cost
//! a stat per file.

use crate::config::ServeConfig;
use crate::dev::filter::PathFilter;
use crate::dev::hub::RELOAD_MESSAGE;
use crate::dev::shutdown::Shutdown;
use crate::dev::state::SharedState;
use crate::error::{CliError, Result};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use walkdir::WalkDir;

/// File change event type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    /// File was created
    Created(PathBuf),
    /// File was modified
    Modified(PathBuf),
    /// File was removed
    Removed(PathBuf),
}

impl FileChange {
    /// Get the path affected by this change.
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Modified(p) | FileChange::Created(p) | FileChange::Removed(p) => p,
        }
    }

    /// Whether a cached copy of this path must be dropped.
    pub fn invalidates_cache(&self) -> bool {
        !matches!(self, FileChange::Created(_))
    }

    fn label(&self) -> &'static str {
        match self {
            FileChange::Created(_) => "created",
            FileChange::Modified(_) => "modified",
            FileChange::Removed(_) => "removed",
        }
    }
}

/// All changes found by one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changes: Vec<FileChange>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileChange> {
        self.changes.iter()
    }

    /// Count changes of each kind as `(created, modified, removed)`.
    pub fn counts(&self) -> (usize, usize, usize) {
        self.changes
            .iter()
            .fold((0, 0, 0), |(c, m, r), change| match change {
                FileChange::Created(_) => (c + 1, m, r),
                FileChange::Modified(_) => (c, m + 1, r),
                FileChange::Removed(_) => (c, m, r + 1),
            })
    }

    pub fn into_vec(self) -> Vec<FileChange> {
        self.changes
    }
}

/// Snapshot-based change detector.
///
/// The snapshot maps every tracked file to the modification time seen on the
/// last scan. It is owned by the detector alone; the watch loop moves the
/// detector onto the blocking pool for each scan and takes it back after.
#[derive(Debug)]
pub struct ChangeDetector {
    root: PathBuf,
    filter: PathFilter,
    snapshot: HashMap<PathBuf, SystemTime>,
}

impl ChangeDetector {
    /// Create a detector with an empty snapshot.
    pub fn new(root: impl Into<PathBuf>, filter: PathFilter) -> Self {
        Self {
            root: root.into(),
            filter,
            snapshot: HashMap::new(),
        }
    }

    /// Record the current tree as the baseline without reporting anything.
    ///
    /// Returns the number of tracked files.
    pub fn prime(&mut self) -> Result<usize> {
        self.snapshot = self.walk()?.into_iter().collect();
        Ok(self.snapshot.len())
    }

    /// Walk the tree once and report what changed since the last scan.
    ///
    /// Only a failure to read the root itself is an error; problems with
    /// individual entries are logged and the entry is skipped.
    pub fn scan(&mut self) -> Result<ChangeSet> {
        let observed = self.walk()?;
        let mut seen = HashSet::with_capacity(observed.len());
        let mut changes = Vec::new();

        for (path, modified) in observed {
            seen.insert(path.clone());
            match self.snapshot.insert(path.clone(), modified) {
                None => changes.push(FileChange::Created(path)),
                Some(previous) if previous != modified => changes.push(FileChange::Modified(path)),
                Some(_) => {}
            }
        }

        // A tracked file missing from the walk may sit under a directory that
        // was unreadable this time, so only a confirmed absence is a removal.
        let removed: Vec<PathBuf> = self
            .snapshot
            .keys()
            .filter(|path| !seen.contains(*path) && is_gone(path))
            .cloned()
            .collect();

        for path in removed {
            self.snapshot.remove(&path);
            changes.push(FileChange::Removed(path));
        }

        Ok(ChangeSet { changes })
    }

    /// Number of files currently tracked.
    pub fn snapshot_len(&self) -> usize {
        self.snapshot.len()
    }

    /// Whether `path` is in the snapshot.
    pub fn is_tracked(&self, path: &Path) -> bool {
        self.snapshot.contains_key(path)
    }

    /// Root directory being watched.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn walk(&self) -> Result<Vec<(PathBuf, SystemTime)>> {
        let filter = &self.filter;
        let mut observed = Vec::new();

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || !entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| filter.is_ignored_directory(name))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(CliError::Io(io::Error::from(e)));
                }
                Err(e) => {
                    tracing::debug!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() || filter.is_excluded_by_name(entry.path()) {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::debug!("Cannot stat {}: {}", entry.path().display(), e);
                    continue;
                }
            };

            if !filter.within_watch_ceiling(metadata.len()) {
                continue;
            }

            match metadata.modified() {
                Ok(modified) => observed.push((entry.into_path(), modified)),
                Err(e) => tracing::debug!("No mtime for {}: {}", entry.path().display(), e),
            }
        }

        Ok(observed)
    }
}

/// Gone means absent, or replaced by something that is not a regular file.
fn is_gone(path: &Path) -> bool {
    match std::fs::symlink_metadata(path) {
        Ok(metadata) => !metadata.is_file(),
        Err(e) => e.kind() == io::ErrorKind::NotFound,
    }
}

/// Adaptive delay between scans.
///
/// Busy trees are polled at the active interval, trees that have been quiet
/// for a while at the idle interval, and everything else at the base
/// interval. No delay is ever below the floor.
#[derive(Debug, Clone)]
pub struct PollSchedule {
    base: Duration,
    active: Duration,
    idle: Duration,
    floor: Duration,
    idle_after: u32,
    quiet_scans: u32,
}

impl PollSchedule {
    pub fn new(
        base: Duration,
        active: Duration,
        idle: Duration,
        floor: Duration,
        idle_after: u32,
    ) -> Self {
        Self {
            base,
            active,
            idle,
            floor,
            idle_after,
            quiet_scans: 0,
        }
    }

    pub fn from_config(config: &ServeConfig) -> Self {
        Self::new(
            config.poll_interval(),
            config.active_poll_interval(),
            config.idle_poll_interval(),
            config.min_poll_interval(),
            config.idle_after_scans,
        )
    }

    /// Delay before the next scan, given whether the last one found changes.
    pub fn next_delay(&mut self, changed: bool) -> Duration {
        let delay = if changed {
            self.quiet_scans = 0;
            self.active
        } else {
            self.quiet_scans = self.quiet_scans.saturating_add(1);
            if self.quiet_scans >= self.idle_after {
                self.idle
            } else {
                self.base
            }
        };

        delay.max(self.floor)
    }
}

/// Apply one scan's results: drop stale cache entries, then notify browsers.
///
/// Returns the number of subscribers that received a reload.
pub fn apply_changes(state: &SharedState, changes: &ChangeSet) -> usize {
    if changes.is_empty() {
        return 0;
    }

    for change in changes.iter() {
        tracing::debug!("File {}: {}", change.label(), change.path().display());
        if change.invalidates_cache() {
            state.cache().invalidate(change.path());
        }
    }

    let (created, modified, removed) = changes.counts();
    tracing::info!(
        "{} file(s) changed ({} created, {} modified, {} removed)",
        changes.len(),
        created,
        modified,
        removed
    );

    if !state.config().watch {
        return 0;
    }

    let reached = state.hub().broadcast(RELOAD_MESSAGE);
    if reached > 0 {
        tracing::info!("Reloading {} browser(s)", reached);
    }
    reached
}

/// Run the scan loop until shutdown.
///
/// Scans are strictly sequential: each one finishes before the next delay
/// starts. A failed scan is logged and retried on the next tick.
pub async fn run_watch_loop(mut detector: ChangeDetector, state: SharedState, mut shutdown: Shutdown) {
    let mut schedule = PollSchedule::from_config(state.config());
    let root = detector.root().to_path_buf();

    tracing::debug!(
        "Watching {} ({} files tracked)",
        root.display(),
        detector.snapshot_len()
    );

    while !shutdown.is_triggered() {
        let scanned = tokio::task::spawn_blocking(move || {
            let outcome = detector.scan();
            (detector, outcome)
        })
        .await;

        let changed = match scanned {
            Ok((returned, outcome)) => {
                detector = returned;
                match outcome {
                    Ok(changes) => {
                        apply_changes(&state, &changes);
                        !changes.is_empty()
                    }
                    Err(e) => {
                        tracing::warn!("Scan of {} failed: {}", root.display(), e);
                        false
                    }
                }
            }
            Err(e) => {
                tracing::error!("Scan task aborted: {}", e);
                detector = ChangeDetector::new(root.clone(), state.filter().clone());
                false
            }
        };

        if shutdown.sleep(schedule.next_delay(changed)).await {
            break;
        }
    }

    tracing::debug!("Watch loop stopped");
}
