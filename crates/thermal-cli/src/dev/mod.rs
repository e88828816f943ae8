//! Development server module.
//!
//! Provides a static file server with:
//! - Live reload via Server-Sent Events
//! - Bounded in-memory content cache validated against modification times
//! - Polling change detection with adaptive intervals
//! - Cooperative shutdown of every background loop

pub mod cache;
pub mod filter;
pub mod http;
pub mod hub;
pub mod server;
pub mod shutdown;
pub mod state;
pub mod watcher;

// Re-exports
pub use cache::{CacheStats, CachedFile, ContentCache};
pub use filter::PathFilter;
pub use hub::{run_sweep_loop, ReloadHub, Subscription, RELOAD_MESSAGE};
pub use server::{inject_reload_script, DevServer, Route, SSE_PATH};
pub use shutdown::{Shutdown, ShutdownTrigger};
pub use state::{ServerState, SharedState};
pub use watcher::{run_watch_loop, ChangeDetector, ChangeSet, FileChange, PollSchedule};
