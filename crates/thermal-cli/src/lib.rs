//! Thermal - a live-reloading static file server for local development.
//!
//! Serves a directory over plain HTTP. In watch mode the directory is polled
//! for changes, and every HTML page served carries a small script that
//! listens on `/sse` and reloads the page when something changes.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line definition
//! - [`config`] - Layered configuration (defaults, file, environment, flags)
//! - [`dev`] - Server, cache, change detector and reload hub
//! - [`error`] - Error types with actionable messages
//! - [`logger`] - Structured logging with tracing
//! - [`ui`] - Terminal status messages
//! - `commands` - Command implementations
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use thermal_cli::config::ServeConfig;
//! use thermal_cli::dev::{shutdown, DevServer, ServerState};
//!
//! # async fn run() -> thermal_cli::Result<()> {
//! let config = ServeConfig {
//!     root: "site".into(),
//!     ..ServeConfig::default()
//! };
//! config.validate()?;
//!
//! let state = Arc::new(ServerState::new(config));
//! let server = DevServer::bind(state, "127.0.0.1:8080".parse().unwrap()).await?;
//! let (_trigger, signal) = shutdown::channel();
//! server.run(signal).await;
//! # Ok(())
//! # }
//! ```

// Public modules
pub mod cli;
pub mod commands;
pub mod config;
pub mod dev;
pub mod error;
pub mod logger;
pub mod ui;

// Re-export commonly used types
pub use error::{CliError, ConfigError, Result, ResultExt};
