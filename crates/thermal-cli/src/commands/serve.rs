//! Serve command implementation.
//!
//! Orchestrates the server lifecycle:
//! - Configuration loading and validation
//! - Socket bind (fatal on failure)
//! - Accept loop, plus watch and sweep loops in watch mode
//! - Graceful shutdown on Ctrl+C

use crate::cli::ServeArgs;
use crate::config::ServeConfig;
use crate::dev::{
    run_sweep_loop, run_watch_loop, shutdown, ChangeDetector, DevServer, ServerState, SharedState,
};
use crate::error::{CliError, Result, ResultExt};
use crate::ui;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::signal;
use tokio::task::JoinHandle;

/// Execute the serve command.
///
/// # Errors
///
/// Returns errors for an invalid configuration, a missing or non-directory
/// root, and a port that cannot be bound. Nothing after startup is fatal.
pub async fn execute(args: ServeArgs) -> Result<()> {
    let config = prepare_config(&args)?;

    ui::info(&format!("Serving {}", config.root.display()));

    let state: SharedState = Arc::new(ServerState::new(config));
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, state.config().port));
    let server = DevServer::bind(Arc::clone(&state), addr).await?;

    let (trigger, shutdown) = shutdown::channel();
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    if state.config().watch {
        let detector = start_detector(&state).await?;
        ui::info(&format!(
            "Watching {} files for changes",
            detector.snapshot_len()
        ));
        tasks.push(tokio::spawn(run_watch_loop(
            detector,
            Arc::clone(&state),
            shutdown.clone(),
        )));
        tasks.push(tokio::spawn(run_sweep_loop(
            Arc::clone(&state),
            shutdown.clone(),
        )));
    }

    let mut server_handle = tokio::spawn(server.run(shutdown));

    let url = state.config().server_url();
    ui::success(&format!("Server running at {}", url));
    if state.config().watch {
        ui::info("Live reload enabled");
    }

    if state.config().open {
        open_browser(&url);
    }

    ui::info("Press Ctrl+C to stop");

    let server_done = tokio::select! {
        result = signal::ctrl_c() => {
            if let Err(e) = result {
                ui::warning(&format!("Failed to listen for Ctrl+C: {}", e));
            }
            ui::info("Shutting down...");
            false
        }
        _ = &mut server_handle => {
            ui::warning("Server task completed unexpectedly");
            true
        }
    };

    trigger.trigger();

    for task in tasks {
        if let Err(e) = task.await {
            tracing::debug!("Background task ended abnormally: {}", e);
        }
    }
    if !server_done {
        let _ = server_handle.await;
    }

    ui::success("Server stopped");
    Ok(())
}

/// Load, validate and normalise the configuration.
///
/// The root is canonicalised so that cache keys and watched paths share one
/// spelling.
pub fn prepare_config(args: &ServeArgs) -> Result<ServeConfig> {
    let mut config = ServeConfig::load(args)?;
    config.validate()?;
    config.root = config.root.canonicalize().with_path(&config.root)?;
    Ok(config)
}

/// Build the change detector and record the current tree as its baseline.
async fn start_detector(state: &SharedState) -> Result<ChangeDetector> {
    let mut detector = ChangeDetector::new(state.root(), state.filter().clone());

    let primed = tokio::task::spawn_blocking(move || detector.prime().map(|_| detector))
        .await
        .map_err(|e| CliError::Custom(format!("Initial scan failed: {}", e)))?;

    primed.context("Initial scan failed")
}

/// Open the server URL in the default browser.
///
/// Uses platform-specific commands:
/// - macOS: `open`
/// - Windows: `start`
/// - Linux: `xdg-open`
fn open_browser(url: &str) {
    use std::process::Command;

    let result = if cfg!(target_os = "macos") {
        Command::new("open").arg(url).spawn()
    } else if cfg!(target_os = "windows") {
        Command::new("cmd").args(["/C", "start", url]).spawn()
    } else {
        Command::new("xdg-open").arg(url).spawn()
    };

    match result {
        Ok(_) => ui::info(&format!("Opened browser at {}", url)),
        Err(e) => ui::warning(&format!("Failed to open browser: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn args(root: &std::path::Path) -> ServeArgs {
        ServeArgs {
            root: root.to_path_buf(),
            ..ServeArgs::default()
        }
    }

    #[test]
    fn test_prepare_config_canonicalizes_root() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("site")).unwrap();
        let relative = temp.path().join("site").join("..").join("site");

        let config = prepare_config(&args(&relative)).unwrap();

        assert!(config.root.is_absolute());
        assert_eq!(config.root, temp.path().join("site").canonicalize().unwrap());
    }

    #[test]
    fn test_prepare_config_rejects_missing_root() {
        let temp = TempDir::new().unwrap();
        let err = prepare_config(&args(&temp.path().join("nope"))).unwrap_err();
        assert!(matches!(err, CliError::FileNotFound(_)));
    }

    #[test]
    fn test_prepare_config_rejects_file_root() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("index.html");
        fs::write(&file, "<html></html>").unwrap();

        let err = prepare_config(&args(&file)).unwrap_err();
        assert!(matches!(err, CliError::NotADirectory(_)));
    }

    #[tokio::test]
    async fn test_start_detector_primes_baseline() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("index.html"), "<html></html>").unwrap();
        fs::write(temp.path().join("app.js"), "1").unwrap();

        let config = ServeConfig {
            root: temp.path().to_path_buf(),
            watch: true,
            ..ServeConfig::default()
        };
        let state: SharedState = Arc::new(ServerState::new(config));

        let mut detector = start_detector(&state).await.unwrap();
        assert_eq!(detector.snapshot_len(), 2);
        assert!(detector.scan().unwrap().is_empty());
    }
}
