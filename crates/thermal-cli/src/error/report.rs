//! Miette diagnostic conversion for CLI errors.

use crate::error::CliError;
use miette::Report;

/// Convert CliError to miette Report
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Config(e) => miette::miette!("Configuration error: {}", e),
        CliError::Server(msg) => miette::miette!(
            "{}\n\nHint: Another process may already be using this port; try --port",
            msg
        ),
        _ => miette::miette!("{}", err),
    }
}
