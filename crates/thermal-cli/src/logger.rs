//! Logging infrastructure for the thermal CLI.
//!
//! Built on `tracing` with a compact `tracing-subscriber` formatter.
//!
//! # Verbosity
//!
//! 1. `--verbose`: debug level for thermal
//! 2. `--quiet`: errors only
//! 3. `RUST_LOG`: custom filter
//! 4. Default: info level for thermal
//!
//! # Example
//!
//! ```rust,no_run
//! use thermal_cli::logger::init_logger;
//! use tracing::{debug, info};
//!
//! init_logger(false, false, false);
//!
//! info!("Serving site");
//! debug!("Resolved root: {}", "/srv/site");
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used with `--verbose`.
pub const VERBOSE_FILTER: &str = "thermal=debug,thermal_cli=debug";

/// Filter used with `--quiet`.
pub const QUIET_FILTER: &str = "thermal=error,thermal_cli=error";

/// Filter used when neither flag nor `RUST_LOG` is set.
pub const DEFAULT_FILTER: &str = "thermal=info,thermal_cli=info";

/// Pick the filter for the given flags.
///
/// `verbose` wins over `quiet`; clap already rejects the combination.
pub fn filter_for(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else if quiet {
        EnvFilter::new(QUIET_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

/// Initialize the tracing subscriber.
///
/// Call once at startup, before anything logs.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    init_logger_with_filter(filter_for(verbose, quiet), no_color);
}

/// Initialize logger with a custom environment filter.
pub fn init_logger_with_filter(filter: EnvFilter, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .compact();

    // A second initialization (e.g. in tests) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
