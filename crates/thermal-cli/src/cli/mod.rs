//! Command-line interface definition for thermal.
//!
//! Uses clap v4's derive macros. The interface mirrors the classic
//! `thermal [-w] [-p PORT] <ROOT>` invocation, with a few extra switches for
//! config files, browser opening and log verbosity.


use clap::{Args, Parser};
use std::path::PathBuf;

/// Thermal - serve a directory and reload the browser when it changes
#[derive(Parser, Debug)]
#[command(
    name = "thermal",
    version,
    about = "Serve a directory over HTTP with optional live reload",
    long_about = "Thermal serves static files from a directory for local development.\n\
                  With --watch it polls the directory for changes and tells every open\n\
                  HTML page to reload through a Server-Sent Events channel."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(flatten)]
    pub serve: ServeArgs,
}

/// Arguments controlling what is served and how.
#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Directory to serve
    ///
    /// Must exist and be a directory. A thermal.config.json inside it is
    /// picked up automatically.
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    /// Watch the directory and live-reload connected pages
    #[arg(short, long)]
    pub watch: bool,

    /// Port to listen on (default: 8080)
    #[arg(
        short,
        long,
        value_name = "PORT",
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub port: Option<u16>,

    /// Explicit config file (defaults to ROOT/thermal.config.json)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Open the default browser once the server is listening
    #[arg(long)]
    pub open: bool,
}
