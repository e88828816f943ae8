//! Thermal CLI entry point.
//!
//! Parses arguments, sets up logging, and runs the server until Ctrl+C.

use clap::Parser;
use miette::Result;
use thermal_cli::{cli, commands, error, logger, ui};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    logger::init_logger(args.verbose, args.quiet, args.no_color);
    ui::init_colors(args.no_color);

    commands::serve_execute(args.serve)
        .await
        .map_err(error::cli_error_to_miette)
}
