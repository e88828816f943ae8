//! Command implementations for the thermal CLI.
//!
//! - [`serve`] - Serve a directory, optionally with live reload

pub mod serve;

pub use serve::execute as serve_execute;
