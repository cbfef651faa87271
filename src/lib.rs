//! Core library entry for the `testtrack` CLI.
//!
//! Keeps one tracker issue per failing test: issues are opened when a
//! test starts failing, closed with fix provenance when it passes again,
//! and reopened if it regresses.

pub mod adapters;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod identity;
pub mod lifecycle;
pub mod mapping;
pub mod ports;
pub mod reporter;
pub mod results;
pub mod store;
pub mod template;

#[cfg(test)]
pub(crate) mod test_support;

use clap::Parser;

/// Run the CLI with the provided arguments.
///
/// # Errors
///
/// Returns an error string when argument parsing fails or command execution fails.
pub fn run<I, T>(args: I) -> Result<(), String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = cli::Cli::try_parse_from(args).map_err(|err| err.to_string())?;
    commands::dispatch(&cli)
}
