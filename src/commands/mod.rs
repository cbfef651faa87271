//! Command dispatch and handlers.

pub mod check;
pub mod report;
pub mod status;

use std::future::Future;

use crate::adapters::live::filesystem::LiveFileSystem;
use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::context::ServiceContext;

/// Resolve configuration, build the live context, and run the command.
///
/// # Errors
///
/// Returns an error string if configuration is invalid or the selected
/// command handler fails.
pub fn dispatch(cli: &Cli) -> Result<(), String> {
    let config = Config::load(&LiveFileSystem, &cli.overrides(), cli.config.as_deref())
        .map_err(|err| err.to_string())?;
    let ctx = ServiceContext::live(&config).map_err(|err| err.to_string())?;
    dispatch_with_context(&cli.command, &ctx, &config)
}

/// Dispatch a command with the given service context.
fn dispatch_with_context(
    command: &Command,
    ctx: &ServiceContext,
    config: &Config,
) -> Result<(), String> {
    match command {
        Command::Report(args) => block_on(report::run(ctx, config, &args.results)),
        Command::Status { open } => status::run(ctx, config, *open),
        Command::Check => block_on(check::run(ctx, config)),
    }
}

/// Drive an async command to completion on a current-thread runtime.
fn block_on(command: impl Future<Output = Result<(), String>>) -> Result<(), String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| format!("failed to start async runtime: {err}"))?;
    runtime.block_on(command)
}
