//! The `uda` command-line front end.
//!
//! ```text
//! uda [--server-host H] [--server-port P] ... get [--host ALIAS] [--property P]... REQUEST [SOURCE]
//! ```
//!
//! Configuration flags come first and go to `ortho_config`; the rest is the
//! command. A successful `get` prints one JSON object describing the value.

mod config;
mod summary;

#[cfg(test)]
mod tests;

use std::ffi::OsString;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use ortho_config::OrthoError;
use thiserror::Error;
use uda_config::Config;

use crate::context::ClientContext;
use crate::error::ClientError;
use crate::telemetry::{self, TelemetryError};

pub use self::config::{ConfigLoader, OrthoConfigLoader};
pub use self::summary::ValueSummary;

use self::config::split_config_arguments;

/// Failures of one `uda` invocation.
#[derive(Debug, Error)]
pub enum AppError {
    /// The command line did not parse.
    #[error("{0}")]
    CliUsage(#[source] clap::Error),
    /// Configuration could not be loaded.
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(#[source] Arc<OrthoError>),
    /// Logging could not be set up.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    /// The request failed.
    #[error("request failed ({}): {source}", .source.status())]
    Client {
        /// Client failure.
        #[from]
        source: ClientError,
    },
    /// The summary could not be encoded.
    #[error("failed to encode summary: {0}")]
    Serialise(#[source] serde_json::Error),
    /// The summary could not be written.
    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "uda", version, disable_help_subcommand = true)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum CliCommand {
    /// Fetches data and prints a summary of the result.
    Get {
        /// Hosts file alias or `host[:port]` to ask instead of the configured
        /// server.
        #[arg(long)]
        host: Option<String>,
        /// Property such as `get_meta` or `timeout=30`; repeatable.
        #[arg(long = "property", value_name = "PROPERTY")]
        properties: Vec<String>,
        /// Request text, e.g. `BYTES::read(path=/data/x.bytes)`.
        request: String,
        /// Legacy source argument.
        #[arg(default_value = "")]
        source: String,
    },
}

/// Runs `uda` with the process's configuration loader.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with_loader(args, stdout, stderr, &OrthoConfigLoader)
}

/// Runs `uda` with an injected configuration loader.
#[must_use]
pub fn run_with_loader<I, W, E>(
    args: I,
    stdout: &mut W,
    stderr: &mut E,
    loader: &dyn ConfigLoader,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let args: Vec<OsString> = args.into_iter().collect();
    match execute(&args, stdout, loader) {
        Ok(()) => ExitCode::SUCCESS,
        Err(AppError::CliUsage(error)) if !error.use_stderr() => {
            let _ = write!(stdout, "{error}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            let _ = writeln!(stderr, "uda: {error}");
            ExitCode::FAILURE
        }
    }
}

fn execute<W: Write>(
    args: &[OsString],
    stdout: &mut W,
    loader: &dyn ConfigLoader,
) -> Result<(), AppError> {
    let split = split_config_arguments(args);
    let cli = Cli::try_parse_from(&split.command_arguments).map_err(AppError::CliUsage)?;
    let config = loader
        .load(&split.config_arguments)
        .map_err(AppError::LoadConfiguration)?;
    telemetry::initialise(&config)?;
    match cli.command {
        CliCommand::Get {
            host,
            properties,
            request,
            source,
        } => {
            let summary = fetch(config, host.as_deref(), &properties, &request, &source)?;
            let encoded = serde_json::to_string_pretty(&summary).map_err(AppError::Serialise)?;
            writeln!(stdout, "{encoded}").map_err(AppError::Output)
        }
    }
}

fn fetch(
    config: Config,
    host: Option<&str>,
    properties: &[String],
    request: &str,
    source: &str,
) -> Result<ValueSummary, ClientError> {
    let context = match host {
        Some(alias) => ClientContext::for_alias(config, alias)?,
        None => ClientContext::new(config),
    };
    for property in properties {
        context.set_property(property)?;
    }
    let handle = context.get(request, source)?;
    let summary = context.with_value(handle, |value| ValueSummary::new(value, handle.value()))?;
    context.free(handle)?;
    context.close();
    Ok(summary)
}
