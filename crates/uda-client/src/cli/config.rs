//! Splits configuration flags from the command and loads [`Config`].

use std::ffi::{OsStr, OsString};
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use uda_config::Config;

/// Flags forwarded to the configuration loader. They must precede the
/// subcommand; the same flag after it belongs to the command.
pub(crate) const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--server-host",
    "--server-port",
    "--server-host2",
    "--server-port2",
    "--hosts-file",
    "--max-socket-attempts",
    "--max-socket-delay",
    "--timeout",
    "--log-filter",
    "--log-format",
];

/// Loads configuration from the forwarded flags.
pub trait ConfigLoader {
    /// Builds a [`Config`] from `args`, whose first element is the program name.
    ///
    /// # Errors
    ///
    /// Returns the loader's failure when a layer cannot be read or merged.
    fn load(&self, args: &[OsString]) -> Result<Config, Arc<OrthoError>>;
}

/// Layers file, environment and flags through `ortho_config`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, Arc<OrthoError>> {
        Config::load_from_iter(args.iter().cloned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Include { needs_value: bool },
    Stop,
}

fn classify(argument: &OsStr) -> FlagAction {
    let text = argument.to_string_lossy();
    let (flag, inline) = match text.split_once('=') {
        Some((flag, _)) => (flag, true),
        None => (text.as_ref(), false),
    };
    if CONFIG_CLI_FLAGS.contains(&flag) {
        FlagAction::Include {
            needs_value: !inline,
        }
    } else {
        FlagAction::Stop
    }
}

/// Result of [`split_config_arguments`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ConfigArgumentSplit {
    /// Program name plus every leading configuration flag and value.
    pub(crate) config_arguments: Vec<OsString>,
    /// Program name plus everything from the first non-configuration token.
    pub(crate) command_arguments: Vec<OsString>,
}

pub(crate) fn split_config_arguments(args: &[OsString]) -> ConfigArgumentSplit {
    let mut remaining = args.iter();
    let program: Vec<OsString> = remaining.next().cloned().into_iter().collect();
    let mut config_arguments = program.clone();
    let mut command_arguments = program;
    let mut pending_value = false;
    let mut rest = remaining.as_slice();
    while let Some((argument, tail)) = rest.split_first() {
        if pending_value {
            config_arguments.push(argument.clone());
            pending_value = false;
        } else {
            match classify(argument) {
                FlagAction::Include { needs_value } => {
                    config_arguments.push(argument.clone());
                    pending_value = needs_value;
                }
                FlagAction::Stop => break,
            }
        }
        rest = tail;
    }
    command_arguments.extend(rest.iter().cloned());
    ConfigArgumentSplit {
        config_arguments,
        command_arguments,
    }
}
