//! Runs the server from bootstrap to housekeeping.

use tracing::info;

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};
use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};

/// Runs the server with the production collaborators.
///
/// # Errors
///
/// See [`run_server_with`].
pub fn run_server() -> Result<(), LaunchError> {
    run_server_with(&SystemConfigLoader, &SystemShutdownSignal)
}

/// Runs the server until `shutdown` fires, then stops accepting sessions and
/// resets every plugin that was initialised.
///
/// # Errors
///
/// Fails when bootstrap fails, the listener cannot start or panics, or the
/// shutdown signal cannot be awaited.
pub fn run_server_with(
    loader: &dyn ConfigLoader,
    shutdown: &dyn ShutdownSignal,
) -> Result<(), LaunchError> {
    let server = bootstrap_with(loader)?;
    let listener = server.start()?;
    let waited = shutdown.wait();

    listener.shutdown();
    listener.join()?;
    if server.dispatcher().housekeeping() {
        info!(target: PROCESS_TARGET, "plugins reset");
    }
    info!(target: PROCESS_TARGET, "server stopped");
    waited.map_err(LaunchError::from)
}
