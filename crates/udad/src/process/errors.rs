//! Errors that stop the server process.

use thiserror::Error;

use super::shutdown::ShutdownError;
use crate::bootstrap::BootstrapError;
use crate::transport::ListenerError;

/// Failures while launching or stopping the server.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Bootstrap failed before the listener started.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    /// The listener failed to start or stop.
    #[error("listener failed: {0}")]
    Listener(#[from] ListenerError),
    /// Waiting for a shutdown signal failed.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
}
