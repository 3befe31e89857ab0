//! Error types for socket listener operations.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Errors surfaced while binding or running the socket listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The listen address did not resolve.
    #[error("failed to resolve listen address {address}: {source}")]
    Resolve {
        /// Configured address.
        address: String,
        /// Resolver failure.
        #[source]
        source: io::Error,
    },
    /// The listen address resolved to nothing usable.
    #[error("no socket addresses resolved for {address}")]
    ResolveEmpty {
        /// Configured address.
        address: String,
    },
    /// Binding failed.
    #[error("failed to bind TCP listener at {addr}: {source}")]
    Bind {
        /// Address being bound.
        addr: SocketAddr,
        /// Bind failure.
        #[source]
        source: io::Error,
    },
    /// The bound socket could not report its address.
    #[error("failed to read the listener address: {source}")]
    LocalAddr {
        /// Underlying failure.
        #[source]
        source: io::Error,
    },
    /// Switching to non-blocking accepts failed.
    #[error("failed to enable non-blocking listener: {source}")]
    NonBlocking {
        /// Underlying failure.
        #[source]
        source: io::Error,
    },
    /// The accept thread panicked.
    #[error("listener thread panicked")]
    ThreadPanic,
}
