//! TCP listener and the connection handler seam.
//!
//! The listener polls a non-blocking socket against a shutdown flag and
//! hands every accepted stream to its own worker thread.

mod errors;
mod listener;

use std::net::TcpStream;

pub use self::errors::ListenerError;
pub use self::listener::{ListenerHandle, SocketListener};

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

/// Serves one accepted connection on its worker thread.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Handles a single connection until it ends. Must not panic.
    fn handle(&self, stream: TcpStream);
}
