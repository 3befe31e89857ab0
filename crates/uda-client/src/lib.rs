//! Client side of the UDA protocol.
//!
//! A [`ClientContext`] turns request text into handles:
//!
//! 1. [`HostRegistry`] maps an alias from the hosts file to an endpoint;
//! 2. [`ConnectionManager`] opens (or reuses) a session to it, retrying with
//!    jitter and failing over to the secondary host;
//! 3. the request travels as one framed message and the decoded value is
//!    stored in the [`HandleTable`].
//!
//! ```no_run
//! use uda_client::ClientContext;
//! use uda_config::Config;
//!
//! let context = ClientContext::new(Config::default());
//! let handle = context.get("HELP::ping()", "")?;
//! let kind = context.with_value(handle, |value| value.kind().type_name())?;
//! assert_eq!(kind, "ping");
//! context.free(handle)?;
//! # Ok::<(), uda_client::ClientError>(())
//! ```

pub mod cli;
pub mod connection;
pub mod context;
pub mod error;
pub mod handles;
pub mod hosts;
pub mod telemetry;

#[cfg(test)]
mod tests;

pub use connection::{
    ConnectFailure, ConnectionError, ConnectionManager, Connector, Jitter, RetryPolicy, Session,
    SessionId, Sleeper, TcpConnector, ThreadSleeper,
};
pub use context::{ClientContext, Properties, Property};
pub use error::ClientError;
pub use handles::{Handle, HandleEntry, HandleTable};
pub use hosts::{HostEntry, HostFileError, HostRegistry};
