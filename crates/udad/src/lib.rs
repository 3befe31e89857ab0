//! The UDA data server.
//!
//! `udad` loads its configuration, installs structured telemetry, builds the
//! plugin registry (built-ins plus any plugins named in the registry file),
//! and then serves clients over TCP. Each accepted connection is handed to a
//! worker thread that owns the session for its whole life: it performs the
//! version handshake and then answers one response per request until the
//! client closes the session or the channel fails.
//!
//! Dispatch failures are returned to the client as an error stack and leave
//! the session open. Codec failures and version mismatches end the session.
//! On `SIGTERM` or `SIGINT` the listener stops accepting, and the dispatcher
//! resets every plugin that was initialised.

mod bootstrap;
mod process;
mod session;
mod telemetry;
mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Server, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
    build_registry,
};
pub use process::{
    LaunchError, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_server, run_server_with,
};
pub use session::{SERVER_AGENT, SessionHandler};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::{ConnectionHandler, ListenerError, ListenerHandle, SocketListener};
