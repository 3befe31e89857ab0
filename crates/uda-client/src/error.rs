//! Client-side failures and their status codes.

use thiserror::Error;
use uda_protocol::{ErrorRecord, ErrorStack, ParseError, ProtocolError, StatusCode};

use crate::connection::ConnectionError;
use crate::handles::Handle;
use crate::hosts::HostFileError;

/// Everything a client call can fail with.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// No session could be opened.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    /// The session failed mid round trip and was closed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// The request text did not parse.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The server answered with an error stack.
    #[error("server error: {}", .errors.message())]
    Server {
        /// Records reported by the server, oldest first.
        errors: ErrorStack,
    },
    /// The handle was never issued or has been freed.
    #[error("unknown handle {handle}")]
    UnknownHandle {
        /// Offending handle.
        handle: Handle,
    },
    /// The host alias is not in the hosts file.
    #[error("unknown host alias '{alias}'")]
    UnknownHostAlias {
        /// Alias asked for.
        alias: String,
    },
    /// The hosts file could not be read.
    #[error(transparent)]
    HostFile(#[from] HostFileError),
    /// A property name or value was not recognised.
    #[error("unrecognised property '{property}'")]
    BadProperty {
        /// Text passed to the property setter.
        property: String,
    },
}

impl ClientError {
    /// Status code for this failure.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Connection(error) => error.status(),
            Self::Protocol(error) => error.status(),
            Self::Parse(error) => error.status(),
            Self::Server { errors } => errors.code(),
            Self::UnknownHandle { .. } => StatusCode::UNKNOWN_HANDLE,
            Self::UnknownHostAlias { .. } | Self::HostFile(_) => StatusCode::UNKNOWN_HOST_ALIAS,
            Self::BadProperty { .. } => StatusCode::BAD_PROPERTY,
        }
    }

    /// The records this failure adds to a caller's error stack.
    #[must_use]
    pub fn to_stack(&self, location: &str) -> ErrorStack {
        match self {
            Self::Server { errors } => errors.clone(),
            other => ErrorRecord::new(other.status(), location, other.to_string()).into(),
        }
    }
}
