//! Numeric status codes shared by client and server.
//!
//! Zero is success. Failures are negative and fall into disjoint ranges, one
//! per error family, so a caller can classify a failure from the number alone.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::Display;

/// Error family a status code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum StatusClass {
    /// The call succeeded.
    Success,
    /// Socket resolution, connection, option or session failures.
    Connection,
    /// Framing and structure marshalling failures.
    Codec,
    /// Plugin resolution and invocation failures.
    Dispatch,
    /// Client-side bookkeeping failures.
    Client,
    /// A code outside every known range.
    Unknown,
}

/// A signed status code as carried on the wire and returned to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(i32);

impl StatusCode {
    /// The call succeeded.
    pub const OK: Self = Self(0);

    /// Host name could not be resolved.
    pub const RESOLUTION_FAILED: Self = Self(-100);
    /// Every connect attempt against every configured host failed.
    pub const ATTEMPTS_EXHAUSTED: Self = Self(-101);
    /// A socket option could not be applied.
    pub const SOCKET_OPTION: Self = Self(-102);
    /// Reading or writing the channel failed.
    pub const CHANNEL_IO: Self = Self(-103);
    /// The peers disagree on the protocol major version.
    pub const PROTOCOL_VERSION_MISMATCH: Self = Self(-104);
    /// The session was closed by the peer.
    pub const SESSION_CLOSED: Self = Self(-105);

    /// A record ended before its declared length.
    pub const SHORT_READ: Self = Self(-200);
    /// Type metadata and payload disagree.
    pub const CODEC_MISMATCH: Self = Self(-201);
    /// A decode could not allocate storage.
    pub const OUT_OF_MEMORY: Self = Self(-202);
    /// A record fragment exceeded the configured limit.
    pub const OVERSIZE_RECORD: Self = Self(-203);
    /// A value graph nested deeper than the decoder allows.
    pub const DEPTH_EXCEEDED: Self = Self(-204);
    /// The codec's underlying stream failed.
    pub const CODEC_IO: Self = Self(-205);

    /// No plugin matches the request.
    pub const NO_PLUGIN: Self = Self(-300);
    /// Several equally specific plugins match the request.
    pub const AMBIGUOUS_PLUGIN: Self = Self(-301);
    /// The plugin reported a failure.
    pub const PLUGIN_FAILED: Self = Self(-302);
    /// The plugin's one-time initialisation failed.
    pub const PLUGIN_INIT_FAILED: Self = Self(-303);
    /// The request text could not be parsed.
    pub const REQUEST_PARSE: Self = Self(-304);
    /// The plugin does not support the requested operation.
    pub const UNSUPPORTED_OPERATION: Self = Self(-305);
    /// A file-reading plugin refused a path outside the safelist.
    pub const ACCESS_DENIED: Self = Self(-306);

    /// The handle is not present in the handle table.
    pub const UNKNOWN_HANDLE: Self = Self(-400);
    /// A host alias is not present in the hosts file.
    pub const UNKNOWN_HOST_ALIAS: Self = Self(-401);
    /// A client property name or value was not recognised.
    pub const BAD_PROPERTY: Self = Self(-402);

    /// Wraps a raw code.
    #[must_use]
    pub const fn new(code: i32) -> Self {
        Self(code)
    }

    /// The raw signed value.
    #[must_use]
    pub const fn value(self) -> i32 {
        self.0
    }

    /// True for [`StatusCode::OK`].
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }

    /// Classifies the code by range.
    #[must_use]
    pub const fn class(self) -> StatusClass {
        match self.0 {
            0 => StatusClass::Success,
            -199..=-100 => StatusClass::Connection,
            -299..=-200 => StatusClass::Codec,
            -399..=-300 => StatusClass::Dispatch,
            -499..=-400 => StatusClass::Client,
            _ => StatusClass::Unknown,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl From<StatusCode> for i32 {
    fn from(code: StatusCode) -> Self {
        code.0
    }
}
