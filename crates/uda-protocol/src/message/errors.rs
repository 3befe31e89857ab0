//! Protocol-level failures.

use thiserror::Error;

use super::ProtocolVersion;
use crate::codec::CodecError;
use crate::status::StatusCode;

/// Failures while exchanging messages.
#[derive(Debug, Clone, Error)]
pub enum ProtocolError {
    /// A record could not be read, written, or decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// The peers speak incompatible protocol versions.
    #[error("protocol version mismatch: local {local}, remote {remote}")]
    VersionMismatch {
        /// This side's version.
        local: ProtocolVersion,
        /// The peer's version.
        remote: ProtocolVersion,
    },
    /// A message arrived out of turn.
    #[error("expected {expected} message, received tag {tag:#04x}")]
    UnexpectedMessage {
        /// Message kind that was expected.
        expected: &'static str,
        /// Tag actually received.
        tag: u8,
    },
    /// The peer closed the channel.
    #[error("connection closed by peer")]
    ConnectionClosed,
}

impl ProtocolError {
    /// Status code for this failure.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Codec(error) => error.status(),
            Self::VersionMismatch { .. } => StatusCode::PROTOCOL_VERSION_MISMATCH,
            Self::UnexpectedMessage { .. } => StatusCode::CODEC_MISMATCH,
            Self::ConnectionClosed => StatusCode::SESSION_CLOSED,
        }
    }

    /// True when the channel can no longer carry messages.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::VersionMismatch { .. })
    }
}
