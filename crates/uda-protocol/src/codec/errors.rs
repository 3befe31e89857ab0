//! Codec failures.

use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::framing::FramingError;
use crate::status::StatusCode;
use crate::value::{AllocationError, ValueError};

/// Failures while encoding or decoding a value.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// The stream ended before a complete item was read.
    #[error("short read while decoding {context}")]
    ShortRead {
        /// Item being decoded.
        context: &'static str,
    },
    /// Type metadata and payload disagree.
    #[error("type metadata does not match payload: {reason}")]
    Mismatch {
        /// What disagreed.
        reason: String,
    },
    /// Storage for decoded data could not be reserved.
    #[error("out of memory reserving {requested} elements")]
    OutOfMemory {
        /// Elements requested.
        requested: u64,
    },
    /// A record fragment exceeded the reader's limit.
    #[error("record fragment of {length} bytes exceeds the {limit}-byte limit")]
    OversizeRecord {
        /// Declared fragment length.
        length: u32,
        /// Reader limit.
        limit: u32,
    },
    /// The value graph nests deeper than allowed.
    #[error("value graph nests deeper than {limit} levels")]
    DepthExceeded {
        /// Configured limit.
        limit: usize,
    },
    /// The underlying stream failed.
    #[error("codec stream failed: {source}")]
    Io {
        /// Stream error.
        #[source]
        source: Arc<io::Error>,
    },
}

impl CodecError {
    /// Status code for this failure.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::ShortRead { .. } => StatusCode::SHORT_READ,
            Self::Mismatch { .. } => StatusCode::CODEC_MISMATCH,
            Self::OutOfMemory { .. } => StatusCode::OUT_OF_MEMORY,
            Self::OversizeRecord { .. } => StatusCode::OVERSIZE_RECORD,
            Self::DepthExceeded { .. } => StatusCode::DEPTH_EXCEEDED,
            Self::Io { .. } => StatusCode::CODEC_IO,
        }
    }

    /// Builds a [`CodecError::Mismatch`].
    pub fn mismatch(reason: impl Into<String>) -> Self {
        Self::Mismatch {
            reason: reason.into(),
        }
    }

    /// Classifies a stream error raised while handling `context`.
    #[must_use]
    pub fn from_io(error: io::Error, context: &'static str) -> Self {
        if error.kind() == io::ErrorKind::UnexpectedEof {
            return Self::ShortRead { context };
        }
        let oversize = error
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<FramingError>())
            .map(|framing| match framing {
                FramingError::Oversize { length, limit } => (*length, *limit),
            });
        match oversize {
            Some((length, limit)) => Self::OversizeRecord { length, limit },
            None => Self::Io {
                source: Arc::new(error),
            },
        }
    }
}

impl From<AllocationError> for CodecError {
    fn from(error: AllocationError) -> Self {
        match error {
            AllocationError::OutOfMemory { requested } => Self::OutOfMemory {
                requested: u64::try_from(requested).unwrap_or(u64::MAX),
            },
        }
    }
}

impl From<ValueError> for CodecError {
    fn from(error: ValueError) -> Self {
        match error {
            ValueError::Allocation(allocation) => allocation.into(),
            other => Self::mismatch(other.to_string()),
        }
    }
}
