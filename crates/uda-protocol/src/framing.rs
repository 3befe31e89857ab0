//! Record-marked framing for logical messages.
//!
//! A message is written as one or more fragments. Each fragment starts with a
//! 4-byte big-endian header whose low 31 bits hold the fragment length and
//! whose top bit marks the final fragment of the message. Writers emit a
//! fragment whenever their buffer fills, so a message of any size streams
//! through a fixed amount of memory. Readers reassemble fragments
//! transparently and report a truncated fragment as `UnexpectedEof`.

use std::io::{self, Read, Write};

use thiserror::Error;
use tracing::trace;

const FRAMING_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::framing");

/// Bytes buffered before a writer emits a fragment.
pub const DEFAULT_FRAGMENT_SIZE: usize = 32 * 1024;

/// Largest fragment a reader accepts.
pub const MAX_FRAGMENT_SIZE: u32 = 16 * 1024 * 1024;

const LAST_FRAGMENT: u32 = 0x8000_0000;
const LENGTH_MASK: u32 = 0x7fff_ffff;

/// Framing violations surfaced inside `io::Error::other`.
#[derive(Debug, Error)]
pub enum FramingError {
    /// A fragment header declared more bytes than the reader accepts.
    #[error("fragment of {length} bytes exceeds the {limit}-byte limit")]
    Oversize {
        /// Declared length.
        length: u32,
        /// Reader limit.
        limit: u32,
    },
}

/// Buffers writes and emits them as record fragments.
#[derive(Debug)]
pub struct RecordWriter<W: Write> {
    inner: W,
    buffer: Vec<u8>,
    fragment_size: usize,
}

impl<W: Write> RecordWriter<W> {
    /// Wraps `inner` with the default fragment size.
    pub fn new(inner: W) -> Self {
        Self::with_fragment_size(inner, DEFAULT_FRAGMENT_SIZE)
    }

    /// Wraps `inner`, emitting fragments of at most `fragment_size` bytes.
    pub fn with_fragment_size(inner: W, fragment_size: usize) -> Self {
        let size = fragment_size.clamp(1, usize::try_from(LENGTH_MASK).unwrap_or(usize::MAX));
        Self {
            inner,
            buffer: Vec::with_capacity(size),
            fragment_size: size,
        }
    }

    /// Emits the buffered bytes as the final fragment and flushes the stream.
    ///
    /// # Errors
    ///
    /// Propagates failures of the underlying writer.
    pub fn end_message(&mut self) -> io::Result<()> {
        self.emit(true)?;
        self.inner.flush()
    }

    /// Shared access to the wrapped stream.
    pub const fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Exclusive access to the wrapped stream.
    pub const fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    #[expect(
        clippy::big_endian_bytes,
        reason = "fragment headers are big-endian on the wire"
    )]
    fn emit(&mut self, last: bool) -> io::Result<()> {
        let length = u32::try_from(self.buffer.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "fragment too large"))?;
        let header = if last { length | LAST_FRAGMENT } else { length };
        trace!(target: FRAMING_TARGET, length, last, "writing fragment");
        self.inner.write_all(&header.to_be_bytes())?;
        self.inner.write_all(&self.buffer)?;
        self.buffer.clear();
        Ok(())
    }
}

impl<W: Write> Write for RecordWriter<W> {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        if self.buffer.len() >= self.fragment_size {
            self.emit(false)?;
        }
        let room = self.fragment_size.saturating_sub(self.buffer.len());
        let taken = bytes.len().min(room);
        let chunk = bytes.get(..taken).unwrap_or_default();
        self.buffer.extend_from_slice(chunk);
        if self.buffer.len() >= self.fragment_size {
            self.emit(false)?;
        }
        Ok(taken)
    }

    /// Flushes the underlying stream without closing the message.
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Reads one logical message at a time from a fragment stream.
///
/// Call [`RecordReader::next_message`] before reading each message; reads
/// return `Ok(0)` once the final fragment of the current message is consumed.
#[derive(Debug)]
pub struct RecordReader<R: Read> {
    inner: R,
    remaining: u32,
    last: bool,
    max_fragment: u32,
}

impl<R: Read> RecordReader<R> {
    /// Wraps `inner` with the default fragment limit.
    pub const fn new(inner: R) -> Self {
        Self::with_max_fragment(inner, MAX_FRAGMENT_SIZE)
    }

    /// Wraps `inner`, rejecting fragments longer than `max_fragment`.
    pub const fn with_max_fragment(inner: R, max_fragment: u32) -> Self {
        Self {
            inner,
            remaining: 0,
            last: true,
            max_fragment,
        }
    }

    /// Skips what is left of the current message and opens the next one.
    ///
    /// Returns `Ok(false)` when the stream ends cleanly between messages.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedEof` when the stream ends inside a header or
    /// fragment, and an `Other` error wrapping [`FramingError`] for oversize
    /// fragments.
    pub fn next_message(&mut self) -> io::Result<bool> {
        self.skip_message()?;
        match self.read_header()? {
            Some(()) => Ok(true),
            None => Ok(false),
        }
    }

    /// Discards the unread remainder of the current message.
    ///
    /// # Errors
    ///
    /// Propagates read failures.
    pub fn skip_message(&mut self) -> io::Result<()> {
        let mut scratch = [0_u8; 512];
        while self.read(&mut scratch)? > 0 {}
        Ok(())
    }

    /// Shared access to the wrapped stream.
    pub const fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Exclusive access to the wrapped stream.
    pub const fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Reads a fragment header. `None` means the stream ended before any
    /// header byte arrived.
    #[expect(
        clippy::big_endian_bytes,
        reason = "fragment headers are big-endian on the wire"
    )]
    fn read_header(&mut self) -> io::Result<Option<()>> {
        let mut header = [0_u8; 4];
        let mut filled = 0;
        while filled < header.len() {
            let target = header.get_mut(filled..).unwrap_or_default();
            match self.inner.read(target) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "stream ended inside a fragment header",
                    ));
                }
                Ok(count) => filled += count,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => return Err(error),
            }
        }
        let word = u32::from_be_bytes(header);
        let length = word & LENGTH_MASK;
        if length > self.max_fragment {
            return Err(io::Error::other(FramingError::Oversize {
                length,
                limit: self.max_fragment,
            }));
        }
        self.remaining = length;
        self.last = word & LAST_FRAGMENT != 0;
        trace!(target: FRAMING_TARGET, length, last = self.last, "read fragment header");
        Ok(Some(()))
    }
}

impl<R: Read> Read for RecordReader<R> {
    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        if buffer.is_empty() {
            return Ok(0);
        }
        loop {
            if self.remaining > 0 {
                let wanted = usize::try_from(self.remaining)
                    .unwrap_or(usize::MAX)
                    .min(buffer.len());
                let target = buffer.get_mut(..wanted).unwrap_or_default();
                let count = self.inner.read(target)?;
                if count == 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "stream ended inside a fragment",
                    ));
                }
                let consumed = u32::try_from(count).unwrap_or(u32::MAX);
                self.remaining = self.remaining.saturating_sub(consumed);
                return Ok(count);
            }
            if self.last {
                return Ok(0);
            }
            if self.read_header()?.is_none() {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream ended between fragments of one message",
                ));
            }
        }
    }
}
