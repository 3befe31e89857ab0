//! One handshaken channel to a server.

use std::fmt;
use std::io::{Read, Write};

use tracing::debug;
use uda_config::HostPort;
use uda_protocol::message::{read_hello, read_response, write_hello, write_request};
use uda_protocol::{
    ClientMessage, Hello, PROTOCOL_VERSION, ProtocolError, ProtocolVersion, RecordReader,
    RecordWriter, Response, StructureCodec,
};

use super::CONNECTION_TARGET;

/// Agent string sent in the client hello.
pub const CLIENT_AGENT: &str = concat!("uda-client ", env!("CARGO_PKG_VERSION"));

/// Key of a session in the manager's table. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Numeric value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl From<u64> for SessionId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "session-{}", self.0)
    }
}

/// An open channel that has completed the version handshake.
#[derive(Debug)]
pub struct Session<S: Read + Write> {
    id: SessionId,
    peer: HostPort,
    version: ProtocolVersion,
    server_agent: String,
    channel: RecordReader<S>,
}

impl<S: Read + Write> Session<S> {
    /// Exchanges hellos over `stream` and agrees a version.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::VersionMismatch`] when the server speaks a
    /// different major version, or the I/O failure that interrupted the
    /// exchange. The stream is dropped either way.
    pub fn open(id: SessionId, peer: HostPort, stream: S) -> Result<Self, ProtocolError> {
        let mut channel = RecordReader::new(stream);
        write_hello(&mut RecordWriter::new(channel.get_mut()), &Hello::new(CLIENT_AGENT))?;
        let server = read_hello(&mut channel)?;
        let version = PROTOCOL_VERSION.negotiate(server.version)?;
        debug!(
            target: CONNECTION_TARGET,
            %id,
            %peer,
            %version,
            agent = %server.agent,
            "session open"
        );
        Ok(Self {
            id,
            peer,
            version,
            server_agent: server.agent,
            channel,
        })
    }

    /// Session key.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Host the session is connected to.
    #[must_use]
    pub const fn peer(&self) -> &HostPort {
        &self.peer
    }

    /// Version agreed during the handshake.
    #[must_use]
    pub const fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Agent string the server announced.
    #[must_use]
    pub fn server_agent(&self) -> &str {
        &self.server_agent
    }

    /// Sends `message` and waits for the server's response.
    ///
    /// # Errors
    ///
    /// Any error leaves the channel in an unknown state; the caller must
    /// discard the session.
    pub fn round_trip(
        &mut self,
        codec: &StructureCodec,
        message: &ClientMessage,
    ) -> Result<Response, ProtocolError> {
        write_request(&mut RecordWriter::new(self.channel.get_mut()), codec, message)?;
        read_response(&mut self.channel, codec)
    }

    /// Tells the server the session is over and drops the channel.
    pub fn close(mut self, codec: &StructureCodec) {
        let mut output = RecordWriter::new(self.channel.get_mut());
        if let Err(error) = write_request(&mut output, codec, &ClientMessage::Close) {
            debug!(target: CONNECTION_TARGET, id = %self.id, %error, "close message not delivered");
        }
    }
}
