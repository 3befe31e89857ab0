//! Server side of one client session.
//!
//! A worker owns its connection exclusively. After the handshake it reads
//! one request, dispatches it, and writes one response, until the client
//! sends `Close`, hangs up, or the channel breaks.


use std::io::{BufReader, BufWriter, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info, warn};
use uda_plugins::{DispatchOutcome, Dispatcher, SessionKey};
use uda_protocol::message::{read_hello, read_request, write_hello, write_response};
use uda_protocol::{
    ClientMessage, CodecError, Hello, PROTOCOL_VERSION, ProtocolError, ProtocolVersion,
    RecordReader, RecordWriter, RequestModel, Response, StructureCodec, Value,
};

use crate::transport::ConnectionHandler;

const SESSION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::session");

/// Agent string sent in the server's hello.
pub const SERVER_AGENT: &str = concat!("udad ", env!("CARGO_PKG_VERSION"));

/// Runs sessions against a shared dispatcher.
#[derive(Debug)]
pub struct SessionHandler {
    dispatcher: Arc<Dispatcher>,
    codec: StructureCodec,
    next_session: AtomicU64,
}

impl SessionHandler {
    /// A handler dispatching through `dispatcher`.
    #[must_use]
    pub const fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            codec: StructureCodec::new(),
            next_session: AtomicU64::new(1),
        }
    }

    /// Serves one session over an arbitrary byte channel.
    ///
    /// Returns `Ok(())` when the client closes the session or hangs up between
    /// requests. The session's cached plugin results are released on every
    /// exit path.
    ///
    /// # Errors
    ///
    /// Returns the protocol error that ended the session early.
    pub fn serve<R: Read, W: Write>(&self, input: R, output: W) -> Result<(), ProtocolError> {
        let session = SessionKey(self.next_session.fetch_add(1, Ordering::Relaxed));
        let mut reader = RecordReader::new(input);
        let mut writer = RecordWriter::new(output);
        let result = self.run(session, &mut reader, &mut writer);
        self.dispatcher.end_session(session);
        result
    }

    fn run<R: Read, W: Write>(
        &self,
        session: SessionKey,
        input: &mut RecordReader<R>,
        output: &mut RecordWriter<W>,
    ) -> Result<(), ProtocolError> {
        let version = handshake(input, output)?;
        info!(target: SESSION_TARGET, session = session.0, %version, "session open");

        loop {
            let message = match read_request(input, &self.codec) {
                Ok(Some(message)) => message,
                Ok(None) => {
                    debug!(target: SESSION_TARGET, session = session.0, "client hung up");
                    return Ok(());
                }
                Err(error) => {
                    report_fatal(output, &self.codec, &error);
                    return Err(error);
                }
            };
            let response = match message {
                ClientMessage::Close => {
                    info!(target: SESSION_TARGET, session = session.0, "session closed by client");
                    return Ok(());
                }
                ClientMessage::Get(request) => self.respond(session, &request, None),
                ClientMessage::Put { request, data } => self.respond(session, &request, Some(data)),
            };
            write_response(output, &self.codec, &response)?;
        }
    }

    fn respond(&self, session: SessionKey, request: &RequestModel, data: Option<Value>) -> Response {
        match self.dispatcher.dispatch(session, request, data) {
            Ok(DispatchOutcome {
                value: Some(value), ..
            }) => Response::Data(value),
            Ok(DispatchOutcome { value: None, .. }) => Response::Acknowledged,
            Err(error) => {
                debug!(
                    target: SESSION_TARGET,
                    session = session.0,
                    request = request.raw(),
                    error = %error,
                    "dispatch failed"
                );
                Response::Failed(error.to_record(SESSION_TARGET).into())
            }
        }
    }
}

impl ConnectionHandler for SessionHandler {
    fn handle(&self, stream: TcpStream) {
        let peer = stream
            .peer_addr()
            .map_or_else(|_| String::from("unknown"), |addr| addr.to_string());
        let input = match stream.try_clone() {
            Ok(clone) => clone,
            Err(error) => {
                warn!(target: SESSION_TARGET, peer = %peer, error = %error, "failed to split stream");
                return;
            }
        };
        match self.serve(BufReader::new(input), BufWriter::new(stream)) {
            Ok(()) | Err(ProtocolError::ConnectionClosed) => {}
            Err(error) => warn!(
                target: SESSION_TARGET,
                peer = %peer,
                code = %error.status(),
                error = %error,
                "session ended with error"
            ),
        }
    }
}

/// Exchanges hellos: the client speaks first and the server always answers,
/// so a client with the wrong major version learns why it is disconnected.
fn handshake<R: Read, W: Write>(
    input: &mut RecordReader<R>,
    output: &mut RecordWriter<W>,
) -> Result<ProtocolVersion, ProtocolError> {
    let hello = read_hello(input)?;
    write_hello(output, &Hello::new(SERVER_AGENT))?;
    PROTOCOL_VERSION.negotiate(hello.version).inspect_err(|error| {
        warn!(target: SESSION_TARGET, agent = %hello.agent, error = %error, "rejecting client");
    })
}

/// Best-effort notice to the client before the session is dropped.
fn report_fatal<W: Write>(output: &mut RecordWriter<W>, codec: &StructureCodec, error: &ProtocolError) {
    if matches!(
        error,
        ProtocolError::ConnectionClosed | ProtocolError::Codec(CodecError::Io { .. })
    ) {
        return;
    }
    let response = Response::failure(error.status(), SESSION_TARGET, error.to_string());
    if let Err(write_error) = write_response(output, codec, &response) {
        debug!(target: SESSION_TARGET, error = %write_error, "could not report session failure");
    }
}
