//! Messages exchanged over a record-framed channel.
//!
//! Every message occupies exactly one framed record. A session opens with a
//! [`Hello`] from each side; afterwards the client sends [`ClientMessage`]s
//! and the server answers each `Get` or `Put` with one [`Response`].

mod errors;

use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::codec::wire::{WireReader, WireWriter};
use crate::codec::{CodecError, StructureCodec};
use crate::error_stack::{ErrorRecord, ErrorStack};
use crate::framing::{RecordReader, RecordWriter};
use crate::request::{Argument, RequestModel};
use crate::status::StatusCode;
use crate::value::Value;

pub use self::errors::ProtocolError;

const MESSAGE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::message");

const HELLO_TAG: u8 = b'H';
const RESPONSE_TAG: u8 = b'R';
const GET_TAG: u8 = 1;
const PUT_TAG: u8 = 2;
const CLOSE_TAG: u8 = 3;
const DATA_KIND: u8 = 1;
const ACKNOWLEDGED_KIND: u8 = 2;

/// Protocol revision. Peers interoperate when their major numbers agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProtocolVersion {
    /// Incompatible revisions differ here.
    pub major: u16,
    /// Backwards-compatible additions.
    pub minor: u16,
}

impl ProtocolVersion {
    /// Builds a version.
    #[must_use]
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// Agrees a session version with `remote`: the lower minor of two equal
    /// majors.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::VersionMismatch`] when the majors differ.
    pub fn negotiate(self, remote: Self) -> Result<Self, ProtocolError> {
        if self.major != remote.major {
            return Err(ProtocolError::VersionMismatch {
                local: self,
                remote,
            });
        }
        Ok(Self::new(self.major, self.minor.min(remote.minor)))
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}.{}", self.major, self.minor)
    }
}

/// Version spoken by this build.
pub const PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion::new(1, 0);

/// Handshake payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hello {
    /// Sender's protocol version.
    pub version: ProtocolVersion,
    /// Free-form identification of the sender, e.g. `udad 0.1.0`.
    pub agent: String,
}

impl Hello {
    /// A hello for this build.
    #[must_use]
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            agent: agent.into(),
        }
    }
}

/// Client-to-server messages.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Fetch data.
    Get(RequestModel),
    /// Send data to a plugin.
    Put {
        /// Addressed plugin and function.
        request: RequestModel,
        /// Payload for the plugin.
        data: Value,
    },
    /// End the session.
    Close,
}

/// Server replies.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// The call produced data.
    Data(Value),
    /// The call succeeded without data.
    Acknowledged,
    /// The call failed; the stack is never empty.
    Failed(ErrorStack),
}

impl Response {
    /// A failure carrying one record.
    #[must_use]
    pub fn failure(code: StatusCode, location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed(ErrorRecord::new(code, location, message).into())
    }

    /// Status sent on the wire for this response.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Data(_) | Self::Acknowledged => StatusCode::OK,
            Self::Failed(errors) => errors.code(),
        }
    }
}

/// Writes a [`Hello`] as one record.
///
/// # Errors
///
/// Fails when the channel cannot be written.
pub fn write_hello<W: Write>(
    output: &mut RecordWriter<W>,
    hello: &Hello,
) -> Result<(), ProtocolError> {
    let mut wire = WireWriter::new(output);
    wire.u8(HELLO_TAG)?;
    wire.u16(hello.version.major)?;
    wire.u16(hello.version.minor)?;
    wire.string(&hello.agent)?;
    finish(output)
}

/// Reads the peer's [`Hello`].
///
/// # Errors
///
/// Returns [`ProtocolError::ConnectionClosed`] when the peer hangs up first
/// and [`ProtocolError::UnexpectedMessage`] for any other message.
pub fn read_hello<R: Read>(input: &mut RecordReader<R>) -> Result<Hello, ProtocolError> {
    open(input)?;
    let mut wire = WireReader::new(input);
    let tag = wire.u8("message tag")?;
    if tag != HELLO_TAG {
        return Err(ProtocolError::UnexpectedMessage {
            expected: "hello",
            tag,
        });
    }
    let major = wire.u16("protocol major")?;
    let minor = wire.u16("protocol minor")?;
    let agent = wire.string("agent")?;
    ensure_consumed(input)?;
    let hello = Hello {
        version: ProtocolVersion::new(major, minor),
        agent,
    };
    debug!(target: MESSAGE_TARGET, version = %hello.version, agent = %hello.agent, "received hello");
    Ok(hello)
}

/// Writes a client message.
///
/// # Errors
///
/// Fails when the channel cannot be written or a payload cannot be encoded.
pub fn write_request<W: Write>(
    output: &mut RecordWriter<W>,
    codec: &StructureCodec,
    message: &ClientMessage,
) -> Result<(), ProtocolError> {
    let mut wire = WireWriter::new(output);
    match message {
        ClientMessage::Get(request) => {
            wire.u8(GET_TAG)?;
            write_model(&mut wire, request)?;
        }
        ClientMessage::Put { request, data } => {
            wire.u8(PUT_TAG)?;
            write_model(&mut wire, request)?;
            codec.encode(data, output)?;
        }
        ClientMessage::Close => wire.u8(CLOSE_TAG)?,
    }
    finish(output)
}

/// Reads the next client message. `None` means the client hung up cleanly.
///
/// # Errors
///
/// Returns codec errors for malformed records and
/// [`ProtocolError::UnexpectedMessage`] for unknown tags.
pub fn read_request<R: Read>(
    input: &mut RecordReader<R>,
    codec: &StructureCodec,
) -> Result<Option<ClientMessage>, ProtocolError> {
    match open(input) {
        Ok(()) => {}
        Err(ProtocolError::ConnectionClosed) => return Ok(None),
        Err(error) => return Err(error),
    }
    let mut wire = WireReader::new(input);
    let tag = wire.u8("message tag")?;
    let message = match tag {
        GET_TAG => ClientMessage::Get(read_model(&mut wire)?),
        PUT_TAG => {
            let request = read_model(&mut wire)?;
            let data = codec.decode(input, None)?;
            ClientMessage::Put { request, data }
        }
        CLOSE_TAG => ClientMessage::Close,
        other => {
            return Err(ProtocolError::UnexpectedMessage {
                expected: "client request",
                tag: other,
            });
        }
    };
    ensure_consumed(input)?;
    trace!(target: MESSAGE_TARGET, tag, "received client message");
    Ok(Some(message))
}

/// Writes a server response.
///
/// # Errors
///
/// Fails when the channel cannot be written, a value cannot be encoded, or a
/// failure response carries no records.
pub fn write_response<W: Write>(
    output: &mut RecordWriter<W>,
    codec: &StructureCodec,
    response: &Response,
) -> Result<(), ProtocolError> {
    let mut wire = WireWriter::new(output);
    wire.u8(RESPONSE_TAG)?;
    match response {
        Response::Data(value) => {
            wire.i32(StatusCode::OK.value())?;
            wire.u8(DATA_KIND)?;
            codec.encode(value, output)?;
        }
        Response::Acknowledged => {
            wire.i32(StatusCode::OK.value())?;
            wire.u8(ACKNOWLEDGED_KIND)?;
        }
        Response::Failed(errors) => {
            if errors.code().is_success() {
                return Err(CodecError::mismatch("failure response carries no error").into());
            }
            wire.i32(errors.code().value())?;
            write_error_stack(&mut wire, errors)?;
        }
    }
    finish(output)
}

/// Reads one server response.
///
/// # Errors
///
/// Returns [`ProtocolError::ConnectionClosed`] when the server hangs up and
/// codec errors for malformed records.
pub fn read_response<R: Read>(
    input: &mut RecordReader<R>,
    codec: &StructureCodec,
) -> Result<Response, ProtocolError> {
    open(input)?;
    let mut wire = WireReader::new(input);
    let tag = wire.u8("message tag")?;
    if tag != RESPONSE_TAG {
        return Err(ProtocolError::UnexpectedMessage {
            expected: "response",
            tag,
        });
    }
    let status = StatusCode::new(wire.i32("status")?);
    let response = if status.is_success() {
        match wire.u8("response kind")? {
            DATA_KIND => Response::Data(codec.decode(input, None)?),
            ACKNOWLEDGED_KIND => Response::Acknowledged,
            other => {
                return Err(CodecError::mismatch(format!("unknown response kind {other}")).into());
            }
        }
    } else {
        let errors = read_error_stack(&mut wire)?;
        if errors.code() != status {
            return Err(CodecError::mismatch(format!(
                "status {status} disagrees with error stack code {}",
                errors.code()
            ))
            .into());
        }
        Response::Failed(errors)
    };
    ensure_consumed(input)?;
    trace!(target: MESSAGE_TARGET, %status, "received response");
    Ok(response)
}

fn open<R: Read>(input: &mut RecordReader<R>) -> Result<(), ProtocolError> {
    match input.next_message() {
        Ok(true) => Ok(()),
        Ok(false) => Err(ProtocolError::ConnectionClosed),
        Err(error) => Err(CodecError::from_io(error, "record header").into()),
    }
}

fn finish<W: Write>(output: &mut RecordWriter<W>) -> Result<(), ProtocolError> {
    output
        .end_message()
        .map_err(|error| CodecError::from_io(error, "record end").into())
}

fn ensure_consumed<R: Read>(input: &mut RecordReader<R>) -> Result<(), ProtocolError> {
    let mut probe = [0_u8; 1];
    match input.read(&mut probe) {
        Ok(0) => Ok(()),
        Ok(_) => Err(CodecError::mismatch("message carries trailing bytes").into()),
        Err(error) => Err(CodecError::from_io(error, "message end").into()),
    }
}

fn write_optional_shot<W: Write>(
    wire: &mut WireWriter<'_, W>,
    shot: Option<i64>,
) -> Result<(), CodecError> {
    match shot {
        Some(number) => {
            wire.u8(1)?;
            wire.i64(number)
        }
        None => wire.u8(0),
    }
}

fn write_model<W: Write>(
    wire: &mut WireWriter<'_, W>,
    request: &RequestModel,
) -> Result<(), CodecError> {
    wire.string(&request.raw)?;
    wire.string(&request.source)?;
    wire.string(&request.delimiter)?;
    for field in [
        &request.target,
        &request.function,
        &request.signal,
        &request.path,
        &request.archive,
        &request.device,
        &request.format,
        &request.pass,
    ] {
        wire.optional_string(field.as_deref())?;
    }
    write_optional_shot(wire, request.shot)?;
    wire.length(request.arguments.len())?;
    for argument in &request.arguments {
        wire.string(&argument.name)?;
        wire.string(&argument.value)?;
    }
    wire.length(request.extra.len())?;
    for (name, value) in &request.extra {
        wire.string(name)?;
        wire.string(value)?;
    }
    Ok(())
}

fn read_model<R: Read>(wire: &mut WireReader<'_, R>) -> Result<RequestModel, CodecError> {
    let raw = wire.string("request text")?;
    let source = wire.string("request source")?;
    let delimiter = wire.string("request delimiter")?;
    let target = wire.optional_string("request target")?;
    let function = wire.optional_string("request function")?;
    let signal = wire.optional_string("request signal")?;
    let path = wire.optional_string("request path")?;
    let archive = wire.optional_string("request archive")?;
    let device = wire.optional_string("request device")?;
    let format = wire.optional_string("request format")?;
    let pass = wire.optional_string("request pass")?;
    let shot = match wire.u8("shot flag")? {
        0 => None,
        1 => Some(wire.i64("shot")?),
        other => return Err(CodecError::mismatch(format!("invalid shot flag {other}"))),
    };

    let argument_count = wire.length("argument count")?;
    let mut arguments = Vec::new();
    for _ in 0..argument_count {
        let name = wire.string("argument name")?;
        let value = wire.string("argument value")?;
        crate::codec::wire::reserve(&mut arguments, 1)?;
        arguments.push(Argument { name, value });
    }
    let extra_count = wire.length("extra count")?;
    let mut extra = BTreeMap::new();
    for _ in 0..extra_count {
        let name = wire.string("extra name")?;
        let value = wire.string("extra value")?;
        extra.insert(name, value);
    }

    Ok(RequestModel {
        raw,
        source,
        target,
        function,
        arguments,
        extra,
        signal,
        path,
        archive,
        device,
        format,
        delimiter,
        shot,
        pass,
    })
}

fn write_error_stack<W: Write>(
    wire: &mut WireWriter<'_, W>,
    errors: &ErrorStack,
) -> Result<(), CodecError> {
    wire.length(errors.len())?;
    for record in errors.iter() {
        wire.i32(record.code.value())?;
        wire.string(&record.location)?;
        wire.string(&record.message)?;
    }
    Ok(())
}

fn read_error_stack<R: Read>(wire: &mut WireReader<'_, R>) -> Result<ErrorStack, CodecError> {
    let count = wire.length("error count")?;
    let mut errors = ErrorStack::new();
    for _ in 0..count {
        let code = StatusCode::new(wire.i32("error code")?);
        let location = wire.string("error location")?;
        let message = wire.string("error message")?;
        errors.push(ErrorRecord::new(code, location, message));
    }
    Ok(errors)
}
