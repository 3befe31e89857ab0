//! Wire protocol shared by the `udad` server and its clients.
//!
//! The crate owns everything both ends must agree on:
//!
//! - [`status`] codes and the [`error_stack`] returned instead of raised
//!   errors;
//! - the self-describing [`value`] model and its arena
//!   [`AllocationLedger`](value::AllocationLedger);
//! - the [`codec`] that streams values through [`framing`] records;
//! - the [`request`] grammar and the session [`message`]s.
//!
//! Nothing here touches sockets; callers hand in any `Read`/`Write` pair.

pub mod codec;
pub mod error_stack;
pub mod framing;
pub mod message;
pub mod request;
pub mod status;
pub mod types;
pub mod value;

pub use codec::{CodecError, StructureCodec};
pub use error_stack::{ErrorRecord, ErrorStack};
pub use framing::{RecordReader, RecordWriter};
pub use message::{
    ClientMessage, Hello, PROTOCOL_VERSION, ProtocolError, ProtocolVersion, Response,
};
pub use request::{Argument, ParseError, RequestModel};
pub use status::{StatusClass, StatusCode};
pub use types::{FieldDescriptor, Primitive, TypeDescriptor, TypeKind, TypeTable};
pub use value::{ArrayData, Node, NodeData, NodeId, Value, ValueError};
