//! Streaming encoder and decoder for self-describing values.
//!
//! A value is written as its metadata strings, its record layouts, then a
//! pre-order walk of its node graph, then its optional error array. The first
//! visit of a node writes it in full and gives it the next pre-order index;
//! later visits write a back-reference to that index. Shared and cyclic
//! records therefore cross the wire once and decode into the same arena
//! entry. Only the primitive kinds are assumed; everything else is read from
//! the stream.

mod errors;
pub(crate) mod wire;

use std::collections::HashMap;
use std::io::{Read, Write};

use tracing::{debug, trace};

use crate::types::{FieldDescriptor, TypeDescriptor, TypeKind, TypeTable};
use crate::value::{AllocationLedger, Node, NodeData, NodeId, RecordData, Value};

pub use self::errors::CodecError;
use self::wire::{WireReader, WireWriter, reserve};

const CODEC_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::codec");

/// Nesting depth accepted by default.
///
/// Both directions recurse once per level; this depth fits the 2 MiB default
/// stack of a spawned thread in an unoptimised build.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Highest array rank accepted on the wire.
pub const MAX_RANK: u32 = 32;

const VALUE_MARK: u8 = b'V';
const NODE_INLINE: u8 = 0;
const NODE_BACK_REFERENCE: u8 = 1;

/// Encodes and decodes [`Value`] graphs.
#[derive(Debug, Clone, Copy)]
pub struct StructureCodec {
    max_depth: usize,
}

impl Default for StructureCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl StructureCodec {
    /// A codec with [`DEFAULT_MAX_DEPTH`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Overrides the nesting limit applied on both encode and decode.
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Writes `value` to `output`.
    ///
    /// # Errors
    ///
    /// Fails when the stream fails or the graph nests deeper than the limit.
    pub fn encode<W: Write>(&self, value: &Value, output: &mut W) -> Result<(), CodecError> {
        trace!(target: CODEC_TARGET, nodes = value.allocation_count(), "encoding value");
        let mut wire = WireWriter::new(output);
        wire.u8(VALUE_MARK)?;
        wire.optional_string(value.label())?;
        wire.optional_string(value.units())?;
        wire.optional_string(value.description())?;
        write_layouts(&mut wire, value.types())?;

        let mut encoder = GraphEncoder {
            wire,
            ledger: value.ledger(),
            visited: HashMap::new(),
            max_depth: self.max_depth,
        };
        encoder.node(value.root(), 0)?;

        match value.errors() {
            Some(errors) => {
                encoder.wire.u8(1)?;
                encoder.wire.array(errors)
            }
            None => encoder.wire.u8(0),
        }
    }

    /// Reads one value from `input`.
    ///
    /// With a `hint`, the decoded root kind must equal it. Every node is
    /// allocated in a fresh arena; on failure the arena and everything
    /// decoded so far is dropped before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::ShortRead`] on truncated input,
    /// [`CodecError::Mismatch`] when metadata and payload disagree,
    /// [`CodecError::OutOfMemory`] when storage cannot be reserved, and
    /// [`CodecError::DepthExceeded`] for graphs nested beyond the limit.
    pub fn decode<R: Read>(
        &self,
        input: &mut R,
        hint: Option<&TypeKind>,
    ) -> Result<Value, CodecError> {
        let mut wire = WireReader::new(input);
        let mark = wire.u8("value mark")?;
        if mark != VALUE_MARK {
            return Err(CodecError::mismatch(format!(
                "expected value mark {VALUE_MARK:#04x}, found {mark:#04x}"
            )));
        }
        let label = wire.optional_string("label")?;
        let units = wire.optional_string("units")?;
        let description = wire.optional_string("description")?;
        let types = read_layouts(&mut wire)?;

        let mut decoder = GraphDecoder {
            wire,
            ledger: AllocationLedger::new(),
            max_depth: self.max_depth,
        };
        let root = decoder.node(0)?;
        let errors = match decoder.wire.u8("error flag")? {
            0 => None,
            1 => Some(decoder.wire.array()?),
            other => {
                return Err(CodecError::mismatch(format!(
                    "invalid error-array flag {other}"
                )));
            }
        };

        let mut value = Value::new(types, decoder.ledger, root)?;
        value.set_metadata(label, units, description);
        if let Some(error_array) = errors {
            value = value.with_errors(error_array)?;
        }
        if let Some(expected) = hint {
            let found = value.kind();
            if &found != expected {
                return Err(CodecError::mismatch(format!(
                    "expected a {expected} value, received {found}"
                )));
            }
        }
        debug!(target: CODEC_TARGET, nodes = value.allocation_count(), kind = %value.kind(), "decoded value");
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// Layouts
// ---------------------------------------------------------------------------

fn write_kind<W: Write>(wire: &mut WireWriter<'_, W>, kind: &TypeKind) -> Result<(), CodecError> {
    wire.u8(kind.tag())?;
    match kind {
        TypeKind::Atomic(primitive) => wire.u8(primitive.tag()),
        TypeKind::Compound(layout) => wire.string(layout),
        TypeKind::Text | TypeKind::Blob | TypeKind::List => Ok(()),
    }
}

fn read_kind<R: Read>(wire: &mut WireReader<'_, R>) -> Result<TypeKind, CodecError> {
    let tag = wire.u8("kind tag")?;
    match tag {
        1 => {
            let primitive_tag = wire.u8("primitive tag")?;
            crate::types::Primitive::from_tag(primitive_tag)
                .map(TypeKind::Atomic)
                .ok_or_else(|| CodecError::mismatch(format!("unknown primitive tag {primitive_tag}")))
        }
        2 => Ok(TypeKind::Text),
        3 => Ok(TypeKind::Blob),
        4 => Ok(TypeKind::Compound(wire.string("layout reference")?)),
        5 => Ok(TypeKind::List),
        other => Err(CodecError::mismatch(format!("unknown kind tag {other}"))),
    }
}

fn write_layouts<W: Write>(
    wire: &mut WireWriter<'_, W>,
    types: &TypeTable,
) -> Result<(), CodecError> {
    let count = u32::try_from(types.len())
        .map_err(|_| CodecError::mismatch("too many record layouts"))?;
    wire.u32(count)?;
    for layout in types.iter() {
        wire.string(layout.name())?;
        wire.u32(layout.element_size())?;
        let fields = u32::try_from(layout.fields().len())
            .map_err(|_| CodecError::mismatch("too many record fields"))?;
        wire.u32(fields)?;
        for field in layout.fields() {
            wire.string(field.name())?;
            wire.u32(field.offset())?;
            write_kind(wire, field.kind())?;
        }
    }
    Ok(())
}

fn read_layouts<R: Read>(wire: &mut WireReader<'_, R>) -> Result<TypeTable, CodecError> {
    let count = wire.u32("layout count")?;
    let mut table = TypeTable::new();
    for _ in 0..count {
        let name = wire.string("layout name")?;
        let element_size = wire.u32("layout size")?;
        let field_count = wire.u32("field count")?;
        let mut fields = Vec::new();
        for _ in 0..field_count {
            reserve(&mut fields, 1)?;
            let field_name = wire.string("field name")?;
            let offset = wire.u32("field offset")?;
            let kind = read_kind(wire)?;
            fields.push(FieldDescriptor::new(field_name, kind).with_offset(offset));
        }
        table.insert(TypeDescriptor::record_from_parts(name, element_size, fields));
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// Graph encoding
// ---------------------------------------------------------------------------

struct GraphEncoder<'a, 'w, W: Write> {
    wire: WireWriter<'w, W>,
    ledger: &'a AllocationLedger,
    visited: HashMap<NodeId, u32>,
    max_depth: usize,
}

impl<W: Write> GraphEncoder<'_, '_, W> {
    fn node(&mut self, id: NodeId, depth: usize) -> Result<(), CodecError> {
        if depth > self.max_depth {
            return Err(CodecError::DepthExceeded {
                limit: self.max_depth,
            });
        }
        if let Some(index) = self.visited.get(&id) {
            self.wire.u8(NODE_BACK_REFERENCE)?;
            return self.wire.u32(*index);
        }
        let index = u32::try_from(self.visited.len())
            .map_err(|_| CodecError::mismatch("graph has more than 2^32 nodes"))?;
        self.visited.insert(id, index);

        let ledger = self.ledger;
        let node = ledger
            .get(id)
            .ok_or_else(|| CodecError::mismatch(format!("node {} is missing", id.index())))?;
        self.wire.u8(NODE_INLINE)?;
        self.wire.u8(node.kind().tag())?;
        let rank = u32::try_from(node.shape().len())
            .map_err(|_| CodecError::mismatch("rank does not fit in 32 bits"))?;
        self.wire.u32(rank)?;
        for dimension in node.shape() {
            self.wire.u64(*dimension)?;
        }

        match node.data() {
            NodeData::Atomic(array) => self.wire.array(array),
            NodeData::Text(items) => {
                self.wire.length(items.len())?;
                items.iter().try_for_each(|item| self.wire.string(item))
            }
            NodeData::Blob(bytes) => {
                self.wire.length(bytes.len())?;
                self.wire.bytes(bytes)
            }
            NodeData::Record(record) => self.record(record, depth),
            NodeData::List(children) => {
                self.wire.length(children.len())?;
                children
                    .iter()
                    .try_for_each(|child| self.node(*child, depth + 1))
            }
        }
    }

    fn record(&mut self, record: &RecordData, depth: usize) -> Result<(), CodecError> {
        self.wire.string(record.layout())?;
        let fields = u32::try_from(record.fields().len())
            .map_err(|_| CodecError::mismatch("too many record fields"))?;
        self.wire.u32(fields)?;
        for slot in record.fields() {
            match slot {
                Some(child) => {
                    self.wire.u8(1)?;
                    self.node(*child, depth + 1)?;
                }
                None => self.wire.u8(0)?,
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Graph decoding
// ---------------------------------------------------------------------------

struct GraphDecoder<'r, R: Read> {
    wire: WireReader<'r, R>,
    ledger: AllocationLedger,
    max_depth: usize,
}

impl<R: Read> GraphDecoder<'_, R> {
    fn node(&mut self, depth: usize) -> Result<NodeId, CodecError> {
        if depth > self.max_depth {
            return Err(CodecError::DepthExceeded {
                limit: self.max_depth,
            });
        }
        match self.wire.u8("node marker")? {
            NODE_INLINE => self.inline_node(depth),
            NODE_BACK_REFERENCE => {
                let index = self.wire.u32("back-reference")?;
                let position = usize::try_from(index).unwrap_or(usize::MAX);
                if position >= self.ledger.len() {
                    return Err(CodecError::mismatch(format!(
                        "back-reference to node {index} precedes its definition"
                    )));
                }
                Ok(NodeId::from_index(position))
            }
            other => Err(CodecError::mismatch(format!("invalid node marker {other}"))),
        }
    }

    fn inline_node(&mut self, depth: usize) -> Result<NodeId, CodecError> {
        let kind_tag = self.wire.u8("node kind")?;
        let rank = self.wire.u32("rank")?;
        if rank > MAX_RANK {
            return Err(CodecError::mismatch(format!(
                "rank {rank} exceeds the limit of {MAX_RANK}"
            )));
        }
        let mut shape = Vec::new();
        for _ in 0..rank {
            shape.push(self.wire.u64("dimension")?);
        }

        match kind_tag {
            1 => {
                let primitive_tag = self.wire.u8("array primitive")?;
                let count = self.declared_count(&shape, "array length")?;
                let data = self.wire.array_elements(primitive_tag, count)?;
                self.alloc(Node::from_parts(shape, NodeData::Atomic(data)))
            }
            2 => {
                let count = self.declared_count(&shape, "text length")?;
                let mut items = Vec::new();
                while items.len() < count {
                    reserve(&mut items, 1)?;
                    items.push(self.wire.string("text element")?);
                }
                self.alloc(Node::from_parts(shape, NodeData::Text(items)))
            }
            3 => {
                let count = self.declared_count(&shape, "blob length")?;
                let bytes = self.wire.byte_vec(count, "blob")?;
                self.alloc(Node::from_parts(shape, NodeData::Blob(bytes)))
            }
            4 => self.record_node(shape, depth),
            5 => self.list_node(shape, depth),
            other => Err(CodecError::mismatch(format!("unknown node kind {other}"))),
        }
    }

    /// Reads an element count and checks it against the shape.
    fn declared_count(&mut self, shape: &[u64], context: &'static str) -> Result<usize, CodecError> {
        let count = self.wire.u64(context)?;
        let implied = crate::types::element_count(shape);
        if count != implied {
            return Err(CodecError::mismatch(format!(
                "{context} {count} disagrees with shape {shape:?}"
            )));
        }
        usize::try_from(count).map_err(|_| CodecError::OutOfMemory { requested: count })
    }

    fn record_node(&mut self, shape: Vec<u64>, depth: usize) -> Result<NodeId, CodecError> {
        let layout = self.wire.string("record layout")?;
        let field_count = self.wire.u32("record field count")?;
        let id = self.alloc(Node::from_parts(
            shape,
            NodeData::Record(RecordData::new(layout, Vec::new())),
        ))?;

        // Slots grow as presence flags arrive so the count alone cannot
        // force an allocation.
        for _ in 0..field_count {
            let child = match self.wire.u8("field presence")? {
                0 => None,
                1 => Some(self.node(depth + 1)?),
                other => {
                    return Err(CodecError::mismatch(format!(
                        "invalid field presence flag {other}"
                    )));
                }
            };
            if let Some(NodeData::Record(record)) = self.ledger.get_mut(id).map(Node::data_mut) {
                record
                    .push_field(child)
                    .map_err(|_| CodecError::OutOfMemory { requested: 1 })?;
            }
        }
        Ok(id)
    }

    fn list_node(&mut self, shape: Vec<u64>, depth: usize) -> Result<NodeId, CodecError> {
        let count = self.declared_count(&shape, "list length")?;
        let id = self.alloc(Node::from_parts(shape, NodeData::List(Vec::new())))?;
        let mut children = Vec::new();
        while children.len() < count {
            reserve(&mut children, 1)?;
            children.push(self.node(depth + 1)?);
        }
        if let Some(node) = self.ledger.get_mut(id) {
            *node.data_mut() = NodeData::List(children);
        }
        Ok(id)
    }

    fn alloc(&mut self, node: Node) -> Result<NodeId, CodecError> {
        Ok(self.ledger.alloc(node)?)
    }
}
