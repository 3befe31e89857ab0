//! Nodes of a value graph and their typed payloads.

use std::collections::TryReserveError;

use crate::types::{Primitive, TypeDescriptor, TypeKind};

use super::ledger::NodeId;

/// A homogeneous array of one primitive kind.
#[derive(Debug, Clone)]
pub enum ArrayData {
    /// Characters.
    Char(Vec<u8>),
    /// Signed bytes.
    Int8(Vec<i8>),
    /// Unsigned bytes.
    UInt8(Vec<u8>),
    /// Signed 16-bit integers.
    Int16(Vec<i16>),
    /// Unsigned 16-bit integers.
    UInt16(Vec<u16>),
    /// Signed 32-bit integers.
    Int32(Vec<i32>),
    /// Unsigned 32-bit integers.
    UInt32(Vec<u32>),
    /// Signed 64-bit integers.
    Int64(Vec<i64>),
    /// Unsigned 64-bit integers.
    UInt64(Vec<u64>),
    /// Single-precision floats.
    Float32(Vec<f32>),
    /// Double-precision floats.
    Float64(Vec<f64>),
}

macro_rules! for_each_array {
    ($data:expr, $values:ident => $body:expr) => {
        match $data {
            ArrayData::Char($values) | ArrayData::UInt8($values) => $body,
            ArrayData::Int8($values) => $body,
            ArrayData::Int16($values) => $body,
            ArrayData::UInt16($values) => $body,
            ArrayData::Int32($values) => $body,
            ArrayData::UInt32($values) => $body,
            ArrayData::Int64($values) => $body,
            ArrayData::UInt64($values) => $body,
            ArrayData::Float32($values) => $body,
            ArrayData::Float64($values) => $body,
        }
    };
}

impl ArrayData {
    /// Empty array of `primitive`.
    #[must_use]
    pub const fn empty(primitive: Primitive) -> Self {
        match primitive {
            Primitive::Char => Self::Char(Vec::new()),
            Primitive::Int8 => Self::Int8(Vec::new()),
            Primitive::UInt8 => Self::UInt8(Vec::new()),
            Primitive::Int16 => Self::Int16(Vec::new()),
            Primitive::UInt16 => Self::UInt16(Vec::new()),
            Primitive::Int32 => Self::Int32(Vec::new()),
            Primitive::UInt32 => Self::UInt32(Vec::new()),
            Primitive::Int64 => Self::Int64(Vec::new()),
            Primitive::UInt64 => Self::UInt64(Vec::new()),
            Primitive::Float32 => Self::Float32(Vec::new()),
            Primitive::Float64 => Self::Float64(Vec::new()),
        }
    }

    /// Element kind.
    #[must_use]
    pub const fn primitive(&self) -> Primitive {
        match self {
            Self::Char(_) => Primitive::Char,
            Self::Int8(_) => Primitive::Int8,
            Self::UInt8(_) => Primitive::UInt8,
            Self::Int16(_) => Primitive::Int16,
            Self::UInt16(_) => Primitive::UInt16,
            Self::Int32(_) => Primitive::Int32,
            Self::UInt32(_) => Primitive::UInt32,
            Self::Int64(_) => Primitive::Int64,
            Self::UInt64(_) => Primitive::UInt64,
            Self::Float32(_) => Primitive::Float32,
            Self::Float64(_) => Primitive::Float64,
        }
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        for_each_array!(self, values => values.len())
    }

    /// True when the array holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Elements in canonical big-endian wire order.
    #[must_use]
    #[expect(
        clippy::big_endian_bytes,
        reason = "big-endian is the canonical byte order of the wire format"
    )]
    pub fn to_be_bytes(&self) -> Vec<u8> {
        for_each_array!(self, values => values.iter().flat_map(|value| value.to_be_bytes()).collect())
    }

    /// Elements widened to `f64`.
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        clippy::cast_lossless,
        reason = "widening to f64 is the documented, lossy conversion callers request"
    )]
    pub fn to_f64s(&self) -> Vec<f64> {
        for_each_array!(self, values => values.iter().map(|value| *value as f64).collect())
    }

    /// Elements converted to `i128`; floats truncate toward zero and saturate.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "float to integer conversion truncates by definition"
    )]
    pub fn to_i128s(&self) -> Vec<i128> {
        match self {
            Self::Float32(values) => values.iter().map(|value| *value as i128).collect(),
            Self::Float64(values) => values.iter().map(|value| *value as i128).collect(),
            Self::Char(values) | Self::UInt8(values) => values.iter().map(|value| i128::from(*value)).collect(),
            Self::Int8(values) => values.iter().map(|value| i128::from(*value)).collect(),
            Self::Int16(values) => values.iter().map(|value| i128::from(*value)).collect(),
            Self::UInt16(values) => values.iter().map(|value| i128::from(*value)).collect(),
            Self::Int32(values) => values.iter().map(|value| i128::from(*value)).collect(),
            Self::UInt32(values) => values.iter().map(|value| i128::from(*value)).collect(),
            Self::Int64(values) => values.iter().map(|value| i128::from(*value)).collect(),
            Self::UInt64(values) => values.iter().map(|value| i128::from(*value)).collect(),
        }
    }

    /// Converts every element to `target` with C-style cast semantics.
    ///
    /// Integer targets wrap, float sources truncate toward zero first.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "the caller asked for a lossy reinterpretation"
    )]
    pub fn cast(&self, target: Primitive) -> Self {
        if target == self.primitive() {
            return self.clone();
        }
        match target {
            Primitive::Float32 => Self::Float32(self.to_f64s().iter().map(|value| *value as f32).collect()),
            Primitive::Float64 => Self::Float64(self.to_f64s()),
            Primitive::Char => Self::Char(self.to_i128s().iter().map(|value| *value as u8).collect()),
            Primitive::Int8 => Self::Int8(self.to_i128s().iter().map(|value| *value as i8).collect()),
            Primitive::UInt8 => Self::UInt8(self.to_i128s().iter().map(|value| *value as u8).collect()),
            Primitive::Int16 => Self::Int16(self.to_i128s().iter().map(|value| *value as i16).collect()),
            Primitive::UInt16 => Self::UInt16(self.to_i128s().iter().map(|value| *value as u16).collect()),
            Primitive::Int32 => Self::Int32(self.to_i128s().iter().map(|value| *value as i32).collect()),
            Primitive::UInt32 => Self::UInt32(self.to_i128s().iter().map(|value| *value as u32).collect()),
            Primitive::Int64 => Self::Int64(self.to_i128s().iter().map(|value| *value as i64).collect()),
            Primitive::UInt64 => Self::UInt64(self.to_i128s().iter().map(|value| *value as u64).collect()),
        }
    }
}

impl PartialEq for ArrayData {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Float32(left), Self::Float32(right)) => {
                left.len() == right.len()
                    && left
                        .iter()
                        .zip(right)
                        .all(|(a, b)| a.to_bits() == b.to_bits())
            }
            (Self::Float64(left), Self::Float64(right)) => {
                left.len() == right.len()
                    && left
                        .iter()
                        .zip(right)
                        .all(|(a, b)| a.to_bits() == b.to_bits())
            }
            (Self::Char(left), Self::Char(right)) | (Self::UInt8(left), Self::UInt8(right)) => {
                left == right
            }
            (Self::Int8(left), Self::Int8(right)) => left == right,
            (Self::Int16(left), Self::Int16(right)) => left == right,
            (Self::UInt16(left), Self::UInt16(right)) => left == right,
            (Self::Int32(left), Self::Int32(right)) => left == right,
            (Self::UInt32(left), Self::UInt32(right)) => left == right,
            (Self::Int64(left), Self::Int64(right)) => left == right,
            (Self::UInt64(left), Self::UInt64(right)) => left == right,
            _ => false,
        }
    }
}

/// A record instance: one optional child per layout field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordData {
    layout: String,
    fields: Vec<Option<NodeId>>,
}

impl RecordData {
    pub(crate) const fn new(layout: String, fields: Vec<Option<NodeId>>) -> Self {
        Self { layout, fields }
    }

    /// Layout name.
    #[must_use]
    pub fn layout(&self) -> &str {
        &self.layout
    }

    /// Children in layout field order; `None` is a null field.
    #[must_use]
    pub fn fields(&self) -> &[Option<NodeId>] {
        &self.fields
    }

    /// Child stored in field `index`.
    #[must_use]
    pub fn field(&self, index: usize) -> Option<NodeId> {
        self.fields.get(index).copied().flatten()
    }

    pub(crate) fn push_field(&mut self, child: Option<NodeId>) -> Result<(), TryReserveError> {
        self.fields.try_reserve(1)?;
        self.fields.push(child);
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn set_field(&mut self, index: usize, child: Option<NodeId>) -> bool {
        self.fields.get_mut(index).is_some_and(|slot| {
            *slot = child;
            true
        })
    }
}

/// Payload of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    /// Numeric or character array.
    Atomic(ArrayData),
    /// String array.
    Text(Vec<String>),
    /// Opaque bytes.
    Blob(Vec<u8>),
    /// One record of a named layout.
    Record(RecordData),
    /// Sequence of child values.
    List(Vec<NodeId>),
}

/// One vertex of a value graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    shape: Vec<u64>,
    data: NodeData,
}

impl Node {
    /// One-dimensional array.
    #[must_use]
    pub fn array(data: ArrayData) -> Self {
        let length = u64::try_from(data.len()).unwrap_or(u64::MAX);
        Self {
            shape: vec![length],
            data: NodeData::Atomic(data),
        }
    }

    /// Array with an explicit shape; validated when the value is assembled.
    #[must_use]
    pub const fn shaped(data: ArrayData, shape: Vec<u64>) -> Self {
        Self {
            shape,
            data: NodeData::Atomic(data),
        }
    }

    /// Rank-zero array holding one element.
    #[must_use]
    pub const fn scalar(data: ArrayData) -> Self {
        Self {
            shape: Vec::new(),
            data: NodeData::Atomic(data),
        }
    }

    /// A single string.
    #[must_use]
    pub fn string(text: impl Into<String>) -> Self {
        Self {
            shape: Vec::new(),
            data: NodeData::Text(vec![text.into()]),
        }
    }

    /// One-dimensional string array.
    #[must_use]
    pub fn strings(items: Vec<String>) -> Self {
        let length = u64::try_from(items.len()).unwrap_or(u64::MAX);
        Self {
            shape: vec![length],
            data: NodeData::Text(items),
        }
    }

    /// Opaque bytes.
    #[must_use]
    pub fn blob(bytes: Vec<u8>) -> Self {
        let length = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
        Self {
            shape: vec![length],
            data: NodeData::Blob(bytes),
        }
    }

    /// A record of `layout` with the given field children.
    #[must_use]
    pub fn record(layout: impl Into<String>, fields: Vec<Option<NodeId>>) -> Self {
        Self {
            shape: Vec::new(),
            data: NodeData::Record(RecordData {
                layout: layout.into(),
                fields,
            }),
        }
    }

    /// A sequence of child values.
    #[must_use]
    pub fn list(children: Vec<NodeId>) -> Self {
        let length = u64::try_from(children.len()).unwrap_or(u64::MAX);
        Self {
            shape: vec![length],
            data: NodeData::List(children),
        }
    }

    pub(crate) const fn from_parts(shape: Vec<u64>, data: NodeData) -> Self {
        Self { shape, data }
    }

    /// Dimension lengths; empty for scalars and records.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Payload.
    #[must_use]
    pub const fn data(&self) -> &NodeData {
        &self.data
    }

    /// Mutable payload.
    pub const fn data_mut(&mut self) -> &mut NodeData {
        &mut self.data
    }

    /// Kind of the node.
    #[must_use]
    pub fn kind(&self) -> TypeKind {
        match &self.data {
            NodeData::Atomic(array) => TypeKind::Atomic(array.primitive()),
            NodeData::Text(_) => TypeKind::Text,
            NodeData::Blob(_) => TypeKind::Blob,
            NodeData::Record(record) => TypeKind::Compound(record.layout.clone()),
            NodeData::List(_) => TypeKind::List,
        }
    }

    /// Descriptor of this node as a standalone value.
    #[must_use]
    pub fn descriptor(&self) -> TypeDescriptor {
        TypeDescriptor::array(self.kind(), self.shape.clone())
    }

    /// Number of stored elements.
    #[must_use]
    pub fn stored_len(&self) -> usize {
        match &self.data {
            NodeData::Atomic(array) => array.len(),
            NodeData::Text(items) => items.len(),
            NodeData::Blob(bytes) => bytes.len(),
            NodeData::Record(_) => 1,
            NodeData::List(children) => children.len(),
        }
    }

    /// Child ids in field or sequence order, skipping null fields.
    pub fn children(&self) -> Box<dyn Iterator<Item = NodeId> + '_> {
        match &self.data {
            NodeData::Record(record) => Box::new(record.fields.iter().filter_map(|field| *field)),
            NodeData::List(children) => Box::new(children.iter().copied()),
            NodeData::Atomic(_) | NodeData::Text(_) | NodeData::Blob(_) => {
                Box::new(std::iter::empty())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn floats_compare_bitwise() {
        let left = ArrayData::Float64(vec![f64::NAN, 1.5]);
        let right = ArrayData::Float64(vec![f64::NAN, 1.5]);
        assert_eq!(left, right);
        assert_ne!(ArrayData::Float64(vec![0.0]), ArrayData::Float64(vec![-0.0]));
    }

    #[test]
    fn big_endian_bytes_are_canonical() {
        let data = ArrayData::UInt16(vec![0x0102, 0x0304]);
        assert_eq!(data.to_be_bytes(), vec![1, 2, 3, 4]);
    }

    #[rstest]
    #[case::widen(ArrayData::Int16(vec![-3, 7]), Primitive::Float64, ArrayData::Float64(vec![-3.0, 7.0]))]
    #[case::truncate(ArrayData::Float32(vec![2.75, -1.5]), Primitive::Int32, ArrayData::Int32(vec![2, -1]))]
    #[case::wrap(ArrayData::Int32(vec![257]), Primitive::UInt8, ArrayData::UInt8(vec![1]))]
    #[case::identity(ArrayData::Char(vec![b'a']), Primitive::Char, ArrayData::Char(vec![b'a']))]
    fn casts_between_primitives(
        #[case] input: ArrayData,
        #[case] target: Primitive,
        #[case] expected: ArrayData,
    ) {
        assert_eq!(input.cast(target), expected);
    }

    #[test]
    fn char_and_uint8_are_distinct() {
        assert_ne!(ArrayData::Char(vec![1]), ArrayData::UInt8(vec![1]));
    }

    #[test]
    fn record_children_skip_null_fields() {
        let node = Node::record(
            "pair",
            vec![Some(NodeId::from_index(3)), None, Some(NodeId::from_index(1))],
        );
        let children: Vec<usize> = node.children().map(NodeId::index).collect();
        assert_eq!(children, vec![3, 1]);
    }
}
