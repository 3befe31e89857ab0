//! Self-describing type metadata.
//!
//! Only the [`Primitive`] kinds are known to both peers in advance. Record
//! layouts travel on the wire in a [`TypeTable`]; a record field that holds
//! another record names that record's layout rather than embedding it, which
//! is what lets a layout refer to itself.

use std::collections::BTreeMap;
use std::fmt;

use strum::{Display, EnumString};

/// Atomic element kinds with explicit widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Primitive {
    /// Single-byte character.
    Char,
    /// Signed 8-bit integer.
    Int8,
    /// Unsigned 8-bit integer.
    #[strum(serialize = "uint8")]
    UInt8,
    /// Signed 16-bit integer.
    Int16,
    /// Unsigned 16-bit integer.
    #[strum(serialize = "uint16")]
    UInt16,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    #[strum(serialize = "uint32")]
    UInt32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 64-bit integer.
    #[strum(serialize = "uint64")]
    UInt64,
    /// IEEE 754 binary32.
    Float32,
    /// IEEE 754 binary64.
    Float64,
}

impl Primitive {
    /// Every primitive, in wire-tag order.
    pub const ALL: [Self; 11] = [
        Self::Char,
        Self::Int8,
        Self::UInt8,
        Self::Int16,
        Self::UInt16,
        Self::Int32,
        Self::UInt32,
        Self::Int64,
        Self::UInt64,
        Self::Float32,
        Self::Float64,
    ];

    /// Bytes occupied by one element.
    #[must_use]
    pub const fn size(self) -> u32 {
        match self {
            Self::Char | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }

    /// Tag written on the wire.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Char => 1,
            Self::Int8 => 2,
            Self::UInt8 => 3,
            Self::Int16 => 4,
            Self::UInt16 => 5,
            Self::Int32 => 6,
            Self::UInt32 => 7,
            Self::Int64 => 8,
            Self::UInt64 => 9,
            Self::Float32 => 10,
            Self::Float64 => 11,
        }
    }

    /// Inverse of [`Primitive::tag`].
    #[must_use]
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|primitive| primitive.tag() == tag)
    }

    /// True for the floating-point kinds.
    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }
}

/// Broad shape of a value or record field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Array of one primitive.
    Atomic(Primitive),
    /// Array of length-prefixed strings.
    Text,
    /// Opaque length-prefixed bytes.
    Blob,
    /// Record of a named layout.
    Compound(String),
    /// Sequence of nested values, each self-described.
    List,
}

impl TypeKind {
    /// Wire tag of the kind, without any payload.
    #[must_use]
    pub const fn tag(&self) -> u8 {
        match self {
            Self::Atomic(_) => 1,
            Self::Text => 2,
            Self::Blob => 3,
            Self::Compound(_) => 4,
            Self::List => 5,
        }
    }

    /// Name used in descriptors: the primitive name, the layout name, or a
    /// fixed word for the other kinds.
    #[must_use]
    pub fn type_name(&self) -> String {
        match self {
            Self::Atomic(primitive) => primitive.to_string(),
            Self::Text => String::from("text"),
            Self::Blob => String::from("blob"),
            Self::Compound(name) => name.clone(),
            Self::List => String::from("list"),
        }
    }

    /// Bytes per element for fixed-width kinds; zero for variable-width kinds.
    #[must_use]
    pub const fn element_size(&self) -> u32 {
        match self {
            Self::Atomic(primitive) => primitive.size(),
            Self::Blob => 1,
            Self::Text | Self::Compound(_) | Self::List => 0,
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compound(name) => write!(formatter, "compound<{name}>"),
            other => formatter.write_str(&other.type_name()),
        }
    }
}

/// One member of a record layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDescriptor {
    name: String,
    offset: u32,
    kind: TypeKind,
}

impl FieldDescriptor {
    /// Builds a field; offsets are assigned by [`TypeDescriptor::record`].
    #[must_use]
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            offset: 0,
            kind,
        }
    }

    pub(crate) const fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// Field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Byte offset of the field within a packed record.
    #[must_use]
    pub const fn offset(&self) -> u32 {
        self.offset
    }

    /// Field kind; a record-valued field names its layout.
    #[must_use]
    pub const fn kind(&self) -> &TypeKind {
        &self.kind
    }
}

/// Width of one slot for a variable-length field in a packed record.
pub const REFERENCE_SLOT_SIZE: u32 = 8;

/// Metadata describing a value or record layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    name: String,
    kind: TypeKind,
    element_size: u32,
    shape: Vec<u64>,
    fields: Vec<FieldDescriptor>,
}

impl TypeDescriptor {
    /// Describes an array of `kind` with the given shape.
    #[must_use]
    pub fn array(kind: TypeKind, shape: Vec<u64>) -> Self {
        Self {
            name: kind.type_name(),
            element_size: kind.element_size(),
            kind,
            shape,
            fields: Vec::new(),
        }
    }

    /// Describes a record layout, assigning packed byte offsets to `fields`.
    ///
    /// Fixed-width atomic fields occupy their primitive width; every other
    /// field occupies a [`REFERENCE_SLOT_SIZE`] slot. Each field is aligned to
    /// its own width.
    #[must_use]
    pub fn record(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        let layout_name = name.into();
        let mut offset: u32 = 0;
        let mut laid_out = Vec::with_capacity(fields.len());
        for field in fields {
            let width = match field.kind() {
                TypeKind::Atomic(primitive) => primitive.size(),
                _ => REFERENCE_SLOT_SIZE,
            };
            let misalignment = offset.checked_rem(width).unwrap_or(0);
            if misalignment != 0 {
                offset = offset.saturating_add(width.saturating_sub(misalignment));
            }
            laid_out.push(field.with_offset(offset));
            offset = offset.saturating_add(width);
        }
        Self {
            kind: TypeKind::Compound(layout_name.clone()),
            name: layout_name,
            element_size: offset,
            shape: Vec::new(),
            fields: laid_out,
        }
    }

    /// Rebuilds a record layout exactly as received, offsets included.
    pub(crate) fn record_from_parts(
        name: String,
        element_size: u32,
        fields: Vec<FieldDescriptor>,
    ) -> Self {
        Self {
            kind: TypeKind::Compound(name.clone()),
            name,
            element_size,
            shape: Vec::new(),
            fields,
        }
    }

    /// Type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kind of each element.
    #[must_use]
    pub const fn kind(&self) -> &TypeKind {
        &self.kind
    }

    /// Bytes per element; zero for variable-width kinds.
    #[must_use]
    pub const fn element_size(&self) -> u32 {
        self.element_size
    }

    /// Dimension lengths; empty for a scalar.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Number of dimensions.
    #[must_use]
    pub const fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements implied by the shape.
    #[must_use]
    pub fn count(&self) -> u64 {
        element_count(&self.shape)
    }

    /// Record members; empty for non-record descriptors.
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Looks a field up by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name() == name)
    }
}

/// Product of the dimension lengths, saturating; one for a scalar.
#[must_use]
pub fn element_count(shape: &[u64]) -> u64 {
    shape
        .iter()
        .fold(1_u64, |count, dimension| count.saturating_mul(*dimension))
}

/// Record layouts carried alongside a value, keyed by layout name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeTable {
    layouts: BTreeMap<String, TypeDescriptor>,
}

impl TypeTable {
    /// An empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            layouts: BTreeMap::new(),
        }
    }

    /// Adds or replaces a record layout.
    pub fn insert(&mut self, layout: TypeDescriptor) {
        self.layouts.insert(layout.name().to_owned(), layout);
    }

    /// Builder form of [`TypeTable::insert`].
    #[must_use]
    pub fn with(mut self, layout: TypeDescriptor) -> Self {
        self.insert(layout);
        self
    }

    /// Layout named `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TypeDescriptor> {
        self.layouts.get(name)
    }

    /// Layouts in name order.
    pub fn iter(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.layouts.values()
    }

    /// Number of layouts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    /// True when no layout is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}
