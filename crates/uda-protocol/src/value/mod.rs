//! Self-describing values and the arena that owns them.
//!
//! A [`Value`] pairs a [`TypeTable`] of record layouts with an
//! [`AllocationLedger`] holding every node of its graph. Records may share
//! children or refer back to an ancestor; dropping the value drops the arena
//! and with it the whole graph.

mod ledger;
mod node;

use std::collections::HashMap;

use thiserror::Error;

use crate::types::{Primitive, TypeDescriptor, TypeKind, TypeTable, element_count};

pub use self::ledger::{AllocationError, AllocationLedger, NodeId, outstanding_allocations};
pub use self::node::{ArrayData, Node, NodeData, RecordData};

/// Ways a node graph can disagree with its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// A node refers to an id outside the arena.
    #[error("node {parent} refers to missing node {child}")]
    DanglingNode {
        /// Referring node.
        parent: usize,
        /// Missing id.
        child: usize,
    },
    /// The root id is outside the arena.
    #[error("root node {root} is missing")]
    MissingRoot {
        /// Requested root.
        root: usize,
    },
    /// A record names a layout absent from the type table.
    #[error("record layout '{layout}' is not described")]
    UnknownLayout {
        /// Layout name.
        layout: String,
    },
    /// A record has a different number of fields than its layout.
    #[error("record '{layout}' has {found} fields but its layout declares {expected}")]
    FieldCount {
        /// Layout name.
        layout: String,
        /// Fields in the layout.
        expected: usize,
        /// Fields in the record.
        found: usize,
    },
    /// A record field holds a node of the wrong kind.
    #[error("field '{layout}.{field}' expects {expected} but holds {found}")]
    FieldKind {
        /// Layout name.
        layout: String,
        /// Field name.
        field: String,
        /// Kind declared by the layout.
        expected: TypeKind,
        /// Kind of the stored node.
        found: TypeKind,
    },
    /// A node's element count disagrees with its shape.
    #[error("node {node} declares {declared} elements but stores {stored}")]
    ShapeMismatch {
        /// Offending node.
        node: usize,
        /// Count implied by the shape.
        declared: u64,
        /// Elements present.
        stored: usize,
    },
    /// The per-element error array does not match the root's element count.
    #[error("error array holds {found} elements but the value holds {expected}")]
    ErrorShape {
        /// Root element count.
        expected: u64,
        /// Error array length.
        found: usize,
    },
    /// The arena could not grow.
    #[error(transparent)]
    Allocation(#[from] AllocationError),
}

/// A decoded or plugin-produced result.
#[derive(Debug, Clone)]
pub struct Value {
    types: TypeTable,
    ledger: AllocationLedger,
    root: NodeId,
    errors: Option<ArrayData>,
    label: Option<String>,
    units: Option<String>,
    description: Option<String>,
}

impl Value {
    /// Assembles a value after checking the graph against `types`.
    ///
    /// # Errors
    ///
    /// Returns a [`ValueError`] describing the first inconsistency found.
    pub fn new(types: TypeTable, ledger: AllocationLedger, root: NodeId) -> Result<Self, ValueError> {
        validate(&types, &ledger, root)?;
        Ok(Self {
            types,
            ledger,
            root,
            errors: None,
            label: None,
            units: None,
            description: None,
        })
    }

    /// A value consisting of one node with no record layouts.
    ///
    /// # Errors
    ///
    /// Fails when the node's shape disagrees with its payload, when it is a
    /// record or list, or when the arena cannot grow.
    pub fn from_node(node: Node) -> Result<Self, ValueError> {
        let mut ledger = AllocationLedger::new();
        let root = ledger.alloc(node)?;
        Self::new(TypeTable::new(), ledger, root)
    }

    /// A one-dimensional numeric array.
    ///
    /// # Errors
    ///
    /// Fails only when the arena cannot grow.
    pub fn array(data: ArrayData) -> Result<Self, ValueError> {
        Self::from_node(Node::array(data))
    }

    /// A one-dimensional unsigned byte array.
    ///
    /// # Errors
    ///
    /// Fails only when the arena cannot grow.
    pub fn bytes(bytes: Vec<u8>) -> Result<Self, ValueError> {
        Self::array(ArrayData::UInt8(bytes))
    }

    /// A single string.
    ///
    /// # Errors
    ///
    /// Fails only when the arena cannot grow.
    pub fn text(text: impl Into<String>) -> Result<Self, ValueError> {
        Self::from_node(Node::string(text))
    }

    /// Attaches a label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Attaches a unit string.
    #[must_use]
    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    /// Attaches a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attaches per-element uncertainties.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::ErrorShape`] when `errors` does not hold one
    /// element per root element.
    pub fn with_errors(mut self, errors: ArrayData) -> Result<Self, ValueError> {
        let expected = self.count();
        let matches = u64::try_from(errors.len()).is_ok_and(|found| found == expected);
        if !matches {
            return Err(ValueError::ErrorShape {
                expected,
                found: errors.len(),
            });
        }
        self.errors = Some(errors);
        Ok(self)
    }

    pub(crate) fn set_metadata(
        &mut self,
        label: Option<String>,
        units: Option<String>,
        description: Option<String>,
    ) {
        self.label = label;
        self.units = units;
        self.description = description;
    }

    /// Record layouts referenced by the graph.
    #[must_use]
    pub const fn types(&self) -> &TypeTable {
        &self.types
    }

    /// Arena owning the graph.
    #[must_use]
    pub const fn ledger(&self) -> &AllocationLedger {
        &self.ledger
    }

    /// Id of the root node.
    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    /// The root node.
    #[must_use]
    pub fn root_node(&self) -> &Node {
        // `new` has already checked that the root exists.
        self.ledger
            .get(self.root)
            .unwrap_or_else(|| unreachable_root())
    }

    /// Node `id` of this value's graph.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.ledger.get(id)
    }

    /// Descriptor of the root.
    #[must_use]
    pub fn descriptor(&self) -> TypeDescriptor {
        self.root_node().descriptor()
    }

    /// Root kind.
    #[must_use]
    pub fn kind(&self) -> TypeKind {
        self.root_node().kind()
    }

    /// Root rank.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.root_node().shape().len()
    }

    /// Root shape.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        self.root_node().shape()
    }

    /// Root element count.
    #[must_use]
    pub fn count(&self) -> u64 {
        element_count(self.root_node().shape())
    }

    /// Label, if any.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Units, if any.
    #[must_use]
    pub fn units(&self) -> Option<&str> {
        self.units.as_deref()
    }

    /// Description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Per-element uncertainties, if any.
    #[must_use]
    pub const fn errors(&self) -> Option<&ArrayData> {
        self.errors.as_ref()
    }

    /// The root array, when the root is atomic.
    #[must_use]
    pub fn as_array(&self) -> Option<&ArrayData> {
        match self.root_node().data() {
            NodeData::Atomic(array) => Some(array),
            _ => None,
        }
    }

    /// The root strings, when the root is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&[String]> {
        match self.root_node().data() {
            NodeData::Text(items) => Some(items),
            _ => None,
        }
    }

    /// The root bytes, when the root is a blob.
    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        match self.root_node().data() {
            NodeData::Blob(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Root array converted to `target`.
    #[must_use]
    pub fn cast(&self, target: Primitive) -> Option<ArrayData> {
        self.as_array().map(|array| array.cast(target))
    }

    /// Root payload in canonical byte order: array elements big-endian,
    /// blob bytes as stored, text as UTF-8 joined with NUL separators.
    #[must_use]
    pub fn raw_bytes(&self) -> Option<Vec<u8>> {
        match self.root_node().data() {
            NodeData::Atomic(array) => Some(array.to_be_bytes()),
            NodeData::Blob(bytes) => Some(bytes.clone()),
            NodeData::Text(items) => Some(items.join("\0").into_bytes()),
            NodeData::Record(_) | NodeData::List(_) => None,
        }
    }

    /// Child stored in field `name` of the root record.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Node> {
        self.record_field(self.root, name)
    }

    /// Child stored in field `name` of record `record`.
    #[must_use]
    pub fn record_field(&self, record: NodeId, name: &str) -> Option<&Node> {
        let NodeData::Record(data) = self.ledger.get(record)?.data() else {
            return None;
        };
        let layout = self.types.get(data.layout())?;
        let index = layout.fields().iter().position(|field| field.name() == name)?;
        self.ledger.get(data.field(index)?)
    }

    /// Number of arena entries owned by this value.
    #[must_use]
    pub const fn allocation_count(&self) -> usize {
        self.ledger.len()
    }
}

fn unreachable_root() -> ! {
    panic!("value root validated at construction is missing")
}

fn validate(types: &TypeTable, ledger: &AllocationLedger, root: NodeId) -> Result<(), ValueError> {
    if ledger.get(root).is_none() {
        return Err(ValueError::MissingRoot { root: root.index() });
    }
    for (id, node) in ledger.iter() {
        validate_shape(id, node)?;
        for child in node.children() {
            if ledger.get(child).is_none() {
                return Err(ValueError::DanglingNode {
                    parent: id.index(),
                    child: child.index(),
                });
            }
        }
        if let NodeData::Record(record) = node.data() {
            validate_record(types, ledger, record)?;
        }
    }
    Ok(())
}

fn validate_shape(id: NodeId, node: &Node) -> Result<(), ValueError> {
    if matches!(node.data(), NodeData::Record(_)) {
        return Ok(());
    }
    let declared = element_count(node.shape());
    let stored = node.stored_len();
    if u64::try_from(stored).is_ok_and(|count| count == declared) {
        Ok(())
    } else {
        Err(ValueError::ShapeMismatch {
            node: id.index(),
            declared,
            stored,
        })
    }
}

fn validate_record(
    types: &TypeTable,
    ledger: &AllocationLedger,
    record: &RecordData,
) -> Result<(), ValueError> {
    let layout = types
        .get(record.layout())
        .ok_or_else(|| ValueError::UnknownLayout {
            layout: record.layout().to_owned(),
        })?;
    if layout.fields().len() != record.fields().len() {
        return Err(ValueError::FieldCount {
            layout: record.layout().to_owned(),
            expected: layout.fields().len(),
            found: record.fields().len(),
        });
    }
    for (field, slot) in layout.fields().iter().zip(record.fields()) {
        let Some(child) = slot.and_then(|id| ledger.get(id)) else {
            continue;
        };
        let found = child.kind();
        let compatible = match field.kind() {
            TypeKind::List => true,
            expected => *expected == found,
        };
        if !compatible {
            return Err(ValueError::FieldKind {
                layout: record.layout().to_owned(),
                field: field.name().to_owned(),
                expected: field.kind().clone(),
                found,
            });
        }
    }
    Ok(())
}

impl PartialEq for Value {
    /// Structural equality: same metadata, same layouts, and graphs that are
    /// isomorphic from the root, sharing included.
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label
            && self.units == other.units
            && self.description == other.description
            && self.errors == other.errors
            && self.types == other.types
            && graphs_match(&self.ledger, self.root, &other.ledger, other.root)
    }
}

fn graphs_match(
    left: &AllocationLedger,
    left_root: NodeId,
    right: &AllocationLedger,
    right_root: NodeId,
) -> bool {
    let mut forward: HashMap<NodeId, NodeId> = HashMap::new();
    let mut backward: HashMap<NodeId, NodeId> = HashMap::new();
    let mut pending = vec![(left_root, right_root)];

    while let Some((left_id, right_id)) = pending.pop() {
        match (forward.get(&left_id), backward.get(&right_id)) {
            (Some(mapped), _) if *mapped != right_id => return false,
            (_, Some(mapped)) if *mapped != left_id => return false,
            (Some(_), Some(_)) => continue,
            _ => {}
        }
        forward.insert(left_id, right_id);
        backward.insert(right_id, left_id);

        let (Some(left_node), Some(right_node)) = (left.get(left_id), right.get(right_id)) else {
            return false;
        };
        if left_node.shape() != right_node.shape() {
            return false;
        }
        match (left_node.data(), right_node.data()) {
            (NodeData::Record(left_record), NodeData::Record(right_record)) => {
                if left_record.layout() != right_record.layout()
                    || left_record.fields().len() != right_record.fields().len()
                {
                    return false;
                }
                for (left_field, right_field) in left_record.fields().iter().zip(right_record.fields()) {
                    match (left_field, right_field) {
                        (Some(left_child), Some(right_child)) => {
                            pending.push((*left_child, *right_child));
                        }
                        (None, None) => {}
                        _ => return false,
                    }
                }
            }
            (NodeData::List(left_children), NodeData::List(right_children)) => {
                if left_children.len() != right_children.len() {
                    return false;
                }
                pending.extend(left_children.iter().copied().zip(right_children.iter().copied()));
            }
            (left_data, right_data) => {
                if left_data != right_data {
                    return false;
                }
            }
        }
    }
    true
}

#[cfg(test)]
mod tests;
