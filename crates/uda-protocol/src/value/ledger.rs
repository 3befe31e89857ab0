//! Arena that owns every node of one value graph.
//!
//! Nodes refer to each other by [`NodeId`], an index into the arena, so a
//! graph with shared or cyclic records is freed by dropping the arena. A
//! process-wide counter tracks live arena entries and is exposed through
//! [`outstanding_allocations`] for leak checks.

use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;

use super::node::Node;

static OUTSTANDING: AtomicUsize = AtomicUsize::new(0);

/// Number of arena entries currently alive in this process.
#[must_use]
pub fn outstanding_allocations() -> usize {
    OUTSTANDING.load(Ordering::Acquire)
}

/// Index of a node inside its [`AllocationLedger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in allocation order.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }

    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index)
    }
}

/// Failure to grow an arena.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    /// The allocator refused to reserve storage.
    #[error("unable to reserve storage for {requested} more entries")]
    OutOfMemory {
        /// Entries requested.
        requested: usize,
    },
}

/// Owns the nodes of one value graph.
#[derive(Debug, Default)]
pub struct AllocationLedger {
    nodes: Vec<Node>,
}

impl AllocationLedger {
    /// An empty arena.
    #[must_use]
    pub const fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Moves `node` into the arena and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::OutOfMemory`] when storage cannot be
    /// reserved; the arena is left unchanged.
    pub fn alloc(&mut self, node: Node) -> Result<NodeId, AllocationError> {
        self.nodes
            .try_reserve(1)
            .map_err(|_| AllocationError::OutOfMemory { requested: 1 })?;
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        OUTSTANDING.fetch_add(1, Ordering::AcqRel);
        Ok(id)
    }

    /// Node `id`, if it belongs to this arena.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Mutable node `id`, if it belongs to this arena.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    /// Number of nodes owned.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when nothing has been allocated.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes with their ids, in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (NodeId(index), node))
    }

    /// Frees every node at once. Equivalent to dropping the arena.
    pub fn release(self) {
        drop(self);
    }
}

impl Clone for AllocationLedger {
    fn clone(&self) -> Self {
        OUTSTANDING.fetch_add(self.nodes.len(), Ordering::AcqRel);
        Self {
            nodes: self.nodes.clone(),
        }
    }
}

impl Drop for AllocationLedger {
    fn drop(&mut self) {
        OUTSTANDING.fetch_sub(self.nodes.len(), Ordering::AcqRel);
    }
}
