//! Decoded results keyed by integer handles.
//!
//! Handles count up from 0 for the life of the table and are never reused,
//! so a stale handle can only ever miss. Dropping an entry drops its value
//! and with it the value's allocation ledger.


use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;
use uda_protocol::{RequestModel, Value};

use crate::error::ClientError;

const HANDLES_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::handles");

/// Key of one retrieved result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(u64);

impl Handle {
    /// Wraps a raw handle number, e.g. one read back from a caller.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw handle number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// A result and the request that produced it.
#[derive(Debug, Clone)]
pub struct HandleEntry {
    value: Value,
    request: RequestModel,
}

impl HandleEntry {
    /// Decoded result.
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }

    /// Request that produced the result.
    #[must_use]
    pub const fn request(&self) -> &RequestModel {
        &self.request
    }
}

/// Table of live results.
#[derive(Debug, Default)]
pub struct HandleTable {
    next: u64,
    entries: BTreeMap<Handle, HandleEntry>,
}

impl HandleTable {
    /// An empty table whose first handle is 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` and returns its new handle.
    pub fn put(&mut self, value: Value, request: RequestModel) -> Handle {
        let handle = Handle(self.next);
        self.next = self.next.saturating_add(1);
        self.entries.insert(handle, HandleEntry { value, request });
        debug!(target: HANDLES_TARGET, %handle, "handle issued");
        handle
    }

    /// The entry behind `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UnknownHandle`] for a handle that was never
    /// issued or has been freed.
    pub fn get(&self, handle: Handle) -> Result<&HandleEntry, ClientError> {
        self.entries
            .get(&handle)
            .ok_or(ClientError::UnknownHandle { handle })
    }

    /// Releases `handle` and its value.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UnknownHandle`] when nothing is stored there.
    pub fn free(&mut self, handle: Handle) -> Result<(), ClientError> {
        self.entries
            .remove(&handle)
            .map(drop)
            .ok_or(ClientError::UnknownHandle { handle })?;
        debug!(target: HANDLES_TARGET, %handle, "handle freed");
        Ok(())
    }

    /// Releases every stored value. Returns how many were released.
    pub fn free_all(&mut self) -> usize {
        let entries = std::mem::take(&mut self.entries);
        let released = entries.len();
        drop(entries);
        if released > 0 {
            debug!(target: HANDLES_TARGET, released, "all handles freed");
        }
        released
    }

    /// Live handles in issue order.
    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.entries.keys().copied()
    }

    /// Number of live handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
