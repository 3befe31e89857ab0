//! JSON description of a decoded value.

use serde::Serialize;
use uda_protocol::Value;

/// What `uda get` prints for a retrieved value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueSummary {
    /// Type name of the root, e.g. `uint8[]` or a record name.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Number of dimensions.
    pub rank: usize,
    /// Extent of each dimension.
    pub shape: Vec<u64>,
    /// Element count.
    pub count: u64,
    /// Label, when the plugin set one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Units, when the plugin set them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    /// Description, when the plugin set one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Handle the value is stored under.
    pub handle: u64,
}

impl ValueSummary {
    /// Summarises `value` stored under `handle`.
    #[must_use]
    pub fn new(value: &Value, handle: u64) -> Self {
        Self {
            type_name: value.kind().type_name(),
            rank: value.rank(),
            shape: value.shape().to_vec(),
            count: value.count(),
            label: value.label().map(str::to_owned),
            units: value.units().map(str::to_owned),
            description: value.description().map(str::to_owned),
            handle,
        }
    }
}
