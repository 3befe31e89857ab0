//! The uniform call contract every plugin implements.
//!
//! The dispatcher hands a plugin a [`PluginCall`] and an empty
//! [`ResultSlot`]. The plugin fills the slot (or leaves it empty for calls
//! that only acknowledge) and returns `Ok(())`, or returns a
//! [`PluginFailure`]. Whatever a failing plugin left in the slot is dropped
//! with the slot, so a failed call never hands partial results to the caller.

use std::sync::Arc;

use thiserror::Error;
use uda_protocol::{RequestModel, StatusCode, Value};

use crate::descriptor::PluginDescriptor;

/// Failure reported by a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PluginFailure {
    /// Status code within the dispatch range.
    pub code: StatusCode,
    /// Human-readable description.
    pub message: String,
}

impl PluginFailure {
    /// A generic plugin failure.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            code: StatusCode::PLUGIN_FAILED,
            message: message.into(),
        }
    }

    /// A refusal to touch a resource.
    #[must_use]
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self {
            code: StatusCode::ACCESS_DENIED,
            message: message.into(),
        }
    }

    /// The plugin has no such function.
    #[must_use]
    pub fn unsupported(plugin: &str, function: &str) -> Self {
        Self {
            code: StatusCode::UNSUPPORTED_OPERATION,
            message: format!("{plugin} has no function '{function}'"),
        }
    }
}

/// Everything a plugin sees of one call.
#[derive(Debug, Clone)]
pub struct PluginCall {
    /// Parsed request.
    pub request: RequestModel,
    /// Payload of a `put`; `None` for `get`.
    pub data: Option<Value>,
    /// Every registered descriptor, in registration order.
    pub services: Arc<[PluginDescriptor]>,
}

impl PluginCall {
    /// Function name, or the empty string for legacy signal requests.
    #[must_use]
    pub fn function(&self) -> &str {
        self.request.function().unwrap_or_default()
    }
}

/// Where a plugin leaves its result.
#[derive(Debug, Default)]
pub struct ResultSlot {
    value: Option<Value>,
}

impl ResultSlot {
    /// An empty slot.
    #[must_use]
    pub const fn new() -> Self {
        Self { value: None }
    }

    /// Stores the result, replacing any earlier one.
    pub fn set(&mut self, value: Value) {
        self.value = Some(value);
    }

    /// True until a result is stored.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    /// Removes the result.
    pub const fn take(&mut self) -> Option<Value> {
        self.value.take()
    }
}

/// A data-source plugin.
///
/// Implementations must be shareable across worker threads; any state that
/// survives between calls needs its own synchronisation.
pub trait Plugin: Send + Sync {
    /// One-time setup, run by the dispatcher before the first call.
    ///
    /// # Errors
    ///
    /// A failure here is remembered; the plugin is never invoked.
    fn init(&self) -> Result<(), PluginFailure> {
        Ok(())
    }

    /// Serves one call.
    ///
    /// # Errors
    ///
    /// Returns a [`PluginFailure`] describing why the call failed.
    fn invoke(&self, call: &PluginCall, slot: &mut ResultSlot) -> Result<(), PluginFailure>;

    /// Releases plugin state before shutdown.
    fn reset(&self) {}
}
