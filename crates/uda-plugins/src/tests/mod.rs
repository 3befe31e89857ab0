//! Shared doubles and crate-level behaviour tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use mockall::mock;
use uda_protocol::Value;

use crate::descriptor::{PluginClass, PluginDescriptor};
use crate::plugin::{Plugin, PluginCall, PluginFailure, ResultSlot};
use crate::registry::PluginRegistry;

mod behaviour;

mock! {
    pub Source {}

    impl Plugin for Source {
        fn init(&self) -> Result<(), PluginFailure>;
        fn invoke(&self, call: &PluginCall, slot: &mut ResultSlot) -> Result<(), PluginFailure>;
        fn reset(&self);
    }
}

/// Answers every call with its own name and counts invocations.
#[derive(Debug)]
pub(crate) struct NamedPlugin {
    pub(crate) name: String,
    pub(crate) calls: AtomicUsize,
}

impl NamedPlugin {
    pub(crate) fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_owned(),
            calls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Plugin for NamedPlugin {
    fn invoke(&self, _call: &PluginCall, slot: &mut ResultSlot) -> Result<(), PluginFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        slot.set(Value::text(self.name.clone()).map_err(|error| PluginFailure::failed(error.to_string()))?);
        Ok(())
    }
}

/// Registers a named file plugin claiming `extension`.
pub(crate) fn register_named(registry: &mut PluginRegistry, name: &str, extension: Option<&str>) {
    let mut descriptor = PluginDescriptor::new(name, PluginClass::File);
    if let Some(suffix) = extension {
        descriptor = descriptor.with_extension(suffix);
    }
    registry
        .register(descriptor, NamedPlugin::new(name))
        .expect("register plugin");
}

/// Name carried by a value produced by [`NamedPlugin`].
pub(crate) fn produced_by(value: &Value) -> String {
    value
        .as_text()
        .and_then(|lines| lines.first())
        .cloned()
        .expect("text value")
}
