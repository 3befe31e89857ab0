//! Registry of installed plugins and request resolution.
//!
//! The [`PluginRegistry`] is filled at startup and only read afterwards, so
//! workers share it behind an `Arc` without locking. Each entry pairs a
//! validated [`PluginDescriptor`] with its [`PluginInstance`], which carries
//! the instance's own once-only initialisation and its private result cache.

mod instance;

use std::sync::Arc;

use tracing::debug;
use uda_protocol::RequestModel;

use crate::descriptor::PluginDescriptor;
use crate::error::PluginError;
use crate::plugin::Plugin;

pub use self::instance::{DEFAULT_CACHE_CAPACITY, PluginInstance, SessionKey};

const REGISTRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::registry");

/// Registry of available plugins, in registration order.
#[derive(Default)]
pub struct PluginRegistry {
    instances: Vec<PluginInstance>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_list()
            .entries(self.instances.iter().map(PluginInstance::descriptor))
            .finish()
    }
}

impl PluginRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plugin after validating its descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Manifest`] if validation fails or a plugin with
    /// the same name (ignoring case) is already registered.
    pub fn register(
        &mut self,
        descriptor: PluginDescriptor,
        plugin: Arc<dyn Plugin>,
    ) -> Result<(), PluginError> {
        descriptor.validate()?;
        if self.get(descriptor.name()).is_some() {
            return Err(PluginError::Manifest {
                message: format!("plugin '{}' is already registered", descriptor.name()),
            });
        }
        debug!(
            target: REGISTRY_TARGET,
            plugin = descriptor.name(),
            class = %descriptor.class(),
            "registered plugin"
        );
        self.instances.push(PluginInstance::new(descriptor, plugin));
        Ok(())
    }

    /// Looks up a plugin by name, ignoring case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PluginInstance> {
        self.instances
            .iter()
            .find(|instance| instance.descriptor().matches_format(name))
    }

    /// Plugins registered for `format`.
    #[must_use]
    pub fn find_by_format(&self, format: &str) -> Vec<&PluginInstance> {
        self.filtered(|descriptor| descriptor.matches_format(format))
    }

    /// Plugins registered for `device`.
    #[must_use]
    pub fn find_by_device(&self, device: &str) -> Vec<&PluginInstance> {
        self.filtered(|descriptor| descriptor.matches_device(device))
    }

    /// Plugins claiming file `extension`.
    #[must_use]
    pub fn find_by_extension(&self, extension: &str) -> Vec<&PluginInstance> {
        self.filtered(|descriptor| descriptor.matches_extension(extension))
    }

    /// Resolves `request` to exactly one plugin.
    ///
    /// Matching is tried by format (the explicit format, else the target),
    /// then by device, then by file extension. The first stage with any
    /// match decides; more than one match at that stage is ambiguous.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NoPlugin`] when no stage matches and
    /// [`PluginError::Ambiguous`] when the deciding stage matches several
    /// plugins.
    pub fn resolve(&self, request: &RequestModel) -> Result<&PluginInstance, PluginError> {
        let extension = request.extension();
        let stages = [
            ("format", request.format_key().map(|format| self.find_by_format(format))),
            ("device", request.device().map(|device| self.find_by_device(device))),
            (
                "extension",
                extension.as_deref().map(|suffix| self.find_by_extension(suffix)),
            ),
        ];

        for (stage, matches) in stages {
            match matches.as_deref() {
                None | Some([]) => {}
                Some([only]) => {
                    debug!(
                        target: REGISTRY_TARGET,
                        stage,
                        plugin = only.descriptor().name(),
                        "resolved request"
                    );
                    return Ok(*only);
                }
                Some(several) => {
                    return Err(PluginError::Ambiguous {
                        request: describe(request),
                        stage,
                        candidates: several
                            .iter()
                            .map(|instance| instance.descriptor().name().to_owned())
                            .collect(),
                    });
                }
            }
        }
        Err(PluginError::NoPlugin {
            request: describe(request),
        })
    }

    /// Every registered plugin, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &PluginInstance> {
        self.instances.iter()
    }

    /// Every descriptor, in registration order.
    #[must_use]
    pub fn descriptors(&self) -> Arc<[PluginDescriptor]> {
        self.instances
            .iter()
            .map(|instance| instance.descriptor().clone())
            .collect()
    }

    /// Number of registered plugins.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.instances.len()
    }

    /// True when nothing is registered.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    fn filtered(&self, predicate: impl Fn(&PluginDescriptor) -> bool) -> Vec<&PluginInstance> {
        self.instances
            .iter()
            .filter(|instance| predicate(instance.descriptor()))
            .collect()
    }
}

/// Request text for error messages: the raw request, else the source.
fn describe(request: &RequestModel) -> String {
    if request.raw().is_empty() {
        request.source().to_owned()
    } else {
        request.raw().to_owned()
    }
}

#[cfg(test)]
mod tests;
