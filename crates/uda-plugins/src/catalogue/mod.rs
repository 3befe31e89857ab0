//! Statically linked plugin factories and the plugin registry file.
//!
//! Deployments list their plugins in a comma-separated registry file:
//!
//! ```text
//! # format, class, entry, library, extension, interface, cache, public, description, example
//! RAW, file, bytes, libbytes.so, raw, 1, N, Y, Raw byte reader, RAW::read(path=/tmp/x.raw)
//! ```
//!
//! The `entry` column names a factory in a [`PluginCatalogue`]; the library
//! column is informational only. Trailing columns after the description are
//! joined back together to form the example.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use camino::Utf8Path;
use tracing::{debug, info};

use crate::descriptor::{CachePolicy, INTERFACE_VERSION, PluginClass, PluginDescriptor};
use crate::error::PluginError;
use crate::plugin::Plugin;
use crate::registry::PluginRegistry;

const CATALOGUE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::catalogue");

/// Builds a plugin instance.
pub type PluginFactory = Box<dyn Fn() -> Arc<dyn Plugin> + Send + Sync>;

/// Named plugin factories available to the registry file.
#[derive(Default)]
pub struct PluginCatalogue {
    factories: BTreeMap<String, PluginFactory>,
}

impl fmt::Debug for PluginCatalogue {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_set()
            .entries(self.factories.keys())
            .finish()
    }
}

impl PluginCatalogue {
    /// An empty catalogue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the factory for `entry`, matched ignoring case.
    pub fn insert(
        &mut self,
        entry: &str,
        factory: impl Fn() -> Arc<dyn Plugin> + Send + Sync + 'static,
    ) {
        self.factories
            .insert(entry.to_ascii_lowercase(), Box::new(factory));
    }

    /// Builder form of [`PluginCatalogue::insert`].
    #[must_use]
    pub fn with(
        mut self,
        entry: &str,
        factory: impl Fn() -> Arc<dyn Plugin> + Send + Sync + 'static,
    ) -> Self {
        self.insert(entry, factory);
        self
    }

    /// True when `entry` has a factory.
    #[must_use]
    pub fn contains(&self, entry: &str) -> bool {
        self.factories.contains_key(&entry.to_ascii_lowercase())
    }

    /// Builds a fresh instance for `entry`.
    #[must_use]
    pub fn build(&self, entry: &str) -> Option<Arc<dyn Plugin>> {
        self.factories
            .get(&entry.to_ascii_lowercase())
            .map(|factory| factory())
    }

    /// Factory names, sorted.
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

/// Parses registry file text into descriptors, in file order.
///
/// # Errors
///
/// Returns [`PluginError::Manifest`] naming the line of the first malformed
/// entry.
pub fn parse_registry(text: &str) -> Result<Vec<PluginDescriptor>, PluginError> {
    let mut descriptors = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let content = line.trim();
        if content.is_empty() || content.starts_with('#') {
            continue;
        }
        let descriptor = parse_line(content).map_err(|message| PluginError::Manifest {
            message: format!("plugin registry line {}: {message}", index + 1),
        })?;
        descriptors.push(descriptor);
    }
    Ok(descriptors)
}

/// Reads and parses a registry file.
///
/// # Errors
///
/// Returns [`PluginError::Io`] when the file cannot be read and
/// [`PluginError::Manifest`] when an entry is malformed.
pub fn load_registry_file(path: &Utf8Path) -> Result<Vec<PluginDescriptor>, PluginError> {
    let text = std::fs::read_to_string(path).map_err(|error| PluginError::Io {
        path: path.to_owned(),
        source: Arc::new(error),
    })?;
    let descriptors = parse_registry(&text)?;
    info!(
        target: CATALOGUE_TARGET,
        path = %path,
        entries = descriptors.len(),
        "loaded plugin registry"
    );
    Ok(descriptors)
}

impl PluginRegistry {
    /// Registers each descriptor with an instance built from `catalogue`.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Manifest`] for an entry with no factory, an
    /// invalid descriptor, or a duplicate name.
    pub fn install(
        &mut self,
        descriptors: Vec<PluginDescriptor>,
        catalogue: &PluginCatalogue,
    ) -> Result<(), PluginError> {
        for descriptor in descriptors {
            let plugin = catalogue.build(descriptor.entry()).ok_or_else(|| {
                PluginError::Manifest {
                    message: format!(
                        "plugin '{}' names unknown entry point '{}'",
                        descriptor.name(),
                        descriptor.entry()
                    ),
                }
            })?;
            debug!(
                target: CATALOGUE_TARGET,
                plugin = descriptor.name(),
                entry = descriptor.entry(),
                "installing plugin"
            );
            self.register(descriptor, plugin)?;
        }
        Ok(())
    }
}

fn parse_line(line: &str) -> Result<PluginDescriptor, String> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let field = |index: usize| fields.get(index).copied().unwrap_or_default();

    let format = field(0);
    let class_text = field(1);
    let entry = field(2);
    if format.is_empty() || class_text.is_empty() || entry.is_empty() {
        return Err(String::from("format, class and entry are required"));
    }
    let class =
        PluginClass::from_str(class_text).map_err(|_| format!("unknown plugin class '{class_text}'"))?;

    let mut descriptor = PluginDescriptor::new(format, class).with_entry(entry);
    if !field(3).is_empty() {
        descriptor = descriptor.with_library(field(3));
    }
    for extension in field(4).split_whitespace() {
        descriptor = descriptor.with_extension(extension);
    }
    let interface = field(5);
    let version = if interface.is_empty() {
        INTERFACE_VERSION
    } else {
        interface
            .parse()
            .map_err(|_| format!("invalid interface version '{interface}'"))?
    };
    descriptor = descriptor.with_interface_version(version);
    if flag(field(6)).unwrap_or(false) {
        descriptor = descriptor.with_cache(CachePolicy::Ok);
    }
    if !flag(field(7)).unwrap_or(true) {
        descriptor = descriptor.private();
    }
    descriptor = descriptor.with_description(field(8));
    let example = fields.get(9..).map(|rest| rest.join(",")).unwrap_or_default();
    Ok(descriptor.with_example(example))
}

/// Registry-file boolean: `Y`, `T` or `1` is true, other text false, an
/// empty column unset.
fn flag(text: &str) -> Option<bool> {
    if text.is_empty() {
        return None;
    }
    Some(matches!(text, "Y" | "y" | "T" | "t" | "1"))
}

#[cfg(test)]
mod tests;
