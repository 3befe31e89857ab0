//! Plugin descriptors: identity, lookup keys, and policy of one plugin.
//!
//! A [`PluginDescriptor`] is built at startup, validated on registration, and
//! never changes afterwards. The registry looks plugins up by the
//! descriptor's format name, device name, or file extensions.

use strum::{AsRefStr, Display, EnumString};

use crate::error::PluginError;

/// Version of the plugin call contract implemented by this crate.
pub const INTERFACE_VERSION: u32 = 1;

/// Broad category of a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PluginClass {
    /// Reads a data file format.
    #[default]
    File,
    /// Forwards requests to another data server.
    Server,
    /// Computes results from its arguments.
    Function,
    /// Fronts a named remote device.
    Device,
    /// Anything else.
    Other,
}

/// Whether the dispatcher may reuse a plugin's results within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CachePolicy {
    /// Every request invokes the plugin.
    #[default]
    None,
    /// Successful results are cached per session and request.
    Ok,
}

/// Declarative description of an installed plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDescriptor {
    name: String,
    version: String,
    class: PluginClass,
    device: Option<String>,
    extensions: Vec<String>,
    entry: String,
    library: Option<String>,
    cache: CachePolicy,
    is_private: bool,
    description: String,
    example: String,
    interface_version: u32,
}

impl PluginDescriptor {
    /// A public, uncached descriptor whose entry point is the lower-cased name.
    #[must_use]
    pub fn new(name: impl Into<String>, class: PluginClass) -> Self {
        let format = name.into();
        let entry = format.to_ascii_lowercase();
        Self {
            name: format,
            version: String::from(env!("CARGO_PKG_VERSION")),
            class,
            device: None,
            extensions: Vec::new(),
            entry,
            library: None,
            cache: CachePolicy::None,
            is_private: false,
            description: String::new(),
            example: String::new(),
            interface_version: INTERFACE_VERSION,
        }
    }

    /// Sets the plugin version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Routes requests for `device` to this plugin.
    #[must_use]
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Adds a file extension, without the leading dot.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        let text = extension.into();
        self.extensions
            .push(text.trim_start_matches('.').to_ascii_lowercase());
        self
    }

    /// Names the catalogue factory that builds the plugin.
    #[must_use]
    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = entry.into();
        self
    }

    /// Records the library the plugin came from, for listings.
    #[must_use]
    pub fn with_library(mut self, library: impl Into<String>) -> Self {
        self.library = Some(library.into());
        self
    }

    /// Sets the cache policy.
    #[must_use]
    pub const fn with_cache(mut self, cache: CachePolicy) -> Self {
        self.cache = cache;
        self
    }

    /// Hides the plugin from service listings.
    #[must_use]
    pub const fn private(mut self) -> Self {
        self.is_private = true;
        self
    }

    /// Sets the one-line description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the usage example.
    #[must_use]
    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example = example.into();
        self
    }

    /// Declares the call-contract version the plugin was written against.
    #[must_use]
    pub const fn with_interface_version(mut self, version: u32) -> Self {
        self.interface_version = version;
        self
    }

    /// Validates the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Manifest`] when the name is empty or not a
    /// request identifier, or when the interface version is newer than this
    /// crate supports.
    pub fn validate(&self) -> Result<(), PluginError> {
        if self.name.trim().is_empty() {
            return Err(PluginError::Manifest {
                message: String::from("plugin name must not be empty"),
            });
        }
        if !self
            .name
            .chars()
            .all(|character| character.is_ascii_alphanumeric() || matches!(character, '_' | '-'))
        {
            return Err(PluginError::Manifest {
                message: format!("plugin name '{}' is not a valid identifier", self.name),
            });
        }
        if self.interface_version == 0 || self.interface_version > INTERFACE_VERSION {
            return Err(PluginError::Manifest {
                message: format!(
                    "plugin '{}' targets interface version {}, supported up to {INTERFACE_VERSION}",
                    self.name, self.interface_version
                ),
            });
        }
        Ok(())
    }

    /// Format name; requests address the plugin by it.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Plugin version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Plugin category.
    #[must_use]
    pub const fn class(&self) -> PluginClass {
        self.class
    }

    /// Device name routed to this plugin.
    #[must_use]
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    /// Lower-cased file extensions handled by this plugin.
    #[must_use]
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Catalogue factory name.
    #[must_use]
    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Source library, when recorded.
    #[must_use]
    pub fn library(&self) -> Option<&str> {
        self.library.as_deref()
    }

    /// Cache policy.
    #[must_use]
    pub const fn cache(&self) -> CachePolicy {
        self.cache
    }

    /// True when hidden from service listings.
    #[must_use]
    pub const fn is_private(&self) -> bool {
        self.is_private
    }

    /// One-line description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Usage example.
    #[must_use]
    pub fn example(&self) -> &str {
        &self.example
    }

    /// Call-contract version.
    #[must_use]
    pub const fn interface_version(&self) -> u32 {
        self.interface_version
    }

    /// True when `format` names this plugin.
    #[must_use]
    pub fn matches_format(&self, format: &str) -> bool {
        self.name.eq_ignore_ascii_case(format)
    }

    /// True when `device` is routed to this plugin.
    #[must_use]
    pub fn matches_device(&self, device: &str) -> bool {
        self.device
            .as_deref()
            .is_some_and(|own| own.eq_ignore_ascii_case(device))
    }

    /// True when the plugin claims `extension`.
    #[must_use]
    pub fn matches_extension(&self, extension: &str) -> bool {
        self.extensions
            .iter()
            .any(|own| own.eq_ignore_ascii_case(extension))
    }
}

#[cfg(test)]
mod tests;
