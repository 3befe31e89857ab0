//! Plugins compiled into every server.
//!
//! `BYTES` reads whole files and `HELP` answers liveness and discovery
//! calls. Both are installed through the same catalogue a deployment's
//! registry file uses, so a registry file may also name them.

mod bytes;
mod help;

use std::sync::Arc;

use camino::Utf8PathBuf;

use crate::catalogue::PluginCatalogue;
use crate::descriptor::{PluginClass, PluginDescriptor};
use crate::error::PluginError;
use crate::plugin::Plugin;
use crate::registry::PluginRegistry;

pub use self::bytes::BytesPlugin;
pub use self::help::HelpPlugin;

pub(crate) const BUILTIN_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::builtins");

/// Catalogue entry of [`BytesPlugin`].
pub const BYTES_ENTRY: &str = "bytes";
/// Catalogue entry of [`HelpPlugin`].
pub const HELP_ENTRY: &str = "help";

/// A catalogue holding the built-in factories.
#[must_use]
pub fn builtin_catalogue(safe_roots: Vec<Utf8PathBuf>) -> PluginCatalogue {
    let roots: Arc<[Utf8PathBuf]> = Arc::from(safe_roots);
    PluginCatalogue::new()
        .with(BYTES_ENTRY, move || {
            Arc::new(BytesPlugin::new(roots.to_vec())) as Arc<dyn Plugin>
        })
        .with(HELP_ENTRY, || Arc::new(HelpPlugin) as Arc<dyn Plugin>)
}

/// Descriptors of the built-in plugins.
#[must_use]
pub fn builtin_descriptors() -> Vec<PluginDescriptor> {
    vec![
        PluginDescriptor::new("BYTES", PluginClass::File)
            .with_entry(BYTES_ENTRY)
            .with_extension("bytes")
            .with_description("Reads a file and returns its contents as unsigned bytes")
            .with_example("BYTES::read(path=/data/shot/file.dat)"),
        PluginDescriptor::new("HELP", PluginClass::Function)
            .with_entry(HELP_ENTRY)
            .with_description("Server liveness and service discovery")
            .with_example("HELP::services()"),
    ]
}

/// Registers `BYTES` and `HELP` using factories from `catalogue`.
///
/// # Errors
///
/// Fails when either name is already registered or the catalogue lacks an
/// entry.
pub fn register_builtins(
    registry: &mut PluginRegistry,
    catalogue: &PluginCatalogue,
) -> Result<(), PluginError> {
    registry.install(builtin_descriptors(), catalogue)
}

#[cfg(test)]
mod tests {
    use uda_protocol::RequestModel;

    use super::*;

    #[test]
    fn builtins_resolve_by_name_and_extension() {
        let mut registry = PluginRegistry::new();
        register_builtins(&mut registry, &builtin_catalogue(Vec::new())).expect("builtins");

        let by_name = RequestModel::parse("BYTES::read(path=/tmp/a.dat)", "").expect("parse");
        let by_extension = RequestModel::parse("data", "/tmp/capture.bytes").expect("parse");
        assert_eq!(registry.resolve(&by_name).expect("bytes").descriptor().name(), "BYTES");
        assert_eq!(registry.resolve(&by_extension).expect("bytes").descriptor().name(), "BYTES");
    }

    #[test]
    fn registering_twice_is_rejected() {
        let catalogue = builtin_catalogue(Vec::new());
        let mut registry = PluginRegistry::new();
        register_builtins(&mut registry, &catalogue).expect("first");
        assert!(register_builtins(&mut registry, &catalogue).is_err());
    }
}
