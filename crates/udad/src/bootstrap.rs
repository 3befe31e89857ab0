//! Server bootstrap orchestration.

use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;
use tracing::info;

use uda_config::Config;
use uda_plugins::builtins::{builtin_catalogue, register_builtins};
use uda_plugins::{Dispatcher, PluginError, PluginRegistry, load_registry_file};

use crate::session::SessionHandler;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};
use crate::transport::{ListenerError, ListenerHandle, SocketListener};

const BOOTSTRAP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::bootstrap");

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the server configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to `Config::load`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader returning a fixed configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The plugin registry could not be built.
    #[error("failed to build the plugin registry: {source}")]
    Plugins {
        /// Registry or registry-file error.
        #[source]
        source: PluginError,
    },
}

/// A configured server, ready to listen.
#[derive(Debug)]
pub struct Server {
    config: Config,
    dispatcher: Arc<Dispatcher>,
    telemetry: TelemetryHandle,
}

impl Server {
    /// Resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Dispatcher shared by every session.
    #[must_use]
    pub const fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Telemetry handle, mainly for tests.
    #[must_use]
    pub const fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Binds the listen address and starts accepting sessions.
    ///
    /// # Errors
    ///
    /// Fails when the address cannot be resolved or bound.
    pub fn start(&self) -> Result<ListenerHandle, ListenerError> {
        let listener = SocketListener::bind(self.config.listen_address())?;
        let handler = Arc::new(SessionHandler::new(Arc::clone(&self.dispatcher)));
        let handle = listener.start(handler)?;
        info!(
            target: BOOTSTRAP_TARGET,
            address = %handle.local_addr(),
            "server accepting sessions"
        );
        Ok(handle)
    }
}

/// Bootstraps the server using the supplied configuration loader.
///
/// # Errors
///
/// Fails when configuration, telemetry, or the plugin registry cannot be set
/// up.
pub fn bootstrap_with(loader: &dyn ConfigLoader) -> Result<Server, BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    let telemetry =
        telemetry::initialise(&config).map_err(|source| BootstrapError::Telemetry { source })?;
    let registry = build_registry(&config).map_err(|source| BootstrapError::Plugins { source })?;
    info!(
        target: BOOTSTRAP_TARGET,
        plugins = registry.len(),
        "plugin registry ready"
    );
    Ok(Server {
        config,
        dispatcher: Arc::new(Dispatcher::new(Arc::new(registry))),
        telemetry,
    })
}

/// Registers the built-in plugins, then every plugin in the configured
/// registry file.
///
/// # Errors
///
/// Fails when the registry file cannot be read or names an unknown entry,
/// or when two plugins share a name.
pub fn build_registry(config: &Config) -> Result<PluginRegistry, PluginError> {
    let catalogue = builtin_catalogue(config.safe_paths());
    let mut registry = PluginRegistry::new();
    register_builtins(&mut registry, &catalogue)?;
    if let Some(path) = config.plugin_config() {
        let descriptors = load_registry_file(path)?;
        registry.install(descriptors, &catalogue)?;
    }
    Ok(registry)
}
