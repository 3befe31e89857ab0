//! Plugin registry and request dispatch for the `udad` server.
//!
//! Every data source the server can reach is a [`Plugin`] described by a
//! [`PluginDescriptor`]. The [`PluginRegistry`] owns one instance per
//! registered plugin and resolves each [`RequestModel`](uda_protocol::RequestModel)
//! to exactly one of them: by format or target name, then by device, then by
//! file extension.
//!
//! The [`Dispatcher`] drives a resolved call through its states, initialises
//! a plugin the first time it is needed, and consults the per-session result
//! cache of plugins that opt into one.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use uda_plugins::builtins::{builtin_catalogue, register_builtins};
//! use uda_plugins::{Dispatcher, PluginRegistry, SessionKey};
//! use uda_protocol::RequestModel;
//!
//! let mut registry = PluginRegistry::new();
//! register_builtins(&mut registry, &builtin_catalogue(Vec::new())).expect("builtins");
//!
//! let dispatcher = Dispatcher::new(Arc::new(registry));
//! let request = RequestModel::parse("HELP::ping()", "").expect("request");
//! let outcome = dispatcher.dispatch(SessionKey(1), &request, None).expect("ping");
//! assert_eq!(outcome.plugin, "HELP");
//! ```

pub mod builtins;
pub mod catalogue;
pub mod descriptor;
pub mod dispatcher;
pub mod error;
pub mod plugin;
pub mod registry;

#[cfg(test)]
mod tests;

pub use self::catalogue::{PluginCatalogue, PluginFactory, load_registry_file, parse_registry};
pub use self::descriptor::{CachePolicy, INTERFACE_VERSION, PluginClass, PluginDescriptor};
pub use self::dispatcher::{DispatchOutcome, DispatchState, Dispatcher};
pub use self::error::PluginError;
pub use self::plugin::{Plugin, PluginCall, PluginFailure, ResultSlot};
pub use self::registry::{DEFAULT_CACHE_CAPACITY, PluginInstance, PluginRegistry, SessionKey};
