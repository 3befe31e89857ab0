//! Dispatch of parsed requests to plugins.
//!
//! Every call walks the same states:
//!
//! ```text
//! Unresolved -> Resolved -> Invoked -> Returned
//!          \            \          \-> Failed
//!           \            \-> Failed (init)
//!            \-> Failed (no match / ambiguous)
//! ```
//!
//! Resolution failures are terminal for the call and never retried. A
//! plugin's result cache is consulted between `Resolved` and `Invoked` only
//! when the plugin opted in through its descriptor.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use strum::Display;
use tracing::{debug, info, warn};
use uda_protocol::{RequestModel, Value};

use crate::descriptor::PluginDescriptor;
use crate::error::PluginError;
use crate::plugin::{PluginCall, ResultSlot};
use crate::registry::{PluginInstance, PluginRegistry, SessionKey};

const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Stage a call has reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum DispatchState {
    /// The request has not been matched to a plugin.
    Unresolved,
    /// Exactly one plugin matched.
    Resolved,
    /// The plugin is running.
    Invoked,
    /// The plugin returned successfully.
    Returned,
    /// Resolution, initialisation, or the plugin failed.
    Failed,
}

/// Result of one dispatched call.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    /// Name of the plugin that served the call.
    pub plugin: String,
    /// Data produced, if any.
    pub value: Option<Value>,
    /// True when the value came from the plugin's cache.
    pub from_cache: bool,
}

/// Routes requests to registered plugins.
pub struct Dispatcher {
    registry: Arc<PluginRegistry>,
    services: Arc<[PluginDescriptor]>,
    housekept: AtomicBool,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Dispatcher")
            .field("plugins", &self.registry.len())
            .field("housekept", &self.housekept.load(Ordering::Acquire))
            .finish()
    }
}

impl Dispatcher {
    /// Wraps a fully populated registry.
    #[must_use]
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        let services = registry.descriptors();
        Self {
            registry,
            services,
            housekept: AtomicBool::new(false),
        }
    }

    /// The registry being dispatched against.
    #[must_use]
    pub const fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Serves one call for `session`.
    ///
    /// `data` carries the payload of a `put`; calls with data are never
    /// answered from the cache.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NoPlugin`] or [`PluginError::Ambiguous`] when
    /// resolution fails, [`PluginError::InitFailed`] when the plugin's
    /// initialisation failed, and [`PluginError::Failed`] when the plugin
    /// reports a failure.
    pub fn dispatch(
        &self,
        session: SessionKey,
        request: &RequestModel,
        data: Option<Value>,
    ) -> Result<DispatchOutcome, PluginError> {
        let mut state = DispatchState::Unresolved;
        let instance = match self.registry.resolve(request) {
            Ok(instance) => instance,
            Err(error) => {
                transition(&mut state, DispatchState::Failed, "-");
                return Err(error);
            }
        };
        let name = instance.descriptor().name();
        transition(&mut state, DispatchState::Resolved, name);

        if let Err(failure) = instance.ensure_initialised() {
            transition(&mut state, DispatchState::Failed, name);
            return Err(PluginError::InitFailed {
                plugin: name.to_owned(),
                message: failure.message,
            });
        }

        let cacheable = data.is_none();
        if cacheable && let Some(value) = instance.cached(session, request) {
            debug!(target: DISPATCH_TARGET, plugin = name, "served from cache");
            transition(&mut state, DispatchState::Returned, name);
            return Ok(DispatchOutcome {
                plugin: name.to_owned(),
                value: Some(value),
                from_cache: true,
            });
        }

        transition(&mut state, DispatchState::Invoked, name);
        let value = self.invoke(instance, request, data).inspect_err(|_| {
            transition(&mut state, DispatchState::Failed, name);
        })?;
        if cacheable && let Some(result) = value.as_ref() {
            instance.store(session, request, result);
        }
        transition(&mut state, DispatchState::Returned, name);
        Ok(DispatchOutcome {
            plugin: name.to_owned(),
            value,
            from_cache: false,
        })
    }

    /// Drops every cached result belonging to `session`.
    pub fn end_session(&self, session: SessionKey) {
        for instance in self.registry.iter() {
            instance.evict_session(session);
        }
        debug!(target: DISPATCH_TARGET, session = session.0, "released session cache");
    }

    /// Resets every initialised plugin before shutdown.
    ///
    /// Only the first call has an effect. Returns `true` when this call ran
    /// the resets.
    pub fn housekeeping(&self) -> bool {
        if self.housekept.swap(true, Ordering::AcqRel) {
            return false;
        }
        let mut reset = 0_usize;
        for instance in self.registry.iter().filter(|instance| instance.is_initialised()) {
            instance.reset();
            reset += 1;
        }
        info!(target: DISPATCH_TARGET, plugins = reset, "housekeeping complete");
        true
    }

    fn invoke(
        &self,
        instance: &PluginInstance,
        request: &RequestModel,
        data: Option<Value>,
    ) -> Result<Option<Value>, PluginError> {
        let call = PluginCall {
            request: request.clone(),
            data,
            services: Arc::clone(&self.services),
        };
        let mut slot = ResultSlot::new();
        match instance.invoke(&call, &mut slot) {
            Ok(()) => Ok(slot.take()),
            Err(failure) => {
                warn!(
                    target: DISPATCH_TARGET,
                    plugin = instance.descriptor().name(),
                    code = %failure.code,
                    message = %failure.message,
                    "plugin failed"
                );
                drop(slot);
                Err(PluginError::Failed {
                    plugin: instance.descriptor().name().to_owned(),
                    code: failure.code,
                    message: failure.message,
                })
            }
        }
    }
}

fn transition(state: &mut DispatchState, next: DispatchState, plugin: &str) {
    debug!(target: DISPATCH_TARGET, from = %state, to = %next, plugin, "dispatch state");
    *state = next;
}
