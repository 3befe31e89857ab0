//! The client surface: one object holding everything a caller's requests
//! share.
//!
//! All state sits behind a single mutex held for a whole round trip, so two
//! threads sharing a context never interleave bytes on one session. Errors
//! are returned and also recorded on the context's error stack, which each
//! call clears on entry.

mod properties;

#[cfg(test)]
mod tests;

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, info};
use uda_config::{Config, Endpoint};
use uda_protocol::{
    ClientMessage, CodecError, ErrorStack, RequestModel, Response, StatusCode, Value,
};

use crate::connection::{
    ConnectionManager, Connector, RetryPolicy, Sleeper, TcpConnector, ThreadSleeper,
};
use crate::error::ClientError;
use crate::handles::{Handle, HandleTable};
use crate::hosts::HostRegistry;

pub use self::properties::{Properties, Property};

const CONTEXT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::context");

/// Extra key sent with every request while `get_meta` is set.
pub const GET_META_KEY: &str = "get_meta";

struct ContextState<C: Connector, P: Sleeper> {
    config: Config,
    endpoint: Endpoint,
    connections: ConnectionManager<C, P>,
    handles: HandleTable,
    properties: Properties,
    errors: ErrorStack,
}

/// Connection, handles, properties and error stack of one client.
pub struct ClientContext<C: Connector = TcpConnector, P: Sleeper = ThreadSleeper> {
    state: Mutex<ContextState<C, P>>,
}

impl ClientContext {
    /// Context over TCP for the endpoint named by `config`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_parts(config, TcpConnector, ThreadSleeper)
    }

    /// Context for a hosts file alias, or for `host[:port]` when no alias
    /// matches.
    ///
    /// # Errors
    ///
    /// Fails when the hosts file cannot be read or the text names no host.
    pub fn for_alias(config: Config, alias: &str) -> Result<Self, ClientError> {
        let endpoint =
            HostRegistry::global(&config)?.resolve_or_literal(alias, config.server_port())?;
        Ok(Self::new(config).with_endpoint(endpoint))
    }
}

impl<C: Connector, P: Sleeper> ClientContext<C, P> {
    /// Context with explicit socket and sleep seams.
    #[must_use]
    pub fn with_parts(config: Config, connector: C, sleeper: P) -> Self {
        let connections = ConnectionManager::new(
            connector,
            sleeper,
            RetryPolicy::from_config(&config),
            config.timeout(),
        );
        Self {
            state: Mutex::new(ContextState {
                endpoint: config.endpoint(),
                config,
                connections,
                handles: HandleTable::new(),
                properties: Properties::default(),
                errors: ErrorStack::new(),
            }),
        }
    }

    /// Replaces the endpoint requests go to.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .endpoint = endpoint;
        self
    }

    /// Fetches data for `request` and stores it under a new handle.
    ///
    /// `source` is the legacy second argument and is usually empty.
    ///
    /// # Errors
    ///
    /// Returns parse, connection and protocol failures, or
    /// [`ClientError::Server`] carrying the server's error stack. Nothing is
    /// stored on failure.
    pub fn get(&self, request: &str, source: &str) -> Result<Handle, ClientError> {
        self.call(|state| state.get(request, source))
    }

    /// Sends `data` to the plugin named by `instruction`.
    ///
    /// # Errors
    ///
    /// As for [`ClientContext::get`].
    pub fn put(&self, instruction: &str, data: Value) -> Result<StatusCode, ClientError> {
        self.call(|state| state.put(instruction, data))
    }

    /// Releases one handle.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UnknownHandle`] when nothing is stored there.
    pub fn free(&self, handle: Handle) -> Result<(), ClientError> {
        self.call(|state| state.handles.free(handle))
    }

    /// Releases every handle. Returns how many were released.
    pub fn free_all(&self) -> usize {
        self.lock().handles.free_all()
    }

    /// Runs `inspect` against the value behind `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UnknownHandle`] when nothing is stored there.
    pub fn with_value<R>(
        &self,
        handle: Handle,
        inspect: impl FnOnce(&Value) -> R,
    ) -> Result<R, ClientError> {
        self.call(|state| state.handles.get(handle).map(|entry| inspect(entry.value())))
    }

    /// A copy of the value behind `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UnknownHandle`] when nothing is stored there.
    pub fn value(&self, handle: Handle) -> Result<Value, ClientError> {
        self.with_value(handle, Value::clone)
    }

    /// The request that produced `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UnknownHandle`] when nothing is stored there.
    pub fn request(&self, handle: Handle) -> Result<RequestModel, ClientError> {
        self.call(|state| state.handles.get(handle).map(|entry| entry.request().clone()))
    }

    /// Number of live handles.
    #[must_use]
    pub fn handle_count(&self) -> usize {
        self.lock().handles.len()
    }

    /// Applies a property assignment such as `timeout=30` or `get_meta`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::BadProperty`] for unknown names or values.
    pub fn set_property(&self, text: &str) -> Result<(), ClientError> {
        self.call(|state| {
            let property = text.parse::<Property>()?;
            state.properties.set(property);
            state.apply_timeout();
            Ok(())
        })
    }

    /// Restores a property to its default.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::BadProperty`] for unknown names.
    pub fn reset_property(&self, name: &str) -> Result<(), ClientError> {
        self.call(|state| {
            state.properties.reset(name)?;
            state.apply_timeout();
            Ok(())
        })
    }

    /// Current property values.
    #[must_use]
    pub fn properties(&self) -> Properties {
        self.lock().properties
    }

    /// Code of the most recent error, or [`StatusCode::OK`].
    #[must_use]
    pub fn error_code(&self) -> StatusCode {
        self.lock().errors.code()
    }

    /// Message of the most recent error, or an empty string.
    #[must_use]
    pub fn error_message(&self) -> String {
        self.lock().errors.message().to_owned()
    }

    /// Every error recorded by the last call, oldest first.
    #[must_use]
    pub fn errors(&self) -> ErrorStack {
        self.lock().errors.clone()
    }

    /// Where requests currently go. Reflects any failover swap.
    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        self.lock().endpoint.clone()
    }

    /// Number of open sessions.
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.lock().connections.open_sessions()
    }

    /// Closes every open session. Handles stay valid.
    pub fn close(&self) -> usize {
        self.lock().connections.close_all()
    }

    fn call<T>(
        &self,
        operation: impl FnOnce(&mut ContextState<C, P>) -> Result<T, ClientError>,
    ) -> Result<T, ClientError> {
        let mut state = self.lock();
        state.errors.clear();
        let outcome = operation(&mut *state);
        if let Err(error) = &outcome {
            debug!(target: CONTEXT_TARGET, status = %error.status(), %error, "call failed");
            state.errors.extend(error.to_stack(CONTEXT_TARGET));
        }
        outcome
    }

    fn lock(&self) -> MutexGuard<'_, ContextState<C, P>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Connector, P: Sleeper> std::fmt::Debug for ClientContext<C, P> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        formatter
            .debug_struct("ClientContext")
            .field("endpoint", &state.endpoint)
            .field("handles", &state.handles.len())
            .field("properties", &state.properties)
            .finish_non_exhaustive()
    }
}

impl<C: Connector, P: Sleeper> ContextState<C, P> {
    fn get(&mut self, text: &str, source: &str) -> Result<Handle, ClientError> {
        let request = self.prepare(text, source)?;
        match self.exchange(&ClientMessage::Get(request.clone()))? {
            Response::Data(value) => Ok(self.handles.put(value, request)),
            Response::Acknowledged => Err(ClientError::Protocol(
                CodecError::mismatch("data request answered without data").into(),
            )),
            Response::Failed(errors) => Err(ClientError::Server { errors }),
        }
    }

    fn put(&mut self, instruction: &str, data: Value) -> Result<StatusCode, ClientError> {
        let request = self.prepare(instruction, "")?;
        match self.exchange(&ClientMessage::Put { request, data })? {
            Response::Data(_) | Response::Acknowledged => Ok(StatusCode::OK),
            Response::Failed(errors) => Err(ClientError::Server { errors }),
        }
    }

    fn prepare(&self, text: &str, source: &str) -> Result<RequestModel, ClientError> {
        let request = RequestModel::parse(text, source)?;
        let request = if self.properties.get_meta {
            request.with_extra(GET_META_KEY, "true")
        } else {
            request
        };
        if self.properties.verbose {
            info!(target: CONTEXT_TARGET, request = request.raw(), endpoint = %self.endpoint, "sending request");
        }
        Ok(request)
    }

    fn exchange(&mut self, message: &ClientMessage) -> Result<Response, ClientError> {
        let id = self.connections.connect(&mut self.endpoint)?;
        Ok(self.connections.round_trip(id, message)?)
    }

    fn apply_timeout(&mut self) {
        let timeout: Duration = self.properties.timeout.unwrap_or_else(|| self.config.timeout());
        self.connections.set_timeout(timeout);
    }
}
