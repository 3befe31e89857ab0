//! Client sessions: connect with bounded retries, fail over, reuse.
//!
//! [`ConnectionManager::connect`] tries the endpoint's primary host up to
//! [`RetryPolicy::total_attempts`] times, sleeping a jittered delay between
//! attempts. When every attempt fails and the endpoint names a distinct
//! secondary, the same loop runs against the secondary; if that succeeds the
//! endpoint's roles are swapped. The swap persists, so later connects through
//! the same endpoint try the former secondary first.
//!
//! Open sessions are kept until closed and reused by any later connect to the
//! same host.

mod retry;
mod session;
mod tcp;


use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};
use uda_config::{Config, Endpoint, HostPort};
use uda_protocol::{ClientMessage, ProtocolError, Response, StatusCode, StructureCodec};

pub use self::retry::{Jitter, RetryPolicy, Sleeper, ThreadSleeper};
pub use self::session::{CLIENT_AGENT, Session, SessionId};
pub use self::tcp::{ConnectFailure, Connector, SOCKET_BUFFER_SIZE, TcpConnector};

pub(crate) const CONNECTION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::connection");

/// Failures opening a session. None is retried beyond the bounded loop.
#[derive(Debug, Clone, Error)]
pub enum ConnectionError {
    /// The host name did not resolve.
    #[error("failed to resolve {host}: {source}")]
    Resolution {
        /// Host that failed.
        host: HostPort,
        /// Resolver error.
        #[source]
        source: Arc<io::Error>,
    },
    /// Every attempt was refused or timed out.
    #[error("gave up on {host} after {attempts} attempts: {source}")]
    Exhausted {
        /// Host that failed.
        host: HostPort,
        /// Attempts made.
        attempts: u32,
        /// Error from the final attempt.
        #[source]
        source: Arc<io::Error>,
    },
    /// The socket could not be tuned.
    #[error("failed to configure socket for {host}: {source}")]
    SocketOption {
        /// Host that failed.
        host: HostPort,
        /// Option error.
        #[source]
        source: Arc<io::Error>,
    },
    /// The endpoint carries TLS material this connector cannot use.
    #[error("{host} requires TLS, which this connector does not provide")]
    TlsUnsupported {
        /// Host that asked for TLS.
        host: HostPort,
    },
    /// The socket opened but the version handshake failed.
    #[error("handshake with {host} failed: {source}")]
    Handshake {
        /// Host that failed.
        host: HostPort,
        /// Protocol failure.
        #[source]
        source: ProtocolError,
    },
}

impl ConnectionError {
    /// Status code for this failure.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Resolution { .. } => StatusCode::RESOLUTION_FAILED,
            Self::Exhausted { .. } => StatusCode::ATTEMPTS_EXHAUSTED,
            Self::SocketOption { .. } | Self::TlsUnsupported { .. } => StatusCode::SOCKET_OPTION,
            Self::Handshake { source, .. } => source.status(),
        }
    }

    /// Host the failure concerns.
    #[must_use]
    pub const fn host(&self) -> &HostPort {
        match self {
            Self::Resolution { host, .. }
            | Self::Exhausted { host, .. }
            | Self::SocketOption { host, .. }
            | Self::TlsUnsupported { host }
            | Self::Handshake { host, .. } => host,
        }
    }
}

/// Owns every open session of one client.
pub struct ConnectionManager<C: Connector = TcpConnector, P: Sleeper = ThreadSleeper> {
    connector: C,
    sleeper: P,
    policy: RetryPolicy,
    jitter: Jitter,
    timeout: Duration,
    codec: StructureCodec,
    next_id: u64,
    sessions: BTreeMap<SessionId, Session<C::Stream>>,
}

impl<C: Connector, P: Sleeper> fmt::Debug for ConnectionManager<C, P> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ConnectionManager")
            .field("policy", &self.policy)
            .field("timeout", &self.timeout)
            .field("sessions", &self.sessions.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// TCP manager configured from `config`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            TcpConnector,
            ThreadSleeper,
            RetryPolicy::from_config(config),
            config.timeout(),
        )
    }
}

impl<C: Connector, P: Sleeper> ConnectionManager<C, P> {
    /// Manager using `connector` for sockets and `sleeper` between retries.
    #[must_use]
    pub fn new(connector: C, sleeper: P, policy: RetryPolicy, timeout: Duration) -> Self {
        Self {
            connector,
            sleeper,
            policy,
            jitter: Jitter::from_process(),
            timeout,
            codec: StructureCodec::new(),
            next_id: 0,
            sessions: BTreeMap::new(),
        }
    }

    /// Replaces the delay generator.
    #[must_use]
    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    /// Returns a session to `endpoint`, opening one if none is open.
    ///
    /// Swaps the endpoint's roles when only the secondary answered.
    ///
    /// # Errors
    ///
    /// Returns the failure from the last host tried.
    pub fn connect(&mut self, endpoint: &mut Endpoint) -> Result<SessionId, ConnectionError> {
        if let Some(id) = self.find(endpoint) {
            debug!(target: CONNECTION_TARGET, %id, %endpoint, "reusing session");
            return Ok(id);
        }
        if endpoint.tls().is_some() && !self.connector.supports_tls() {
            return Err(ConnectionError::TlsUnsupported {
                host: endpoint.primary().clone(),
            });
        }
        let primary = endpoint.primary().clone();
        let primary_error = match self.open(&primary) {
            Ok(id) => return Ok(id),
            Err(error) => error,
        };
        let Some(secondary) = endpoint.distinct_secondary().cloned() else {
            return Err(primary_error);
        };
        warn!(
            target: CONNECTION_TARGET,
            %primary,
            %secondary,
            error = %primary_error,
            "primary unreachable, trying secondary"
        );
        let id = self.open(&secondary)?;
        endpoint.swap_roles();
        info!(target: CONNECTION_TARGET, %id, %endpoint, "failed over; roles swapped");
        Ok(id)
    }

    /// Sends `message` on session `id` and returns the response.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::ConnectionClosed`] for an unknown session.
    /// Any failure removes the session so the next connect opens a new one.
    pub fn round_trip(
        &mut self,
        id: SessionId,
        message: &ClientMessage,
    ) -> Result<Response, ProtocolError> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(ProtocolError::ConnectionClosed)?;
        let outcome = session.round_trip(&self.codec, message);
        if let Err(error) = &outcome {
            warn!(target: CONNECTION_TARGET, %id, %error, "dropping failed session");
            self.sessions.remove(&id);
        }
        outcome
    }

    /// The open session `id`.
    #[must_use]
    pub fn session(&self, id: SessionId) -> Option<&Session<C::Stream>> {
        self.sessions.get(&id)
    }

    /// Closes session `id`. Returns false when it was not open.
    pub fn close(&mut self, id: SessionId) -> bool {
        match self.sessions.remove(&id) {
            Some(session) => {
                session.close(&self.codec);
                true
            }
            None => false,
        }
    }

    /// Closes every session to either host of `endpoint`.
    pub fn close_endpoint(&mut self, endpoint: &Endpoint) -> usize {
        let ids: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|session| serves(endpoint, session.peer()))
            .map(Session::id)
            .collect();
        ids.into_iter().filter(|id| self.close(*id)).count()
    }

    /// Closes every session.
    pub fn close_all(&mut self) -> usize {
        let sessions = std::mem::take(&mut self.sessions);
        let closed = sessions.len();
        for session in sessions.into_values() {
            session.close(&self.codec);
        }
        closed
    }

    /// Number of open sessions.
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Round-trip timeout applied to sessions opened from now on.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Current round-trip timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The connector, for inspection.
    #[must_use]
    pub const fn connector(&self) -> &C {
        &self.connector
    }

    fn find(&self, endpoint: &Endpoint) -> Option<SessionId> {
        self.sessions
            .values()
            .find(|session| serves(endpoint, session.peer()))
            .map(Session::id)
    }

    fn open(&mut self, host: &HostPort) -> Result<SessionId, ConnectionError> {
        let stream = self.attempt(host)?;
        let id = SessionId::from(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        let session = Session::open(id, host.clone(), stream).map_err(|source| {
            ConnectionError::Handshake {
                host: host.clone(),
                source,
            }
        })?;
        self.sessions.insert(id, session);
        Ok(id)
    }

    fn attempt(&mut self, host: &HostPort) -> Result<C::Stream, ConnectionError> {
        let total = self.policy.total_attempts();
        let mut attempt = 1;
        loop {
            match self.connector.connect(host, self.timeout) {
                Ok(stream) => {
                    debug!(target: CONNECTION_TARGET, %host, attempt, "connected");
                    return Ok(stream);
                }
                Err(ConnectFailure::Resolve(source)) => {
                    return Err(ConnectionError::Resolution {
                        host: host.clone(),
                        source: Arc::new(source),
                    });
                }
                Err(ConnectFailure::Configure(source)) => {
                    return Err(ConnectionError::SocketOption {
                        host: host.clone(),
                        source: Arc::new(source),
                    });
                }
                Err(ConnectFailure::Connect(source)) if attempt >= total => {
                    return Err(ConnectionError::Exhausted {
                        host: host.clone(),
                        attempts: total,
                        source: Arc::new(source),
                    });
                }
                Err(ConnectFailure::Connect(error)) => {
                    let delay = self.jitter.next_delay(self.policy.max_delay());
                    debug!(
                        target: CONNECTION_TARGET,
                        %host,
                        attempt,
                        %error,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "connect failed, retrying"
                    );
                    self.sleeper.sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}

impl<C: Connector, P: Sleeper> Drop for ConnectionManager<C, P> {
    fn drop(&mut self) {
        self.close_all();
    }
}

fn serves(endpoint: &Endpoint, peer: &HostPort) -> bool {
    endpoint.primary().same_host(peer)
        || endpoint
            .secondary()
            .is_some_and(|secondary| secondary.same_host(peer))
}
