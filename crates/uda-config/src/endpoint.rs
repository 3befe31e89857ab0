//! Host/port pairs and the primary/secondary endpoint a client connects to.
//!
//! An [`Endpoint`] carries the failover order. The connection layer mutates it
//! through [`Endpoint::swap_roles`] after a secondary host answers, so every
//! later call prefers the host that last worked.

use std::fmt;
use std::str::FromStr;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// A TCP host name and port.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct HostPort {
    host: String,
    port: u16,
}

impl HostPort {
    /// Builds a host/port pair.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host name or address literal.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Parses `host[:port]`, falling back to `default_port` when the suffix is absent.
    pub fn parse_with_default(input: &str, default_port: u16) -> Result<Self, EndpointParseError> {
        match input.parse::<Self>() {
            Ok(parsed) => Ok(parsed),
            Err(EndpointParseError::MissingPort(_)) => {
                let host = input.trim();
                if host.is_empty() {
                    return Err(EndpointParseError::MissingHost(input.to_owned()));
                }
                Ok(Self::new(host, default_port))
            }
            Err(other) => Err(other),
        }
    }

    /// Compares host names case-insensitively alongside the port.
    #[must_use]
    pub fn same_host(&self, other: &Self) -> bool {
        self.port == other.port && self.host.eq_ignore_ascii_case(&other.host)
    }
}

impl fmt::Display for HostPort {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.host, self.port)
    }
}

impl FromStr for HostPort {
    type Err = EndpointParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.contains("://") {
            let url = Url::parse(trimmed)?;
            if url.scheme() != "tcp" {
                return Err(EndpointParseError::UnsupportedScheme(url.scheme().to_owned()));
            }
            let host = url
                .host_str()
                .ok_or_else(|| EndpointParseError::MissingHost(input.to_owned()))?;
            let port = url
                .port()
                .ok_or_else(|| EndpointParseError::MissingPort(input.to_owned()))?;
            return Ok(Self::new(host, port));
        }

        let Some((host, port)) = trimmed.rsplit_once(':') else {
            return Err(EndpointParseError::MissingPort(input.to_owned()));
        };
        if host.is_empty() {
            return Err(EndpointParseError::MissingHost(input.to_owned()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| EndpointParseError::InvalidPort(input.to_owned()))?;
        Ok(Self::new(host, port))
    }
}

/// Paths to the certificate material used for TLS sessions.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct TlsMaterial {
    /// Client certificate.
    pub certificate: Option<Utf8PathBuf>,
    /// Private key matching the client certificate.
    pub private_key: Option<Utf8PathBuf>,
    /// Certificate authority bundle used to verify the server.
    pub ca_certificate: Option<Utf8PathBuf>,
}

impl TlsMaterial {
    /// True when certificate, key and authority are all present.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.certificate.is_some() && self.private_key.is_some() && self.ca_certificate.is_some()
    }

    /// True when no path has been supplied.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.certificate.is_none() && self.private_key.is_none() && self.ca_certificate.is_none()
    }
}

/// Connection parameters for one logical server.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Endpoint {
    primary: HostPort,
    secondary: Option<HostPort>,
    tls: Option<TlsMaterial>,
}

impl Endpoint {
    /// Builds an endpoint with only a primary host.
    #[must_use]
    pub const fn new(primary: HostPort) -> Self {
        Self {
            primary,
            secondary: None,
            tls: None,
        }
    }

    /// Adds a failover host.
    #[must_use]
    pub fn with_secondary(mut self, secondary: HostPort) -> Self {
        self.secondary = Some(secondary);
        self
    }

    /// Attaches TLS material.
    #[must_use]
    pub fn with_tls(mut self, tls: TlsMaterial) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Host tried first.
    #[must_use]
    pub const fn primary(&self) -> &HostPort {
        &self.primary
    }

    /// Host tried once the primary exhausts its attempts.
    #[must_use]
    pub const fn secondary(&self) -> Option<&HostPort> {
        self.secondary.as_ref()
    }

    /// TLS material, when the endpoint requires it.
    #[must_use]
    pub const fn tls(&self) -> Option<&TlsMaterial> {
        self.tls.as_ref()
    }

    /// The secondary host, if configured and not the same host as the primary.
    #[must_use]
    pub fn distinct_secondary(&self) -> Option<&HostPort> {
        self.secondary
            .as_ref()
            .filter(|secondary| !secondary.same_host(&self.primary))
    }

    /// Exchanges primary and secondary.
    ///
    /// Called after the secondary accepted a connection. The exchange is
    /// persistent: every later connect through this endpoint tries the
    /// former secondary first. Does nothing without a secondary.
    pub fn swap_roles(&mut self) {
        if let Some(secondary) = self.secondary.as_mut() {
            std::mem::swap(&mut self.primary, secondary);
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.secondary {
            Some(secondary) => write!(formatter, "{} (failover {secondary})", self.primary),
            None => write!(formatter, "{}", self.primary),
        }
    }
}

/// Errors encountered while parsing host/port text.
#[derive(Debug, Error)]
pub enum EndpointParseError {
    /// Scheme was not `tcp`.
    #[error("unsupported endpoint scheme '{0}'")]
    UnsupportedScheme(String),
    /// Host name was missing.
    #[error("missing host in '{0}'")]
    MissingHost(String),
    /// Port was missing.
    #[error("missing port in '{0}'")]
    MissingPort(String),
    /// Port was not a number in range.
    #[error("invalid port in '{0}'")]
    InvalidPort(String),
    /// URL failed to parse.
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::bare("server.example:56565", "server.example", 56565)]
    #[case::url("tcp://10.0.0.1:9000", "10.0.0.1", 9000)]
    #[case::padded("  db:1 ", "db", 1)]
    fn parses_host_port(#[case] input: &str, #[case] host: &str, #[case] port: u16) {
        let parsed: HostPort = input.parse().expect("host/port parses");
        assert_eq!(parsed, HostPort::new(host, port));
    }

    #[rstest]
    #[case::no_port("server.example")]
    #[case::bad_port("server:99999")]
    #[case::no_host(":80")]
    #[case::wrong_scheme("unix:///tmp/sock")]
    fn rejects_malformed_host_port(#[case] input: &str) {
        assert!(input.parse::<HostPort>().is_err());
    }

    #[test]
    fn default_port_fills_missing_suffix() {
        let parsed = HostPort::parse_with_default("archive", 56565).expect("parses");
        assert_eq!(parsed, HostPort::new("archive", 56565));
    }

    #[test]
    fn swap_roles_exchanges_hosts() {
        let mut endpoint = Endpoint::new(HostPort::new("a", 1)).with_secondary(HostPort::new("b", 2));
        endpoint.swap_roles();
        assert_eq!(endpoint.primary(), &HostPort::new("b", 2));
        assert_eq!(endpoint.secondary(), Some(&HostPort::new("a", 1)));
    }

    #[test]
    fn swap_without_secondary_is_noop() {
        let mut endpoint = Endpoint::new(HostPort::new("a", 1));
        endpoint.swap_roles();
        assert_eq!(endpoint.primary(), &HostPort::new("a", 1));
    }

    #[test]
    fn identical_secondary_is_not_distinct() {
        let endpoint =
            Endpoint::new(HostPort::new("Server", 1)).with_secondary(HostPort::new("server", 1));
        assert!(endpoint.distinct_secondary().is_none());
    }

    #[test]
    fn tls_completeness() {
        let partial = TlsMaterial {
            certificate: Some(Utf8PathBuf::from("/c.pem")),
            ..TlsMaterial::default()
        };
        assert!(!partial.is_complete());
        assert!(!partial.is_empty());
        assert!(TlsMaterial::default().is_empty());
    }
}
