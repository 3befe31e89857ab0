//! Shared configuration for the UDA server and client.
//!
//! [`Config`] is layered by `ortho_config`: a TOML file named with
//! `--config-path`, then `UDA_*` environment variables, then command-line
//! flags. Every field is optional on disk; the accessor methods apply the
//! defaults from [`defaults`] so callers never see an unset value.

mod defaults;
mod endpoint;
mod logging;

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_LISTEN_ADDRESS, DEFAULT_LOG_FILTER, DEFAULT_MAX_SOCKET_ATTEMPTS,
    DEFAULT_MAX_SOCKET_DELAY_SECS, DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT, DEFAULT_TIMEOUT_SECS,
    HOSTS_FILE_RELATIVE, default_hosts_file, default_log_filter, default_log_format,
};
pub use endpoint::{Endpoint, EndpointParseError, HostPort, TlsMaterial};
pub use logging::{LogFormat, LogFormatParseError};

/// Settings read once at startup and handed to the core as plain values.
#[derive(Debug, Clone, Default, Deserialize, Serialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "UDA")]
pub struct Config {
    /// Primary server host.
    pub server_host: Option<String>,
    /// Primary server port.
    pub server_port: Option<u16>,
    /// Failover server host.
    pub server_host2: Option<String>,
    /// Failover server port; defaults to the primary port.
    pub server_port2: Option<u16>,
    /// Hosts file mapping aliases to connection parameters.
    pub hosts_file: Option<Utf8PathBuf>,
    /// Connect retries after the first failure, per host.
    pub max_socket_attempts: Option<u32>,
    /// Upper bound in seconds of the random pause between retries.
    pub max_socket_delay: Option<u64>,
    /// Seconds one round trip may block before the session is abandoned.
    pub timeout: Option<u64>,
    /// Address the server listens on.
    pub listen_address: Option<String>,
    /// Plugin registry file read by the server at startup.
    pub plugin_config: Option<Utf8PathBuf>,
    /// Colon-separated directory roots file-reading plugins may open.
    pub safe_paths: Option<String>,
    /// Tracing filter expression.
    pub log_filter: Option<String>,
    /// Tracing output format.
    pub log_format: Option<LogFormat>,
}

impl Config {
    /// Primary server host name.
    #[must_use]
    pub fn server_host(&self) -> &str {
        self.server_host.as_deref().unwrap_or(DEFAULT_SERVER_HOST)
    }

    /// Primary server port.
    #[must_use]
    pub fn server_port(&self) -> u16 {
        self.server_port.unwrap_or(DEFAULT_SERVER_PORT)
    }

    /// Primary host and port.
    #[must_use]
    pub fn primary(&self) -> HostPort {
        HostPort::new(self.server_host(), self.server_port())
    }

    /// Failover host and port, when a failover host is configured.
    #[must_use]
    pub fn secondary(&self) -> Option<HostPort> {
        let host = self.server_host2.as_deref().filter(|host| !host.is_empty())?;
        let port = self.server_port2.unwrap_or_else(|| self.server_port());
        Some(HostPort::new(host, port))
    }

    /// Endpoint built from the configured primary and failover hosts.
    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        let endpoint = Endpoint::new(self.primary());
        match self.secondary() {
            Some(secondary) => endpoint.with_secondary(secondary),
            None => endpoint,
        }
    }

    /// Hosts file location, falling back to `$HOME/.uda/hosts.cfg`.
    #[must_use]
    pub fn hosts_file(&self) -> Option<Utf8PathBuf> {
        self.hosts_file.clone().or_else(default_hosts_file)
    }

    /// Connect retries after the first failure, per host.
    #[must_use]
    pub fn max_socket_attempts(&self) -> u32 {
        self.max_socket_attempts
            .unwrap_or(DEFAULT_MAX_SOCKET_ATTEMPTS)
    }

    /// Upper bound of the random pause between connect attempts.
    #[must_use]
    pub fn max_socket_delay(&self) -> Duration {
        Duration::from_secs(
            self.max_socket_delay
                .unwrap_or(DEFAULT_MAX_SOCKET_DELAY_SECS),
        )
    }

    /// Time one round trip may block.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    /// Address the server binds.
    #[must_use]
    pub fn listen_address(&self) -> &str {
        self.listen_address
            .as_deref()
            .unwrap_or(DEFAULT_LISTEN_ADDRESS)
    }

    /// Plugin registry file, when configured.
    #[must_use]
    pub fn plugin_config(&self) -> Option<&Utf8Path> {
        self.plugin_config.as_deref()
    }

    /// Directory roots file-reading plugins may open. Empty means unrestricted.
    #[must_use]
    pub fn safe_paths(&self) -> Vec<Utf8PathBuf> {
        self.safe_paths
            .as_deref()
            .map(|paths| {
                paths
                    .split(':')
                    .map(str::trim)
                    .filter(|root| !root.is_empty())
                    .map(Utf8PathBuf::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    /// Tracing output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format.unwrap_or_else(default_log_format)
    }
}
