//! Host aliases read from the user's hosts file.
//!
//! The file is a sequence of `key value` (or `key=value`) lines; `host_name`
//! starts a new entry and the keys after it describe that entry:
//!
//! ```text
//! host_name SSL://data.example.org:56565
//! host_alias archive
//! certificate /home/me/.uda/client.pem
//! private_key /home/me/.uda/client.key
//! ca_certificate /home/me/.uda/ca.pem
//! ```
//!
//! A missing file is an empty registry. The process-wide registry is loaded
//! at most once; tests build registries directly with [`HostRegistry::parse`].

#[cfg(test)]
mod tests;

use std::io;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing::{debug, info};
use uda_config::{Config, Endpoint, HostPort, TlsMaterial};

use crate::error::ClientError;

const HOSTS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::hosts");
const TLS_SCHEME: &str = "ssl://";

static GLOBAL_HOSTS: OnceCell<HostRegistry> = OnceCell::new();

/// Failures while reading a hosts file.
#[derive(Debug, Clone, Error)]
pub enum HostFileError {
    /// The file exists but could not be read.
    #[error("failed to read hosts file {path}: {source}")]
    Read {
        /// Hosts file path.
        path: Utf8PathBuf,
        /// Underlying failure.
        #[source]
        source: Arc<io::Error>,
    },
    /// A line could not be interpreted.
    #[error("hosts file line {line}: {message}")]
    Malformed {
        /// One-based line number.
        line: usize,
        /// What was wrong.
        message: String,
    },
}

/// One server described by the hosts file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostEntry {
    name: String,
    alias: Option<String>,
    port: Option<u16>,
    tls: TlsMaterial,
    is_tls: bool,
}

impl HostEntry {
    /// Host name, without any scheme or port.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Alias, when one was given.
    #[must_use]
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Port, when one was given.
    #[must_use]
    pub const fn port(&self) -> Option<u16> {
        self.port
    }

    /// True when the entry asks for an encrypted channel, either through the
    /// `SSL://` prefix or by naming all three TLS files.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        self.is_tls || self.tls.is_complete()
    }

    /// TLS file locations.
    #[must_use]
    pub const fn tls(&self) -> &TlsMaterial {
        &self.tls
    }

    /// Case-insensitive match on alias or host name.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self
                .alias
                .as_deref()
                .is_some_and(|alias| alias.eq_ignore_ascii_case(name))
    }

    /// Endpoint for this entry; `default_port` applies when no port was given.
    #[must_use]
    pub fn endpoint(&self, default_port: u16) -> Endpoint {
        let endpoint = Endpoint::new(HostPort::new(
            self.name.clone(),
            self.port.unwrap_or(default_port),
        ));
        if self.is_tls() {
            endpoint.with_tls(self.tls.clone())
        } else {
            endpoint
        }
    }
}

/// Alias table, immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostRegistry {
    entries: Vec<HostEntry>,
}

impl HostRegistry {
    /// Parses hosts file text.
    ///
    /// # Errors
    ///
    /// Returns [`HostFileError::Malformed`] for a key before the first
    /// `host_name` or an unparsable port.
    pub fn parse(text: &str) -> Result<Self, HostFileError> {
        let mut entries: Vec<HostEntry> = Vec::new();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.split_once('#').map_or(raw, |(before, _)| before).trim();
            if line.is_empty() {
                continue;
            }
            let malformed = |message: String| HostFileError::Malformed {
                line: index + 1,
                message,
            };
            let (key, value) = split_key_value(line);
            let key = key.to_ascii_lowercase();
            if key == "host_name" {
                entries.push(parse_host_name(value).map_err(malformed)?);
                continue;
            }
            let entry = entries
                .last_mut()
                .ok_or_else(|| malformed(format!("'{key}' appears before any host_name")))?;
            apply_key(entry, &key, value).map_err(malformed)?;
        }
        Ok(Self { entries })
    }

    /// Reads `path`; a missing file yields an empty registry.
    ///
    /// # Errors
    ///
    /// Fails when the file exists but cannot be read or parsed.
    pub fn load(path: &Utf8Path) -> Result<Self, HostFileError> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let registry = Self::parse(&text)?;
                info!(target: HOSTS_TARGET, path = %path, hosts = registry.len(), "loaded hosts file");
                Ok(registry)
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!(target: HOSTS_TARGET, path = %path, "no hosts file");
                Ok(Self::default())
            }
            Err(error) => Err(HostFileError::Read {
                path: path.to_owned(),
                source: Arc::new(error),
            }),
        }
    }

    /// The process-wide registry, loaded from `config.hosts_file()` on first
    /// use. Later calls ignore `config`.
    ///
    /// # Errors
    ///
    /// Fails when the first load fails; the next call tries again.
    pub fn global(config: &Config) -> Result<&'static Self, HostFileError> {
        GLOBAL_HOSTS.get_or_try_init(|| match config.hosts_file() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        })
    }

    /// Entry whose alias or host name matches `name`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&HostEntry> {
        self.entries.iter().find(|entry| entry.matches(name))
    }

    /// Endpoint for `alias`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UnknownHostAlias`] when nothing matches.
    pub fn resolve(&self, alias: &str, default_port: u16) -> Result<Endpoint, ClientError> {
        self.find(alias)
            .map(|entry| entry.endpoint(default_port))
            .ok_or_else(|| ClientError::UnknownHostAlias {
                alias: alias.to_owned(),
            })
    }

    /// Endpoint for `text`, treating an unknown alias as `host[:port]`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UnknownHostAlias`] when the text is neither a
    /// known alias nor a usable host name.
    pub fn resolve_or_literal(&self, text: &str, default_port: u16) -> Result<Endpoint, ClientError> {
        if let Some(entry) = self.find(text) {
            return Ok(entry.endpoint(default_port));
        }
        HostPort::parse_with_default(text, default_port)
            .map(Endpoint::new)
            .map_err(|_| ClientError::UnknownHostAlias {
                alias: text.to_owned(),
            })
    }

    /// Entries in file order.
    #[must_use]
    pub fn entries(&self) -> &[HostEntry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no hosts are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn split_key_value(line: &str) -> (&str, &str) {
    let split = line.find(|character: char| character == '=' || character.is_whitespace());
    match split {
        Some(position) => {
            let key = line.get(..position).unwrap_or_default();
            let rest = line.get(position + 1..).unwrap_or_default();
            (key.trim(), rest.trim().trim_start_matches('=').trim())
        }
        None => (line, ""),
    }
}

fn parse_host_name(value: &str) -> Result<HostEntry, String> {
    let (is_tls, address) = match value.get(..TLS_SCHEME.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(TLS_SCHEME) => {
            (true, value.get(TLS_SCHEME.len()..).unwrap_or_default())
        }
        _ => (false, value),
    };
    let (name, port) = match address.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => (host, Some(parse_port(port)?)),
        _ => (address, None),
    };
    if name.is_empty() {
        return Err(String::from("host_name has no host"));
    }
    Ok(HostEntry {
        name: name.to_owned(),
        port,
        is_tls,
        ..HostEntry::default()
    })
}

fn apply_key(entry: &mut HostEntry, key: &str, value: &str) -> Result<(), String> {
    match key {
        "host_alias" => entry.alias = Some(value.to_owned()),
        "port" => entry.port = Some(parse_port(value)?),
        "certificate" => entry.tls.certificate = Some(Utf8PathBuf::from(value)),
        "private_key" | "privatekey" => entry.tls.private_key = Some(Utf8PathBuf::from(value)),
        "ca_certificate" | "ca-certificate" => {
            entry.tls.ca_certificate = Some(Utf8PathBuf::from(value));
        }
        other => debug!(target: HOSTS_TARGET, key = other, "ignoring unknown hosts file key"),
    }
    Ok(())
}

fn parse_port(text: &str) -> Result<u16, String> {
    text.trim()
        .parse()
        .map_err(|_| format!("invalid port '{text}'"))
}
