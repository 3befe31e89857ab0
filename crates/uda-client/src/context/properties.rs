//! Per-context switches set by name.

use std::str::FromStr;
use std::time::Duration;

use crate::error::ClientError;

/// A property assignment such as `timeout=30` or `verbose`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    /// Round-trip timeout for sessions opened afterwards.
    Timeout(Duration),
    /// Log each call at info level.
    Verbose,
    /// Ask plugins for metadata alongside data.
    GetMeta,
}

impl FromStr for Property {
    type Err = ClientError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let bad = || ClientError::BadProperty {
            property: text.to_owned(),
        };
        let (name, value) = match text.split_once('=') {
            Some((name, value)) => (name.trim(), Some(value.trim())),
            None => (text.trim(), None),
        };
        match (name.to_ascii_lowercase().as_str(), value) {
            ("timeout", Some(seconds)) => seconds
                .parse::<u64>()
                .map(|seconds| Self::Timeout(Duration::from_secs(seconds)))
                .map_err(|_| bad()),
            ("verbose", None) => Ok(Self::Verbose),
            ("get_meta", None) => Ok(Self::GetMeta),
            _ => Err(bad()),
        }
    }
}

/// Current switch values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Properties {
    /// Timeout override; `None` means the configured value.
    pub timeout: Option<Duration>,
    /// Verbose call logging.
    pub verbose: bool,
    /// Metadata requested from plugins.
    pub get_meta: bool,
}

impl Properties {
    /// Applies an assignment.
    pub fn set(&mut self, property: Property) {
        match property {
            Property::Timeout(timeout) => self.timeout = Some(timeout),
            Property::Verbose => self.verbose = true,
            Property::GetMeta => self.get_meta = true,
        }
    }

    /// Restores the named property to its default.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::BadProperty`] for an unknown name.
    pub fn reset(&mut self, name: &str) -> Result<(), ClientError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "timeout" => self.timeout = None,
            "verbose" => self.verbose = false,
            "get_meta" => self.get_meta = false,
            _ => {
                return Err(ClientError::BadProperty {
                    property: name.to_owned(),
                });
            }
        }
        Ok(())
    }
}
