use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Output formats understood by the server and client subscribers.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event, for log shippers.
    #[default]
    Json,
    /// Single-line human-readable events.
    Compact,
    /// Multi-line human-readable events with span context.
    Pretty,
}

impl LogFormat {
    /// Reports whether the format is meant for people rather than machines.
    #[must_use]
    pub const fn is_human(self) -> bool {
        matches!(self, Self::Compact | Self::Pretty)
    }
}

/// Errors encountered while parsing a [`LogFormat`] from text.
pub type LogFormatParseError = strum::ParseError;
