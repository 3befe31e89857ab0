//! Ordered error stack returned to callers instead of raised errors.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::status::StatusCode;

/// One entry on an [`ErrorStack`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Status code classifying the failure.
    pub code: StatusCode,
    /// Human-readable description.
    pub message: String,
    /// Name of the component that raised the error.
    pub location: String,
}

impl ErrorRecord {
    /// Builds a record.
    #[must_use]
    pub fn new(code: StatusCode, location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            location: location.into(),
        }
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "[{}] {}: {}", self.code, self.location, self.message)
    }
}

/// Errors accumulated over one call, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorStack {
    records: Vec<ErrorRecord>,
}

impl ErrorStack {
    /// An empty stack.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Pushes a record.
    pub fn push(&mut self, record: ErrorRecord) {
        self.records.push(record);
    }

    /// Appends every record of `other`, keeping order.
    pub fn extend(&mut self, other: Self) {
        self.records.extend(other.records);
    }

    /// Removes every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// True when nothing has been recorded.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.records.len()
    }

    /// Records, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ErrorRecord> {
        self.records.iter()
    }

    /// Record at `index`, oldest first.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ErrorRecord> {
        self.records.get(index)
    }

    /// Most recent record.
    #[must_use]
    pub fn last(&self) -> Option<&ErrorRecord> {
        self.records.last()
    }

    /// Code of the most recent record, or [`StatusCode::OK`] when empty.
    #[must_use]
    pub fn code(&self) -> StatusCode {
        self.last().map_or(StatusCode::OK, |record| record.code)
    }

    /// Message of the most recent record, or an empty string when empty.
    #[must_use]
    pub fn message(&self) -> &str {
        self.last().map_or("", |record| record.message.as_str())
    }
}

impl From<ErrorRecord> for ErrorStack {
    fn from(record: ErrorRecord) -> Self {
        Self {
            records: vec![record],
        }
    }
}

impl FromIterator<ErrorRecord> for ErrorStack {
    fn from_iter<I: IntoIterator<Item = ErrorRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for ErrorStack {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, record) in self.records.iter().enumerate() {
            if index > 0 {
                writeln!(formatter)?;
            }
            write!(formatter, "{index}: {record}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stack_reports_success() {
        let stack = ErrorStack::new();
        assert_eq!(stack.code(), StatusCode::OK);
        assert_eq!(stack.message(), "");
    }

    #[test]
    fn most_recent_record_wins() {
        let mut stack = ErrorStack::new();
        stack.push(ErrorRecord::new(StatusCode::SHORT_READ, "codec", "truncated"));
        stack.push(ErrorRecord::new(
            StatusCode::SESSION_CLOSED,
            "connection",
            "closed",
        ));
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.code(), StatusCode::SESSION_CLOSED);
        assert_eq!(stack.message(), "closed");
        assert_eq!(
            stack.get(0).map(|record| record.location.as_str()),
            Some("codec")
        );
    }

    #[test]
    fn display_numbers_records() {
        let stack: ErrorStack = [ErrorRecord::new(StatusCode::NO_PLUGIN, "dispatch", "none")]
            .into_iter()
            .collect();
        assert_eq!(stack.to_string(), "0: [-300] dispatch: none");
    }
}
