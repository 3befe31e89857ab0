//! Typed requests parsed once at the client boundary.
//!
//! Two spellings are accepted. The function form names a plugin and a
//! function with keyword arguments: `BYTES::read(path=/tmp/x.dat)`. The
//! legacy form pairs a signal name with a source string:
//! `("EFIT::psi", "MAST::12345/2")`. Both produce a [`RequestModel`].
//!
//! Argument names outside the recognised set are kept in
//! [`RequestModel::extra`] for the plugin to interpret; nothing is rejected
//! for being unknown.

mod arguments;

use std::collections::BTreeMap;

use thiserror::Error;

use crate::status::StatusCode;

pub use self::arguments::{Argument, KEYWORD_VALUE};
use self::arguments::parse_arguments;

/// Separator between target, function and source segments.
pub const DEFAULT_DELIMITER: &str = "::";

/// Reasons a request cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Neither request text nor source was given.
    #[error("request is empty")]
    Empty,
    /// Parentheses or brackets do not pair up.
    #[error("unbalanced brackets in '{text}'")]
    UnbalancedBrackets {
        /// Offending text.
        text: String,
    },
    /// A quoted value is not closed.
    #[error("unterminated quote in '{text}'")]
    UnterminatedQuote {
        /// Offending text.
        text: String,
    },
    /// The target segment is empty or contains invalid characters.
    #[error("invalid request target '{target}'")]
    InvalidTarget {
        /// Offending target.
        target: String,
    },
    /// The function name is empty or contains invalid characters.
    #[error("invalid function name '{function}'")]
    InvalidFunction {
        /// Offending name.
        function: String,
    },
    /// An argument has no name.
    #[error("argument {position} has no name")]
    EmptyArgumentName {
        /// Zero-based argument position.
        position: usize,
    },
    /// A `shot` value is not an integer.
    #[error("shot number '{value}' is not an integer")]
    InvalidShot {
        /// Offending value.
        value: String,
    },
    /// The source string has too many or empty prefix segments.
    #[error("malformed source '{source_text}'")]
    InvalidSource {
        /// Offending source.
        source_text: String,
    },
}

impl ParseError {
    /// Status code for every parse failure.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        StatusCode::REQUEST_PARSE
    }
}

/// A parsed request. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RequestModel {
    pub(crate) raw: String,
    pub(crate) source: String,
    pub(crate) target: Option<String>,
    pub(crate) function: Option<String>,
    pub(crate) arguments: Vec<Argument>,
    pub(crate) extra: BTreeMap<String, String>,
    pub(crate) signal: Option<String>,
    pub(crate) path: Option<String>,
    pub(crate) archive: Option<String>,
    pub(crate) device: Option<String>,
    pub(crate) format: Option<String>,
    pub(crate) delimiter: String,
    pub(crate) shot: Option<i64>,
    pub(crate) pass: Option<String>,
}

impl RequestModel {
    /// Parses request text and an optional legacy source string.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] when the text is empty or malformed.
    pub fn parse(text: &str, legacy_source: &str) -> Result<Self, ParseError> {
        let request = text.trim();
        let source = legacy_source.trim();
        if request.is_empty() && source.is_empty() {
            return Err(ParseError::Empty);
        }

        let mut model = Self {
            raw: request.to_owned(),
            source: source.to_owned(),
            delimiter: DEFAULT_DELIMITER.to_owned(),
            ..Self::default()
        };

        if is_call(request) {
            model.apply_call(request)?;
            model.apply_source(source)?;
        } else {
            model.apply_signal(request);
            model.apply_source(source)?;
        }
        Ok(model)
    }

    /// Request text as given, trimmed.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Legacy source text as given, trimmed; empty for function-form requests.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Plugin or archive the request addresses.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Function name of a function-form request.
    #[must_use]
    pub fn function(&self) -> Option<&str> {
        self.function.as_deref()
    }

    /// Every argument in the order written.
    #[must_use]
    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    /// Value of the first argument called `name`, compared case-insensitively.
    #[must_use]
    pub fn argument(&self, name: &str) -> Option<&str> {
        self.arguments
            .iter()
            .find(|argument| argument.name.eq_ignore_ascii_case(name))
            .map(|argument| argument.value.as_str())
    }

    /// Arguments whose names are not recognised by the request model.
    #[must_use]
    pub const fn extra(&self) -> &BTreeMap<String, String> {
        &self.extra
    }

    /// Adds a pass-through argument unless the request already names it.
    #[must_use]
    pub fn with_extra(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.entry(name.into()).or_insert_with(|| value.into());
        self
    }

    /// Signal name of a legacy request.
    #[must_use]
    pub fn signal(&self) -> Option<&str> {
        self.signal.as_deref()
    }

    /// File path named by the source or a `path`/`file` argument.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Archive prefix of a legacy signal.
    #[must_use]
    pub fn archive(&self) -> Option<&str> {
        self.archive.as_deref()
    }

    /// Device prefix of the source.
    #[must_use]
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    /// Explicit data format.
    #[must_use]
    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    /// Segment separator.
    #[must_use]
    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Shot (experiment pulse) number.
    #[must_use]
    pub const fn shot(&self) -> Option<i64> {
        self.shot
    }

    /// Pass (processing revision) qualifier.
    #[must_use]
    pub fn pass(&self) -> Option<&str> {
        self.pass.as_deref()
    }

    /// Lower-cased extension of the file named by [`RequestModel::path`].
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        let path = self.path.as_deref()?;
        let file_name = path.rsplit('/').next().unwrap_or(path);
        let (stem, extension) = file_name.rsplit_once('.')?;
        if stem.is_empty() || extension.is_empty() {
            return None;
        }
        Some(extension.to_ascii_lowercase())
    }

    /// Name used for format-based plugin lookup: the explicit format, else
    /// the target.
    #[must_use]
    pub fn format_key(&self) -> Option<&str> {
        self.format().or_else(|| self.target())
    }

    fn apply_call(&mut self, call: &str) -> Result<(), ParseError> {
        let open = call.find('(').ok_or_else(|| ParseError::UnbalancedBrackets {
            text: call.to_owned(),
        })?;
        let inner = call
            .get(open + 1..call.len().saturating_sub(1))
            .ok_or_else(|| ParseError::UnbalancedBrackets {
                text: call.to_owned(),
            })?;
        let head = call.get(..open).unwrap_or_default().trim();

        let segments: Vec<&str> = head.split(DEFAULT_DELIMITER).map(str::trim).collect();
        let (device, target, function) = match segments.as_slice() {
            [function] => (None, None, *function),
            [target, function] => (None, Some(*target), *function),
            [device, target, function] => (Some(*device), Some(*target), *function),
            _ => {
                return Err(ParseError::InvalidTarget {
                    target: head.to_owned(),
                });
            }
        };
        for name in device.iter().chain(target.iter()) {
            if !is_identifier(name) {
                return Err(ParseError::InvalidTarget {
                    target: (*name).to_owned(),
                });
            }
        }
        if !is_identifier(function) {
            return Err(ParseError::InvalidFunction {
                function: function.to_owned(),
            });
        }

        self.device = device.map(str::to_owned);
        self.target = target.map(str::to_owned);
        self.function = Some(function.to_owned());
        for argument in parse_arguments(inner)? {
            self.apply_argument(&argument)?;
            self.arguments.push(argument);
        }
        Ok(())
    }

    fn apply_argument(&mut self, argument: &Argument) -> Result<(), ParseError> {
        let value = argument.value.clone();
        match argument.name.to_ascii_lowercase().as_str() {
            "path" | "file" => set_once(&mut self.path, value),
            "format" => set_once(&mut self.format, value),
            "device" => set_once(&mut self.device, value),
            "signal" => set_once(&mut self.signal, value),
            "source" => {
                if self.source.is_empty() {
                    self.source = value;
                }
            }
            "pass" => set_once(&mut self.pass, value),
            "shot" => {
                let shot = parse_shot(&value)?;
                if self.shot.is_none() {
                    self.shot = Some(shot);
                }
            }
            _ => {
                self.extra.entry(argument.name.clone()).or_insert(value);
            }
        }
        Ok(())
    }

    fn apply_signal(&mut self, signal: &str) {
        if signal.is_empty() {
            return;
        }
        match signal.split_once(DEFAULT_DELIMITER) {
            Some((archive, name)) if !archive.trim().is_empty() => {
                self.archive = Some(archive.trim().to_owned());
                self.target = Some(archive.trim().to_owned());
                self.signal = Some(name.trim().to_owned());
            }
            _ => self.signal = Some(signal.to_owned()),
        }
    }

    /// Applies `call` or `[device::][format::](shot[/pass] | /path | name)`.
    fn apply_source(&mut self, source: &str) -> Result<(), ParseError> {
        if source.is_empty() {
            return Ok(());
        }
        if is_call(source) && self.function.is_none() {
            return self.apply_call(source);
        }
        let invalid = || ParseError::InvalidSource {
            source_text: source.to_owned(),
        };

        let segments: Vec<&str> = source.split(DEFAULT_DELIMITER).map(str::trim).collect();
        let (prefixes, rest) = match segments.split_last() {
            Some((rest, prefixes)) => (prefixes, *rest),
            None => return Err(invalid()),
        };
        if prefixes.iter().any(|prefix| prefix.is_empty()) {
            return Err(invalid());
        }
        match prefixes {
            [] => {}
            [format] => set_once(&mut self.format, (*format).to_owned()),
            [device, format] => {
                set_once(&mut self.device, (*device).to_owned());
                set_once(&mut self.format, (*format).to_owned());
            }
            _ => return Err(invalid()),
        }

        if rest.is_empty() {
            return Ok(());
        }
        if rest.starts_with('/') {
            set_once(&mut self.path, rest.to_owned());
            return Ok(());
        }
        if let Some((shot, pass)) = split_shot(rest) {
            self.shot = self.shot.or(Some(shot));
            if let Some(revision) = pass {
                set_once(&mut self.pass, revision.to_owned());
            }
            return Ok(());
        }
        set_once(&mut self.path, rest.to_owned());
        Ok(())
    }
}

fn set_once(slot: &mut Option<String>, value: String) {
    if slot.is_none() {
        *slot = Some(value);
    }
}

fn is_call(text: &str) -> bool {
    text.ends_with(')') && text.contains('(')
}

fn is_identifier(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|character| character.is_ascii_alphanumeric() || matches!(character, '_' | '-'))
}

fn parse_shot(value: &str) -> Result<i64, ParseError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| ParseError::InvalidShot {
            value: value.to_owned(),
        })
}

/// Splits `12345` or `12345/pass` into a shot and optional pass.
fn split_shot(text: &str) -> Option<(i64, Option<&str>)> {
    let (number, pass) = match text.split_once('/') {
        Some((number, pass)) => (number, Some(pass.trim()).filter(|pass| !pass.is_empty())),
        None => (text, None),
    };
    if number.is_empty() || !number.chars().all(|character| character.is_ascii_digit()) {
        return None;
    }
    number.parse().ok().map(|shot| (shot, pass))
}

#[cfg(test)]
mod tests;
