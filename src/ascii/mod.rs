//! ASCII request/response framing.
//!
//! Bodies are a sequence of `key=value` lines, one per field, each terminated
//! by a single newline. Byte fields are lowercase hex, integers are decimal.
//! The framing is strict: unknown keys, missing keys, duplicate singleton
//! keys, unterminated lines, and surrounding whitespace are all rejected.
//! Witnesses and submitters construct these bodies by hand, so the encoding
//! must stay stable byte for byte.
//!
//! List-valued fields repeat the same key once per element, in order.

use std::collections::BTreeMap;
use std::collections::VecDeque;

/// Error produced while parsing or interpreting an ASCII body.
#[derive(Debug, thiserror::Error)]
pub enum AsciiError {
    #[error("body is not valid UTF-8")]
    NotUtf8,

    #[error("line not terminated by newline")]
    UnterminatedLine,

    #[error("malformed line: missing '='")]
    MissingDelimiter,

    #[error("malformed line: empty key")]
    EmptyKey,

    #[error("malformed line: surrounding whitespace")]
    Whitespace,

    #[error("missing key: {0}")]
    MissingKey(&'static str),

    #[error("unexpected key: {0}")]
    UnexpectedKey(String),

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

impl AsciiError {
    pub(crate) fn value(key: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key,
            reason: reason.into(),
        }
    }
}

/// A parsed ASCII body: ordered `(key, value)` pairs.
#[derive(Debug, Default)]
pub struct Document {
    pairs: Vec<(String, String)>,
}

impl Document {
    /// Parse a raw body.
    pub fn parse(buf: &[u8]) -> Result<Self, AsciiError> {
        let text = std::str::from_utf8(buf).map_err(|_| AsciiError::NotUtf8)?;
        if text.is_empty() {
            return Ok(Self::default());
        }
        let body = text.strip_suffix('\n').ok_or(AsciiError::UnterminatedLine)?;

        let mut pairs = Vec::new();
        for line in body.split('\n') {
            let (key, value) = line.split_once('=').ok_or(AsciiError::MissingDelimiter)?;
            if key.is_empty() {
                return Err(AsciiError::EmptyKey);
            }
            if key.trim() != key || value.trim() != value {
                return Err(AsciiError::Whitespace);
            }
            pairs.push((key.to_string(), value.to_string()));
        }
        Ok(Self { pairs })
    }

    /// Ordered pairs, for list-of-group decoding.
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Group pairs by key for field-at-a-time decoding.
    pub fn into_fields(self) -> FieldMap {
        let mut fields: BTreeMap<String, VecDeque<String>> = BTreeMap::new();
        for (key, value) in self.pairs {
            fields.entry(key).or_default().push_back(value);
        }
        FieldMap { fields }
    }
}

/// Fields of a parsed body, consumed key by key.
///
/// [`FieldMap::done`] enforces that every key was consumed, which is how
/// unknown and duplicated keys are rejected.
#[derive(Debug)]
pub struct FieldMap {
    fields: BTreeMap<String, VecDeque<String>>,
}

impl FieldMap {
    /// Take the single value for a required key.
    pub fn take(&mut self, key: &'static str) -> Result<String, AsciiError> {
        let values = self.fields.get_mut(key).ok_or(AsciiError::MissingKey(key))?;
        let value = values.pop_front().ok_or(AsciiError::MissingKey(key))?;
        if values.is_empty() {
            self.fields.remove(key);
        }
        Ok(value)
    }

    /// Take every value for a repeated key, possibly none.
    pub fn take_all(&mut self, key: &str) -> Vec<String> {
        self.fields
            .remove(key)
            .map(|v| v.into_iter().collect())
            .unwrap_or_default()
    }

    /// Fail if any field was left unconsumed.
    pub fn done(self) -> Result<(), AsciiError> {
        match self.fields.into_keys().next() {
            Some(key) => Err(AsciiError::UnexpectedKey(key)),
            None => Ok(()),
        }
    }
}

/// Append one `key=value` line with a decimal integer value.
pub fn write_int(out: &mut String, key: &str, value: u64) {
    out.push_str(key);
    out.push('=');
    out.push_str(&value.to_string());
    out.push('\n');
}

/// Append one `key=value` line with a lowercase hex value.
pub fn write_hex(out: &mut String, key: &str, bytes: &[u8]) {
    out.push_str(key);
    out.push('=');
    out.push_str(&hex::encode(bytes));
    out.push('\n');
}

/// Append one `key=value` line with a raw string value.
pub fn write_str(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    out.push('=');
    out.push_str(value);
    out.push('\n');
}

/// Parse a strictly-decimal unsigned integer.
pub fn parse_u64(key: &'static str, value: &str) -> Result<u64, AsciiError> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AsciiError::value(key, "expected a decimal integer"));
    }
    value
        .parse::<u64>()
        .map_err(|e| AsciiError::value(key, e.to_string()))
}

/// Parse a fixed-size hex-encoded byte array.
pub fn parse_array<const N: usize>(key: &'static str, value: &str) -> Result<[u8; N], AsciiError> {
    let bytes = hex::decode(value).map_err(|e| AsciiError::value(key, e.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| AsciiError::value(key, format!("expected {} bytes", N)))
}
