//! Input coercion for values typed on a command line.
//!
//! Shell users can only pass text, so `vartunnel set` converts its argument
//! (or standard input) according to a [`ValueFormat`] before storing it.
//! Numeric formats are lenient: they take the longest numeric prefix and
//! ignore whatever follows, so `"22ab"` becomes `22`.

use std::fmt;
use std::str::FromStr;

use serde_json::{Number, Value};

/// How to interpret a textual value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueFormat {
    #[default]
    String,
    Integer,
    Float,
    Boolean,
    Json,
}

/// Errors from coercing input text.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("Unable to parse input: '{0}' is not an integer")]
    Integer(String),

    #[error("Unable to parse input: '{0}' is not a number")]
    Float(String),

    #[error("Unable to parse input: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown format '{0}' (expected string, integer, float, boolean, or json)")]
    UnknownFormat(String),
}

impl ValueFormat {
    pub const ALL: [ValueFormat; 5] = [
        ValueFormat::String,
        ValueFormat::Integer,
        ValueFormat::Float,
        ValueFormat::Boolean,
        ValueFormat::Json,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ValueFormat::String => "string",
            ValueFormat::Integer => "integer",
            ValueFormat::Float => "float",
            ValueFormat::Boolean => "boolean",
            ValueFormat::Json => "json",
        }
    }

    /// Convert `input` into a JSON value.
    pub fn coerce(self, input: &str) -> Result<Value, FormatError> {
        match self {
            ValueFormat::String => Ok(Value::String(input.to_string())),
            ValueFormat::Integer => parse_integer_prefix(input),
            ValueFormat::Float => parse_float_prefix(input),
            ValueFormat::Boolean => Ok(Value::Bool(matches!(input, "true" | "1"))),
            ValueFormat::Json => Ok(serde_json::from_str(input)?),
        }
    }
}

impl fmt::Display for ValueFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ValueFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| FormatError::UnknownFormat(s.to_string()))
    }
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

fn sign_len(bytes: &[u8]) -> usize {
    usize::from(matches!(bytes.first(), Some(b'+' | b'-')))
}

fn parse_integer_prefix(input: &str) -> Result<Value, FormatError> {
    let text = input.trim_start();
    let bytes = text.as_bytes();
    let start = sign_len(bytes);
    let digits = count_digits(&bytes[start..]);
    if digits == 0 {
        return Err(FormatError::Integer(input.to_string()));
    }

    let literal = &text[..start + digits];
    if let Ok(n) = literal.parse::<i64>() {
        return Ok(Value::Number(n.into()));
    }
    // Too wide for i64: keep the magnitude as a float.
    literal
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| FormatError::Integer(input.to_string()))
}

fn parse_float_prefix(input: &str) -> Result<Value, FormatError> {
    let text = input.trim_start();
    let bytes = text.as_bytes();

    let mut end = sign_len(bytes);
    let int_digits = count_digits(&bytes[end..]);
    end += int_digits;

    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = count_digits(&bytes[end + 1..]);
        if int_digits + frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits + frac_digits == 0 {
        return Err(FormatError::Float(input.to_string()));
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let exp_start = end + 1 + sign_len(&bytes[end + 1..]);
        let exp_digits = count_digits(&bytes[exp_start..]);
        if exp_digits > 0 {
            end = exp_start + exp_digits;
        }
    }

    text[..end]
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| FormatError::Float(input.to_string()))
}
