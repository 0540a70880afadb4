//! Value definitions
//!
//! The single currency for command arguments and raw results.

use bytes::Bytes;

use crate::error::{PipeError, Result};

/// A raw backend value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing key / missing field
    Nil,

    /// Integer reply
    Int(i64),

    /// Bulk string reply
    Bytes(Bytes),

    /// Multi-bulk reply
    Array(Vec<Value>),

    /// Status reply (e.g. "OK", "PONG")
    Status(String),

    /// Per-command failure, only delivered when the batch does not raise
    Error(String),
}

impl Value {
    /// The "OK" status reply
    pub fn ok() -> Self {
        Value::Status("OK".to_string())
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Bytes view of a scalar. Integers render as decimal text.
    pub fn as_bytes(&self) -> Option<Bytes> {
        match self {
            Value::Bytes(b) => Some(b.clone()),
            Value::Int(i) => Some(Bytes::from(i.to_string())),
            Value::Status(s) => Some(Bytes::from(s.clone())),
            _ => None,
        }
    }

    /// Integer view; bulk strings are parsed as decimal
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bytes(b) => std::str::from_utf8(b).ok()?.parse().ok(),
            _ => None,
        }
    }

    /// UTF-8 view of a bulk string or status
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Bytes(b) => std::str::from_utf8(b).ok(),
            Value::Status(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Convert into a command argument
    ///
    /// Only scalars can be sent to the backend.
    pub fn to_arg(&self) -> Result<Bytes> {
        match self {
            Value::Nil => Err(PipeError::InvalidArgument("nil is not a valid argument".to_string())),
            Value::Array(_) => Err(PipeError::InvalidArgument("nested arrays are not valid arguments".to_string())),
            Value::Error(e) => Err(PipeError::InvalidArgument(format!("error value as argument: {}", e))),
            other => other
                .as_bytes()
                .ok_or_else(|| PipeError::InvalidArgument(format!("{:?}", other))),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Bytes(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Bytes(Bytes::from(s))
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bytes(Bytes::copy_from_slice(b))
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(Bytes::from(b))
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Value::Bytes(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Bytes(Bytes::from(format_score(f)))
    }
}

/// Render a score the way the backend echoes it back
pub fn format_score(score: f64) -> String {
    if score.fract() == 0.0 && score.abs() < 1e17 {
        format!("{}", score as i64)
    } else {
        format!("{}", score)
    }
}
