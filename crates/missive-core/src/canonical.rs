//! Canonical JSON encoding for content hashing and signature payloads.
//!
//! Every hash and signature in the protocol is computed over this encoding,
//! so two nodes that disagree about a single byte of it would silently fork
//! their logs. The profile is deliberately strict:
//!
//! - **Deterministic key ordering**: object keys are emitted in
//!   lexicographic (byte-order) order.
//! - **No insignificant whitespace** between tokens.
//! - **Integer-only numbers**: floats are rejected. Numbers must fit the
//!   signed 64-bit range so every implementation agrees on their textual
//!   form.
//! - **Depth cap**: structures nested deeper than [`MAX_DEPTH`] levels are
//!   rejected before any recursion can overflow the stack.
//!
//! String escaping reuses `serde_json`'s emitter, which produces the minimal
//! escape set (quote, backslash, control characters) and is stable across
//! releases.

use std::fmt::Write as _;

use serde_json::{Number, Value};
use thiserror::Error;

/// Maximum nesting depth accepted by the canonicalizer.
pub const MAX_DEPTH: usize = 128;

/// Errors produced while canonicalizing a JSON value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CanonicalError {
    /// A floating-point number was encountered.
    ///
    /// Float formatting differs between JSON emitters, so floats are
    /// excluded from the canonical profile entirely.
    #[error("float not allowed in canonical form")]
    FloatNotAllowed,

    /// A number is outside the signed 64-bit integer range.
    #[error("number out of range: {value} does not fit in a signed 64-bit integer")]
    NumberOutOfRange {
        /// Textual form of the offending number.
        value: String,
    },

    /// The value is nested deeper than [`MAX_DEPTH`] levels.
    #[error("max depth exceeded: value nested deeper than {max_depth} levels")]
    MaxDepthExceeded {
        /// The depth limit that was exceeded.
        max_depth: usize,
    },
}

/// Canonicalizes a JSON value into its deterministic textual form.
///
/// The output is the byte sequence that content hashes and signature
/// payloads are computed over. The same logical value always produces the
/// same output regardless of how it was constructed.
///
/// # Errors
///
/// Returns [`CanonicalError`] if the value contains floats, numbers outside
/// the i64 range, or exceeds the nesting depth cap.
pub fn to_canonical_json(value: &Value) -> Result<String, CanonicalError> {
    validate_value(value, 0)?;
    let mut output = String::new();
    emit_value(value, &mut output);
    Ok(output)
}

/// Recursively validates a value against the canonical profile.
fn validate_value(value: &Value, depth: usize) -> Result<(), CanonicalError> {
    if depth > MAX_DEPTH {
        return Err(CanonicalError::MaxDepthExceeded {
            max_depth: MAX_DEPTH,
        });
    }

    match value {
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(()),
        Value::Number(n) => validate_number(n),
        Value::Array(items) => {
            for item in items {
                validate_value(item, depth + 1)?;
            }
            Ok(())
        }
        Value::Object(fields) => {
            for field in fields.values() {
                validate_value(field, depth + 1)?;
            }
            Ok(())
        }
    }
}

/// Validates that a number is an integer within i64 range.
fn validate_number(n: &Number) -> Result<(), CanonicalError> {
    if n.as_i64().is_some() {
        return Ok(());
    }
    if n.as_u64().is_some() {
        // u64 values above i64::MAX have no agreed-upon representation on
        // the signing side.
        return Err(CanonicalError::NumberOutOfRange {
            value: n.to_string(),
        });
    }
    Err(CanonicalError::FloatNotAllowed)
}

/// Emits a validated value in canonical form.
fn emit_value(value: &Value, output: &mut String) {
    match value {
        Value::Null => output.push_str("null"),
        Value::Bool(b) => output.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => {
            // Validation guarantees an i64 here.
            if let Some(i) = n.as_i64() {
                let _ = write!(output, "{i}");
            }
        }
        Value::String(s) => emit_string(s, output),
        Value::Array(items) => {
            output.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    output.push(',');
                }
                emit_value(item, output);
            }
            output.push(']');
        }
        Value::Object(fields) => {
            output.push('{');
            let mut keys: Vec<&String> = fields.keys().collect();
            keys.sort_unstable();
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    output.push(',');
                }
                emit_string(key, output);
                output.push(':');
                emit_value(&fields[key.as_str()], output);
            }
            output.push('}');
        }
    }
}

/// Emits a string with minimal escaping.
fn emit_string(s: &str, output: &mut String) {
    // serde_json's string emitter is deterministic and escapes exactly the
    // required set; serializing a bare string cannot fail.
    if let Ok(escaped) = serde_json::to_string(s) {
        output.push_str(&escaped);
    }
}
