//! Canonical JSON encoding for payload bytes.
//!
//! Two logically equal payloads must produce byte-identical serializations,
//! because those bytes feed the link hash. The canonical form is a strict
//! JSON profile:
//!
//! - Object keys sorted lexicographically (byte order)
//! - No whitespace between tokens
//! - Integer-only numbers within signed 64-bit range
//! - Minimal string escaping (only `"`, `\`, and control characters
//!   U+0000..U+001F)
//!
//! The encoding is contractual: an implementation that diverges on key
//! order, whitespace, or number formatting computes different hashes for
//! equal payloads and cannot exchange audit bundles.

use std::fmt::Write as _;

use serde::Serialize;
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Errors that can occur during canonicalization.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CanonicalError {
    /// A floating-point number was encountered.
    ///
    /// Canonical payloads are integer-only so that the byte form is
    /// identical across platforms.
    #[error("float not allowed: canonical payloads require integer-only numbers")]
    FloatNotAllowed,

    /// A number is outside the signed 64-bit integer range.
    #[error("number out of range: {value} is outside signed 64-bit integer range")]
    NumberOutOfRange {
        /// String representation of the out-of-range number.
        value: String,
    },

    /// The value could not be converted to a JSON tree.
    #[error("serialize error: {message}")]
    Serialize {
        /// Description of the failure.
        message: String,
    },
}

/// Serializes any value to canonical JSON bytes.
///
/// The value is converted to a JSON tree first, which loses struct field
/// declaration order and yields the sorted-key form.
///
/// # Errors
///
/// Returns [`CanonicalError`] if the value cannot be represented as a JSON
/// tree or contains non-integer numbers.
pub fn canonical_payload<T: Serialize>(value: &T) -> Result<String, CanonicalError> {
    let tree = serde_json::to_value(value).map_err(|e| CanonicalError::Serialize {
        message: e.to_string(),
    })?;
    to_canonical_string(&tree)
}

/// Emits a JSON tree in canonical form.
///
/// # Errors
///
/// Returns [`CanonicalError::FloatNotAllowed`] or
/// [`CanonicalError::NumberOutOfRange`] when a number violates the
/// integer-only profile.
pub fn to_canonical_string(value: &Value) -> Result<String, CanonicalError> {
    let mut output = String::new();
    emit_value(value, &mut output)?;
    Ok(output)
}

/// Checks whether the input is already in canonical form.
#[must_use]
pub fn is_canonical(input: &str) -> bool {
    serde_json::from_str::<Value>(input)
        .ok()
        .and_then(|v| to_canonical_string(&v).ok())
        .is_some_and(|canonical| canonical == input)
}

fn emit_value(value: &Value, output: &mut String) -> Result<(), CanonicalError> {
    match value {
        Value::Null => output.push_str("null"),
        Value::Bool(b) => output.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => emit_number(n, output)?,
        Value::String(s) => emit_string(s, output),
        Value::Array(arr) => {
            output.push('[');
            for (i, item) in arr.iter().enumerate() {
                if i > 0 {
                    output.push(',');
                }
                emit_value(item, output)?;
            }
            output.push(']');
        },
        Value::Object(obj) => emit_object(obj, output)?,
    }
    Ok(())
}

fn emit_number(n: &Number, output: &mut String) -> Result<(), CanonicalError> {
    if let Some(i) = n.as_i64() {
        let _ = write!(output, "{i}");
        return Ok(());
    }
    if n.as_u64().is_some() {
        return Err(CanonicalError::NumberOutOfRange {
            value: n.to_string(),
        });
    }
    Err(CanonicalError::FloatNotAllowed)
}

/// Minimal escaping: only `"`, `\`, and U+0000..U+001F are escaped.
///
/// Control characters with short escapes use them; the rest use `\uXXXX`.
fn emit_string(s: &str, output: &mut String) {
    output.push('"');
    for c in s.chars() {
        match c {
            '"' => output.push_str("\\\""),
            '\\' => output.push_str("\\\\"),
            '\u{0008}' => output.push_str("\\b"),
            '\u{000C}' => output.push_str("\\f"),
            '\n' => output.push_str("\\n"),
            '\r' => output.push_str("\\r"),
            '\t' => output.push_str("\\t"),
            c if ('\u{0000}'..='\u{001F}').contains(&c) => {
                let _ = write!(output, "\\u{:04x}", c as u32);
            },
            c => output.push(c),
        }
    }
    output.push('"');
}

fn emit_object(obj: &Map<String, Value>, output: &mut String) -> Result<(), CanonicalError> {
    let mut sorted_keys: Vec<&String> = obj.keys().collect();
    sorted_keys.sort();

    output.push('{');
    for (i, key) in sorted_keys.iter().enumerate() {
        if i > 0 {
            output.push(',');
        }
        emit_string(key, output);
        output.push(':');
        emit_value(&obj[*key], output)?;
    }
    output.push('}');
    Ok(())
}
