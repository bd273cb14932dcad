//! Canonical JSON serialization
//!
//! Rules:
//! - object keys sorted byte-wise, no whitespace
//! - arrays keep element order
//! - strings are UTF-8 with the minimal JSON escape set (`"`, `\`, control
//!   characters; `\b \f \n \r \t` use their short forms, the rest `\u00xx`)
//! - integral numbers print without a fraction or exponent, `-0` prints as `0`,
//!   other floats use the shortest round-trip form

use serde::Serialize;
use serde_json::{Number, Value};

use crate::error::{CoreError, CoreResult};

/// Produces canonical bytes for a structured value
pub trait Canonicalizer {
    /// Canonicalize a JSON value
    fn canonical_json(&self, value: &Value) -> Vec<u8>;

    /// Canonicalize any serializable value
    fn canonical<T: Serialize>(&self, value: &T) -> CoreResult<Vec<u8>> {
        let value = serde_json::to_value(value)
            .map_err(|e| CoreError::Canon(format!("value is not representable as JSON: {}", e)))?;
        Ok(self.canonical_json(&value))
    }
}

/// The ledger's JSON canonicalizer
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCanonicalizer;

impl Canonicalizer for JsonCanonicalizer {
    fn canonical_json(&self, value: &Value) -> Vec<u8> {
        canonicalize(value)
    }
}

/// Canonicalize a JSON value into bytes
pub fn canonicalize(value: &Value) -> Vec<u8> {
    let mut out = Vec::with_capacity(256);
    write_value(&mut out, value);
    out
}

/// Canonicalize a JSON value into a string
pub fn canonicalize_to_string(value: &Value) -> String {
    // String contents are copied from &str and every other token is ASCII,
    // so the lossy path never substitutes.
    String::from_utf8_lossy(&canonicalize(value)).into_owned()
}

fn write_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => write_number(out, n),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(out, item);
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

            out.push(b'{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_string(out, key);
                out.push(b':');
                write_value(out, item);
            }
            out.push(b'}');
        }
    }
}

fn write_number(out: &mut Vec<u8>, n: &Number) {
    if let Some(i) = n.as_i64() {
        out.extend_from_slice(i.to_string().as_bytes());
    } else if let Some(u) = n.as_u64() {
        out.extend_from_slice(u.to_string().as_bytes());
    } else if let Some(f) = n.as_f64() {
        if f == 0.0 {
            out.push(b'0');
        } else if f.fract() == 0.0 && f.abs() < 1e21 {
            out.extend_from_slice(format!("{:.0}", f).as_bytes());
        } else {
            out.extend_from_slice(n.to_string().as_bytes());
        }
    }
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    const HEX: &[u8; 16] = b"0123456789abcdef";

    out.push(b'"');
    for &byte in s.as_bytes() {
        match byte {
            b'"' => out.extend_from_slice(b"\\\""),
            b'\\' => out.extend_from_slice(b"\\\\"),
            0x08 => out.extend_from_slice(b"\\b"),
            0x0c => out.extend_from_slice(b"\\f"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            0x00..=0x1f => {
                out.extend_from_slice(b"\\u00");
                out.push(HEX[(byte >> 4) as usize]);
                out.push(HEX[(byte & 0x0f) as usize]);
            }
            _ => out.push(byte),
        }
    }
    out.push(b'"');
}
