//! Canonical JSON and content hashing.
//!
//! Every digest the engine produces goes through [`canonical_json`]:
//! object keys are sorted recursively by UTF-16 code units, integer-valued
//! floats are rendered as integers, arrays keep their order and the output
//! is compact. Two payloads that differ only in key order hash identically.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::domain::error::{GovernanceError, Result};

/// Length of a hex-encoded SHA-256 digest.
pub const DIGEST_HEX_LEN: usize = 64;

fn write_canonical(value: &serde_json::Value, out: &mut String) -> Result<()> {
    match value {
        serde_json::Value::Object(map) => {
            // serde_json::Map iterates in UTF-8 byte order; re-sort by UTF-16 units
            let mut entries: Vec<(&String, &serde_json::Value)> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.encode_utf16().cmp(b.encode_utf16()));

            out.push('{');
            for (i, (key, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_canonical(v, out)?;
            }
            out.push('}');
        }
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, v) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(v, out)?;
            }
            out.push(']');
        }
        scalar => out.push_str(&serde_json::to_string(scalar)?),
    }
    Ok(())
}

fn normalize_number(n: &serde_json::Number) -> Result<serde_json::Number> {
    if n.is_i64() || n.is_u64() {
        return Ok(n.clone());
    }
    let Some(f) = n.as_f64() else {
        return Ok(n.clone());
    };
    if !f.is_finite() {
        return Err(GovernanceError::Canonicalization(
            "NaN/Infinity cannot be hashed".to_string(),
        ));
    }
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Ok(serde_json::Number::from(f as i64))
    } else {
        Ok(n.clone())
    }
}

fn normalize_value(value: &serde_json::Value) -> Result<serde_json::Value> {
    Ok(match value {
        serde_json::Value::Object(map) => {
            let mut normalized = serde_json::Map::new();
            for (k, v) in map {
                normalized.insert(k.clone(), normalize_value(v)?);
            }
            serde_json::Value::Object(normalized)
        }
        serde_json::Value::Array(items) => serde_json::Value::Array(
            items.iter().map(normalize_value).collect::<Result<Vec<_>>>()?,
        ),
        serde_json::Value::Number(n) => serde_json::Value::Number(normalize_number(n)?),
        other => other.clone(),
    })
}

/// Render `value` in canonical form.
pub fn canonical_json(value: &serde_json::Value) -> Result<String> {
    let normalized = normalize_value(value)?;
    let mut out = String::new();
    write_canonical(&normalized, &mut out)?;
    Ok(out)
}

/// SHA-256 hex digest of the canonical form of `value`.
pub fn compute_digest(value: &serde_json::Value) -> Result<String> {
    let canonical = canonical_json(value)?;
    Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
}

/// Hash any serializable input.
///
/// Input that cannot be represented as JSON (for example a map with
/// non-string keys) is rejected with a serialization error before any
/// hashing happens.
pub fn hash<T: Serialize + ?Sized>(input: &T) -> Result<String> {
    let value = serde_json::to_value(input)?;
    compute_digest(&value)
}

/// Whether `s` looks like a hex SHA-256 digest.
pub fn is_hex_digest(s: &str) -> bool {
    s.len() == DIGEST_HEX_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}
