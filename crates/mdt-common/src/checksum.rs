//! Canonical JSON serialization and content hashing
//!
//! Case documents are compared across poll cycles by a SHA-512 digest of their
//! canonical form. Object keys are sorted recursively and output is compact,
//! so two documents that differ only in key order hash identically.

use crate::error::Result;
use serde_json::Value;
use sha2::{Digest, Sha512};

/// Serialize a JSON value with recursively sorted object keys and no whitespace
pub fn canonical_json(value: &Value) -> Result<String> {
    let mut out = String::new();
    write_canonical(value, &mut out)?;
    Ok(out)
}

fn write_canonical(value: &Value, out: &mut String) -> Result<()> {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, child)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_canonical(child, out)?;
            }
            out.push('}');
        },
        Value::Array(items) => {
            out.push('[');
            for (i, child) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(child, out)?;
            }
            out.push(']');
        },
        scalar => out.push_str(&serde_json::to_string(scalar)?),
    }
    Ok(())
}

/// SHA-512 hex digest of the canonical form of `value`
pub fn content_hash(value: &Value) -> Result<String> {
    let canonical = canonical_json(value)?;
    let mut hasher = Sha512::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}
