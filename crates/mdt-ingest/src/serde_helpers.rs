//! Lenient field decoders for upstream JSON
//!
//! The CIP API is inconsistent about scalar types across schema versions
//! (ids arrive as numbers or strings, lists arrive as `null`).

use serde::{Deserialize, Deserializer};
use serde_json::Value;

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let shown = value.to_string();
    scalar_to_string(value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected string or number, got {}", shown)))
}

pub(crate) fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        other => {
            let shown = other.to_string();
            scalar_to_string(other).map(Some).ok_or_else(|| {
                serde::de::Error::custom(format!("expected string or number, got {}", shown))
            })
        },
    }
}

/// `null` decodes to `T::default()`
pub(crate) fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Integer given as a JSON number or a numeric string
pub(crate) fn flexible_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| serde::de::Error::custom(format!("expected integer, got {}", n))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("expected integer, got {:?}", s))),
        other => Err(serde::de::Error::custom(format!("expected integer, got {}", other))),
    }
}

/// Float from a number or numeric string; anything else is absent
pub(crate) fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
