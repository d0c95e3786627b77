use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::CacheError;

pub type CacheKey = String;

/// Deterministic key for `(tool, params)`.
///
/// Semantically equal parameter maps produce the same key regardless of
/// insertion order, at any nesting depth.
pub fn make_key<P>(tool: &str, params: &P) -> Result<CacheKey, CacheError>
where
    P: Serialize + ?Sized,
{
    let value = serde_json::to_value(params)?;
    let canonical = serde_json::to_string(&canonicalize(&value))?;

    let mut hasher = Sha256::new();
    hasher.update(tool.as_bytes());
    hasher.update(b"\n");
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Rebuild every object with its keys in sorted order.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            let mut sorted = Map::new();
            for k in keys {
                sorted.insert(k.clone(), canonicalize(&map[k]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
