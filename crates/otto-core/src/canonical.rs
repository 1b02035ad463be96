//! Canonical JSON and hashing, used by `otto-audit` for the hash chain
//! (spec.md §8: `event[i].hash = SHA256(canonical(event[i] without hash) || event[i-1].hash)`).

use sha2::{Digest, Sha256};

/// Serialize a value with object keys sorted recursively, so that two
/// logically-equal values always produce byte-identical JSON regardless of
/// field declaration order or map iteration order.
pub fn canonical_json(value: &serde_json::Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key).expect("string always serializes"));
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

/// `SHA256(canonical_json(value) || prev)` hex-encoded, the primitive behind
/// the audit hash chain.
pub fn chained_hash(value: &serde_json::Value, prev: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(value).as_bytes());
    hasher.update(prev.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_affect_canonical_form() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn chained_hash_is_deterministic() {
        let v = json!({"action": "x"});
        assert_eq!(chained_hash(&v, "root"), chained_hash(&v, "root"));
        assert_ne!(chained_hash(&v, "root"), chained_hash(&v, "other"));
    }
}
