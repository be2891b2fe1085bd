//! Deterministic job identity (spec §4.1).
//!
//! Two submissions of the same `job_type` with deep-equal `input_params` must
//! hash identically regardless of object key order. We get there by
//! re-serializing `input_params` into a canonical form — object keys sorted
//! lexicographically at every depth, arrays left in their given order,
//! scalars left as their native JSON encoding — and hashing the canonical
//! bytes with SHA-256.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Re-serialize a JSON value with object keys sorted at every nesting depth.
///
/// `serde_json::Value::Object` is backed by a `BTreeMap` by default (unless
/// the `preserve_order` feature is enabled), which already sorts keys: this
/// function exists so that invariant is explicit and doesn't silently break
/// if a future dependency bump turns on `preserve_order` elsewhere in the
/// dependency graph.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = serde_json::Map::new();
            for k in keys {
                sorted.insert(k.clone(), canonicalize(&map[k]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Hash `(job_type, input_params)` into the lowercase-hex job_hash.
pub fn job_hash(job_type: &str, input_params: &Value) -> String {
    let canonical = canonicalize(input_params);
    let payload = serde_json::json!({
        "job_type": job_type,
        "input_params": canonical,
    });
    let bytes = serde_json::to_vec(&payload).expect("json values always serialize");
    format!("{:x}", Sha256::digest(&bytes))
}

/// A fresh opaque id in UUID v4 hyphenated-hex shape.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn same_type_and_deep_equal_params_same_order_hash_equal() {
        let a = job_hash("render", &json!({"a": 1, "b": 2}));
        let b = job_hash("render", &json!({"a": 1, "b": 2}));
        assert_eq!(a, b);
    }

    #[test]
    fn shuffled_keys_hash_equal() {
        let a = job_hash("render", &json!({"a": 1, "b": 2, "c": {"x": 1, "y": 2}}));
        let b = job_hash("render", &json!({"c": {"y": 2, "x": 1}, "b": 2, "a": 1}));
        assert_eq!(a, b);
    }

    #[test]
    fn different_job_type_hashes_differ() {
        let a = job_hash("render", &json!({"a": 1}));
        let b = job_hash("transcode", &json!({"a": 1}));
        assert_ne!(a, b);
    }

    #[test]
    fn array_order_is_significant() {
        let a = job_hash("t", &json!({"items": [1, 2, 3]}));
        let b = job_hash("t", &json!({"items": [3, 2, 1]}));
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_lowercase_hex_sha256_length() {
        let h = job_hash("t", &json!({}));
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn new_id_looks_like_uuid_v4() {
        let id = new_id();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 5);
        assert_eq!(id.len(), 36);
    }

    #[test]
    fn new_id_is_unique_across_calls() {
        let a = new_id();
        let b = new_id();
        assert_ne!(a, b);
    }

    proptest! {
        /// For any pair of objects built from the same key/value pairs in
        /// different insertion orders, the canonical hash is identical —
        /// the universal invariant from spec §8 item 6.
        #[test]
        fn prop_key_order_never_changes_hash(
            mut pairs in prop::collection::vec(("[a-z]{1,6}", any::<i64>()), 1..12)
        ) {
            pairs.sort_by(|a, b| a.0.cmp(&b.0));
            pairs.dedup_by(|a, b| a.0 == b.0);
            let forward: serde_json::Map<String, Value> =
                pairs.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
            let mut reversed = pairs.clone();
            reversed.reverse();
            let backward: serde_json::Map<String, Value> =
                reversed.iter().map(|(k, v)| (k.clone(), json!(v))).collect();

            let h1 = job_hash("t", &Value::Object(forward));
            let h2 = job_hash("t", &Value::Object(backward));
            prop_assert_eq!(h1, h2);
        }
    }
}
