//! Request fingerprinting
//!
//! Two hashes with very different jobs live here:
//! - [`canonical_json_hash`] fingerprints a request body for idempotency
//!   conflict detection (stable across JSON object-key order),
//! - [`fnv1a32_percent`] buckets a request id into 0..100 for the
//!   deterministic cross-zone throttle gate.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Hash a JSON value with stable object-key order.
///
/// Equal logical values produce equal hashes regardless of how the maps
/// were ordered on the wire. Output is lowercase hex SHA-256.
pub fn canonical_json_hash(v: &Value) -> Result<String, serde_json::Error> {
    let canon = canonicalize(v);
    let bytes = serde_json::to_vec(&canon)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

fn canonicalize(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = serde_json::Map::with_capacity(map.len());
            for k in keys {
                out.insert(k.clone(), canonicalize(&map[k]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        _ => v.clone(),
    }
}

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// FNV-1a (32-bit) of `s`, reduced mod 100.
///
/// The same request id always lands in the same bucket, which makes the
/// throttle gate reproducible across retries and across processes.
pub fn fnv1a32_percent(s: &str) -> u32 {
    let mut h = FNV_OFFSET_BASIS;
    for b in s.as_bytes() {
        h ^= u32::from(*b);
        h = h.wrapping_mul(FNV_PRIME);
    }
    h % 100
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_hash_stable_map_order() {
        let a = json!({"b": 2, "a": 1});
        let b = json!({"a": 1, "b": 2});
        assert_eq!(
            canonical_json_hash(&a).unwrap(),
            canonical_json_hash(&b).unwrap()
        );
    }

    #[test]
    fn test_canonical_hash_nested_maps() {
        let a = json!({"outer": {"y": [1, 2], "x": {"k": "v"}}, "n": null});
        let b = json!({"n": null, "outer": {"x": {"k": "v"}, "y": [1, 2]}});
        assert_eq!(
            canonical_json_hash(&a).unwrap(),
            canonical_json_hash(&b).unwrap()
        );
    }

    #[test]
    fn test_canonical_hash_distinguishes_values() {
        let a = json!({"amount_units": 120});
        let b = json!({"amount_units": 121});
        assert_ne!(
            canonical_json_hash(&a).unwrap(),
            canonical_json_hash(&b).unwrap()
        );
    }

    #[test]
    fn test_canonical_hash_array_order_significant() {
        let a = json!([1, 2, 3]);
        let b = json!([3, 2, 1]);
        assert_ne!(
            canonical_json_hash(&a).unwrap(),
            canonical_json_hash(&b).unwrap()
        );
    }

    #[test]
    fn test_fnv_bucket_deterministic() {
        let one = fnv1a32_percent("r-12345");
        for _ in 0..10 {
            assert_eq!(fnv1a32_percent("r-12345"), one);
        }
    }

    #[test]
    fn test_fnv_bucket_range() {
        for i in 0..1000 {
            let bucket = fnv1a32_percent(&format!("request-{i}"));
            assert!(bucket < 100);
        }
    }

    #[test]
    fn test_fnv_known_vector() {
        // FNV-1a 32-bit of "a" is 0xe40c292c; 3826002220 % 100 == 20.
        assert_eq!(fnv1a32_percent("a"), 20);
        // Empty input hashes to the offset basis; 2166136261 % 100 == 61.
        assert_eq!(fnv1a32_percent(""), 61);
    }
}
