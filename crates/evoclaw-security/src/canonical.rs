//! Deterministic JSON serialization for signed payloads.
//!
//! Hand-rolled over `serde_json::Value` rather than adding a canonicalization
//! crate, matching the corpus's preference for small local helpers over new
//! dependencies for narrow concerns.

use serde::Serialize;
use serde_json::Value;

/// Render `value` as bytes with object keys sorted alphabetically (recursively)
/// and arrays sorted by their own canonical string form, so two semantically
/// equal payloads always produce identical bytes regardless of field or
/// insertion order.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    let v = serde_json::to_value(value).expect("canonical_bytes: value must serialize");
    canonicalize(&v).to_string().into_bytes()
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> =
                map.iter().map(|(k, v)| (k.clone(), canonicalize(v))).collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().collect())
        }
        Value::Array(items) => {
            let mut canon: Vec<Value> = items.iter().map(canonicalize).collect();
            canon.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
            Value::Array(canon)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_affect_output() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(canonical_bytes(&a), canonical_bytes(&b));
    }

    #[test]
    fn array_order_does_not_affect_output() {
        let a = json!({"list": ["b", "a", "c"]});
        let b = json!({"list": ["a", "c", "b"]});
        assert_eq!(canonical_bytes(&a), canonical_bytes(&b));
    }

    #[test]
    fn changing_a_value_changes_the_output() {
        let a = json!({"max_loss_usd": 500});
        let b = json!({"max_loss_usd": 999999});
        assert_ne!(canonical_bytes(&a), canonical_bytes(&b));
    }
}
