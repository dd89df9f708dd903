//! Deterministic record encoding.
//!
//! Signer and verifier canonicalize independently, so the encoding must not
//! depend on field construction order or on how `serde_json` was compiled
//! (the `preserve_order` feature changes `Map` iteration order). Keys are
//! therefore sorted explicitly here at every nesting level.
//!
//! Rules:
//! - object keys sorted by byte order, recursively
//! - compact output, scalars formatted by `serde_json`
//! - top-level `signature` and `signed_at` are excluded
//! - top-level `null` values are omitted
//!
//! Because of the last rule, a signer that keeps `"expires_at":null` in the
//! bytes it signs produces signatures that never verify here. Other signers
//! must drop top-level nulls (or leave the fields out) before signing.

use serde::Serialize;
use serde_json::Value;

use crate::errors::KeywardResult;

/// Top-level fields that are attached after signing and never signed.
pub const UNSIGNED_FIELDS: [&str; 2] = ["signature", "signed_at"];

/// Canonical encoding of any serializable record.
pub fn canonicalize<T: Serialize>(record: &T) -> KeywardResult<String> {
    let value = serde_json::to_value(record)?;
    canonicalize_value(&value)
}

/// Canonical encoding of a raw wire record.
pub fn canonicalize_value(value: &Value) -> KeywardResult<String> {
    let mut out = String::new();
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map
                .iter()
                .filter(|(k, v)| !UNSIGNED_FIELDS.contains(&k.as_str()) && !v.is_null())
                .map(|(k, _)| k)
                .collect();
            keys.sort();

            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_value(&mut out, &map[key.as_str()])?;
            }
            out.push('}');
        }
        other => write_value(&mut out, other)?,
    }
    Ok(out)
}

fn write_value(out: &mut String, value: &Value) -> KeywardResult<()> {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_value(out, v)?;
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item)?;
            }
            out.push(']');
        }
        scalar => out.push_str(&serde_json::to_string(scalar)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_sorted() {
        let encoded = canonicalize_value(&json!({"b": 1, "a": "x", "c": true})).unwrap();
        assert_eq!(encoded, r#"{"a":"x","b":1,"c":true}"#);
    }

    #[test]
    fn construction_order_does_not_matter() {
        let first: Value =
            serde_json::from_str(r#"{"device_id":"d1","plan_type":"personal","max_devices":1}"#)
                .unwrap();
        let second: Value =
            serde_json::from_str(r#"{"max_devices":1,"plan_type":"personal","device_id":"d1"}"#)
                .unwrap();

        assert_eq!(
            canonicalize_value(&first).unwrap(),
            canonicalize_value(&second).unwrap()
        );
    }

    #[test]
    fn signature_fields_and_nulls_are_excluded() {
        let encoded = canonicalize_value(&json!({
            "device_id": "d1",
            "expires_at": null,
            "signature": "abcd",
            "signed_at": "2024-01-01T00:00:00.000Z"
        }))
        .unwrap();
        assert_eq!(encoded, r#"{"device_id":"d1"}"#);
    }

    #[test]
    fn nested_objects_are_sorted_too() {
        let encoded =
            canonicalize_value(&json!({"meta": {"z": 1, "a": [ {"y": 2, "b": 3} ]}})).unwrap();
        assert_eq!(encoded, r#"{"meta":{"a":[{"b":3,"y":2}],"z":1}}"#);
    }

    #[test]
    fn strings_are_escaped() {
        let encoded = canonicalize_value(&json!({"name": "a\"b"})).unwrap();
        assert_eq!(encoded, r#"{"name":"a\"b"}"#);
    }
}
