//! Canonical serializer.
//!
//! Encodes a `CanonicalValue` as compact JSON: object keys in code-point
//! order at every level, arrays in their original order, no whitespace,
//! explicit `null`.  Two conformant encoders given the same logical value
//! produce byte-identical output; chains hashed by one verify under the
//! other.
//!
//! Strings use serde_json's escaping (`"` `\` and control characters
//! escaped, everything else emitted as raw UTF-8).

use chainproof_contracts::{CanonicalValue, ChainproofError, ChainproofResult};

/// Encode `value` into its canonical byte form.
pub fn to_canonical_bytes(value: &CanonicalValue) -> ChainproofResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| ChainproofError::Serialization {
        reason: format!("canonical encoding failed: {e}"),
    })
}

/// Encode `value` and return it as a `String`.
pub fn to_canonical_string(value: &CanonicalValue) -> ChainproofResult<String> {
    let bytes = to_canonical_bytes(value)?;
    String::from_utf8(bytes).map_err(|e| ChainproofError::Serialization {
        reason: format!("canonical encoding is not UTF-8: {e}"),
    })
}

/// Parse JSON bytes into a `CanonicalValue`.
///
/// Rejects duplicate keys, fractional or non-finite numbers, and integers
/// outside the `i64` range.  Re-encoding the result of parsing canonical
/// bytes yields the same bytes.
pub fn from_canonical_slice(bytes: &[u8]) -> ChainproofResult<CanonicalValue> {
    serde_json::from_slice(bytes).map_err(|e| ChainproofError::Serialization {
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn obj(pairs: Vec<(&str, CanonicalValue)>) -> CanonicalValue {
        CanonicalValue::try_object(pairs).unwrap()
    }

    #[test]
    fn keys_are_sorted_at_every_level() {
        let value = obj(vec![
            ("zeta", obj(vec![("b", 2.into()), ("a", 1.into())])),
            ("alpha", CanonicalValue::Null),
        ]);
        assert_eq!(
            to_canonical_string(&value).unwrap(),
            r#"{"alpha":null,"zeta":{"a":1,"b":2}}"#
        );
    }

    #[test]
    fn arrays_keep_their_order() {
        let value = CanonicalValue::from(vec![3, 1, 2]);
        assert_eq!(to_canonical_string(&value).unwrap(), "[3,1,2]");
    }

    #[test]
    fn key_order_follows_code_points_not_locale() {
        // 'Z' (U+005A) < 'a' (U+0061) < 'é' (U+00E9) < '中' (U+4E2D)
        let value = obj(vec![
            ("中", 4.into()),
            ("é", 3.into()),
            ("a", 2.into()),
            ("Z", 1.into()),
        ]);
        assert_eq!(
            to_canonical_string(&value).unwrap(),
            r#"{"Z":1,"a":2,"é":3,"中":4}"#
        );
    }

    #[test]
    fn null_is_emitted_explicitly() {
        let value = obj(vec![("case_id", CanonicalValue::Null)]);
        assert_eq!(to_canonical_string(&value).unwrap(), r#"{"case_id":null}"#);
    }

    #[test]
    fn strings_are_escaped_and_utf8() {
        let value = CanonicalValue::from("line\n\"quoted\" ✓");
        let bytes = to_canonical_bytes(&value).unwrap();
        assert_eq!(bytes, "\"line\\n\\\"quoted\\\" ✓\"".as_bytes());
        assert!(std::str::from_utf8(&bytes).is_ok());
    }

    #[test]
    fn whitespace_in_input_does_not_survive() {
        let parsed = from_canonical_slice(b"{ \"b\" : [ 1 , 2 ] ,\n \"a\" : true }").unwrap();
        assert_eq!(
            to_canonical_string(&parsed).unwrap(),
            r#"{"a":true,"b":[1,2]}"#
        );
    }

    #[test]
    fn parse_rejects_duplicate_keys() {
        let err = from_canonical_slice(br#"{"a":{"x":1,"x":1}}"#).unwrap_err();
        match err {
            ChainproofError::Serialization { reason } => {
                assert!(reason.contains("duplicate"), "got: {reason}")
            }
            other => panic!("expected Serialization, got {:?}", other),
        }
    }

    #[test]
    fn parse_rejects_fractional_and_exponent_numbers() {
        assert!(from_canonical_slice(b"1.5").is_err());
        assert!(from_canonical_slice(b"1e3").is_err());
        assert!(from_canonical_slice(b"[0.0]").is_err());
    }

    #[test]
    fn integer_extremes_round_trip() {
        let value = CanonicalValue::from(vec![i64::MIN, i64::MAX]);
        let bytes = to_canonical_bytes(&value).unwrap();
        assert_eq!(from_canonical_slice(&bytes).unwrap(), value);
    }

    #[test]
    fn reparse_is_idempotent() {
        let mut inner = BTreeMap::new();
        inner.insert("k".to_string(), CanonicalValue::from(vec!["x", "y"]));
        let value = obj(vec![
            ("nested", CanonicalValue::Object(inner)),
            ("n", (-7).into()),
            ("flag", false.into()),
        ]);
        let first = to_canonical_bytes(&value).unwrap();
        let second = to_canonical_bytes(&from_canonical_slice(&first).unwrap()).unwrap();
        assert_eq!(first, second);
    }
}
