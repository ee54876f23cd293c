//! The restricted value tree carried in event payloads.
//!
//! `CanonicalValue` admits exactly the shapes that have one canonical byte
//! form: null, booleans, signed 64-bit integers, strings, arrays, and
//! objects with unique string keys.  Floating point numbers have no
//! variant, and objects are `BTreeMap`s, so the canonicalization rules
//! hold by construction rather than by checks at each call site.
//!
//! `BTreeMap<String, _>` orders keys by their UTF-8 bytes, which is the
//! same as Unicode code-point order.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::{ChainproofError, ChainproofResult};

/// A node in a canonicalizable value tree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CanonicalValue {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    String(String),
    Array(Vec<CanonicalValue>),
    Object(BTreeMap<String, CanonicalValue>),
}

impl CanonicalValue {
    /// Build an object from key/value pairs, rejecting duplicate keys.
    ///
    /// A duplicate key has no single canonical form, so it is an error
    /// rather than a silent last-write-wins.
    pub fn try_object<K, I>(pairs: I) -> ChainproofResult<Self>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, CanonicalValue)>,
    {
        let mut map = BTreeMap::new();
        for (key, value) in pairs {
            let key = key.into();
            if map.contains_key(&key) {
                return Err(ChainproofError::Serialization {
                    reason: format!("duplicate object key '{key}'"),
                });
            }
            map.insert(key, value);
        }
        Ok(CanonicalValue::Object(map))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, CanonicalValue::Object(_))
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, CanonicalValue>> {
        match self {
            CanonicalValue::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Look up `key` when this value is an object.
    pub fn get(&self, key: &str) -> Option<&CanonicalValue> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// A short name for the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            CanonicalValue::Null => "null",
            CanonicalValue::Bool(_) => "boolean",
            CanonicalValue::Integer(_) => "integer",
            CanonicalValue::String(_) => "string",
            CanonicalValue::Array(_) => "array",
            CanonicalValue::Object(_) => "object",
        }
    }
}

// ── Conversions ───────────────────────────────────────────────────────────────

impl From<bool> for CanonicalValue {
    fn from(b: bool) -> Self {
        CanonicalValue::Bool(b)
    }
}

impl From<i64> for CanonicalValue {
    fn from(n: i64) -> Self {
        CanonicalValue::Integer(n)
    }
}

impl From<i32> for CanonicalValue {
    fn from(n: i32) -> Self {
        CanonicalValue::Integer(i64::from(n))
    }
}

impl From<&str> for CanonicalValue {
    fn from(s: &str) -> Self {
        CanonicalValue::String(s.to_string())
    }
}

impl From<String> for CanonicalValue {
    fn from(s: String) -> Self {
        CanonicalValue::String(s)
    }
}

impl<T: Into<CanonicalValue>> From<Option<T>> for CanonicalValue {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(CanonicalValue::Null)
    }
}

impl<T: Into<CanonicalValue>> From<Vec<T>> for CanonicalValue {
    fn from(items: Vec<T>) -> Self {
        CanonicalValue::Array(items.into_iter().map(Into::into).collect())
    }
}

impl TryFrom<serde_json::Value> for CanonicalValue {
    type Error = ChainproofError;

    /// Convert a `serde_json::Value`, rejecting any number that is not an
    /// integer in the `i64` range.
    ///
    /// `serde_json::Value` has already collapsed duplicate keys by the time
    /// it reaches here; parse raw text with `from_canonical_slice` when
    /// duplicates must be detected.
    fn try_from(value: serde_json::Value) -> ChainproofResult<Self> {
        use serde_json::Value;
        Ok(match value {
            Value::Null => CanonicalValue::Null,
            Value::Bool(b) => CanonicalValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => CanonicalValue::Integer(i),
                None => {
                    return Err(ChainproofError::Serialization {
                        reason: format!("number {n} is not an integer in the signed 64-bit range"),
                    })
                }
            },
            Value::String(s) => CanonicalValue::String(s),
            Value::Array(items) => CanonicalValue::Array(
                items
                    .into_iter()
                    .map(CanonicalValue::try_from)
                    .collect::<ChainproofResult<Vec<_>>>()?,
            ),
            Value::Object(map) => {
                let mut out = BTreeMap::new();
                for (key, inner) in map {
                    out.insert(key, CanonicalValue::try_from(inner)?);
                }
                CanonicalValue::Object(out)
            }
        })
    }
}

impl From<CanonicalValue> for serde_json::Value {
    fn from(value: CanonicalValue) -> Self {
        use serde_json::Value;
        match value {
            CanonicalValue::Null => Value::Null,
            CanonicalValue::Bool(b) => Value::Bool(b),
            CanonicalValue::Integer(i) => Value::from(i),
            CanonicalValue::String(s) => Value::String(s),
            CanonicalValue::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            CanonicalValue::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

// ── Serde ─────────────────────────────────────────────────────────────────────

impl Serialize for CanonicalValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CanonicalValue::Null => serializer.serialize_unit(),
            CanonicalValue::Bool(b) => serializer.serialize_bool(*b),
            CanonicalValue::Integer(i) => serializer.serialize_i64(*i),
            CanonicalValue::String(s) => serializer.serialize_str(s),
            CanonicalValue::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            CanonicalValue::Object(map) => {
                // BTreeMap iteration is already in code-point order.
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for CanonicalValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(CanonicalValueVisitor)
    }
}

struct CanonicalValueVisitor;

impl<'de> Visitor<'de> for CanonicalValueVisitor {
    type Value = CanonicalValue;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("null, a boolean, an integer, a string, an array, or an object with unique keys")
    }

    fn visit_unit<E: de::Error>(self) -> Result<CanonicalValue, E> {
        Ok(CanonicalValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<CanonicalValue, E> {
        Ok(CanonicalValue::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<CanonicalValue, D::Error> {
        Deserialize::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, b: bool) -> Result<CanonicalValue, E> {
        Ok(CanonicalValue::Bool(b))
    }

    fn visit_i64<E: de::Error>(self, i: i64) -> Result<CanonicalValue, E> {
        Ok(CanonicalValue::Integer(i))
    }

    fn visit_u64<E: de::Error>(self, u: u64) -> Result<CanonicalValue, E> {
        i64::try_from(u)
            .map(CanonicalValue::Integer)
            .map_err(|_| E::custom(format!("integer {u} exceeds the signed 64-bit range")))
    }

    fn visit_f64<E: de::Error>(self, f: f64) -> Result<CanonicalValue, E> {
        Err(E::custom(format!(
            "non-integer number {f} has no canonical encoding"
        )))
    }

    fn visit_str<E: de::Error>(self, s: &str) -> Result<CanonicalValue, E> {
        Ok(CanonicalValue::String(s.to_string()))
    }

    fn visit_string<E: de::Error>(self, s: String) -> Result<CanonicalValue, E> {
        Ok(CanonicalValue::String(s))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<CanonicalValue, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(CanonicalValue::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<CanonicalValue, A::Error> {
        let mut map = BTreeMap::new();
        while let Some(key) = access.next_key::<String>()? {
            if map.contains_key(&key) {
                return Err(de::Error::custom(format!("duplicate object key '{key}'")));
            }
            let value = access.next_value()?;
            map.insert(key, value);
        }
        Ok(CanonicalValue::Object(map))
    }
}
