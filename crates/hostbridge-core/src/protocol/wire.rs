//! Wire entry points for engine payloads.
//!
//! Every payload is externally tagged JSON: a single-key map from the variant
//! tag to its payload (`{"Number":{"Integer":3}}`), unit variants as bare
//! strings (`"Lt"`), and a `Term` as `{"value": <Value>}`. The shapes come
//! from the serde derives on the types themselves; this module only runs
//! serde_json and sorts its errors into `UnknownVariant` (an unrecognized
//! tag) and `MalformedValue` (everything else, including a tag object with
//! zero or several keys).

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as Json;

use crate::error::{BridgeError, Result};

/// Encode to a JSON tree.
pub fn encode<T: Serialize + ?Sized>(v: &T) -> Result<Json> {
    serde_json::to_value(v).map_err(|e| BridgeError::Serialization(e.to_string()))
}

/// Decode from a JSON tree.
pub fn decode<T: DeserializeOwned>(json: &Json) -> Result<T> {
    T::deserialize(json).map_err(classify)
}

/// Encode to a JSON string.
pub fn to_string<T: Serialize + ?Sized>(v: &T) -> Result<String> {
    serde_json::to_string(v).map_err(|e| BridgeError::Serialization(e.to_string()))
}

/// Parse and decode a JSON string.
pub fn from_str<T: DeserializeOwned>(s: &str) -> Result<T> {
    serde_json::from_str(s).map_err(classify)
}

/// Enum named by the first variant serde lists as expected.
const ENUMS_BY_FIRST_VARIANT: &[(&str, &str)] = &[
    ("Boolean", "Value"),
    ("Integer", "Numeric"),
    ("Dictionary", "Pattern"),
    ("Debug", "Operator"),
    ("None", "QueryEvent"),
    ("Print", "MessageKind"),
    ("Field", "Datum"),
    ("Eq", "Comparison"),
];

fn classify(e: serde_json::Error) -> BridgeError {
    let msg = e.to_string();
    if e.is_syntax() || e.is_eof() {
        return BridgeError::MalformedValue(format!("invalid JSON: {msg}"));
    }
    let unknown = msg
        .strip_prefix("unknown variant `")
        .and_then(|rest| rest.split_once('`'));
    match unknown {
        Some((tag, expected)) => {
            let first = expected.split('`').nth(1).unwrap_or_default();
            let ty = ENUMS_BY_FIRST_VARIANT
                .iter()
                .find(|(variant, _)| *variant == first)
                .map_or("value", |(_, ty)| *ty);
            BridgeError::UnknownVariant {
                ty,
                tag: tag.to_string(),
            }
        }
        None => BridgeError::MalformedValue(msg),
    }
}

/// `Numeric::Float` payload: a JSON number, or a string marker for values
/// JSON cannot carry.
pub(crate) mod float {
    use std::fmt;

    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(f: &f64, s: S) -> Result<S::Ok, S::Error> {
        if f.is_finite() {
            s.serialize_f64(*f)
        } else if f.is_nan() {
            s.serialize_str("NaN")
        } else if f.is_sign_positive() {
            s.serialize_str("Infinity")
        } else {
            s.serialize_str("-Infinity")
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        d.deserialize_any(FloatVisitor)
    }

    struct FloatVisitor;

    impl<'de> Visitor<'de> for FloatVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a number or one of \"Infinity\", \"-Infinity\", \"NaN\"")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
            match v {
                "Infinity" => Ok(f64::INFINITY),
                "-Infinity" => Ok(f64::NEG_INFINITY),
                "NaN" => Ok(f64::NAN),
                other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
            }
        }
    }
}
