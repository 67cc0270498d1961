//! JSON canonicalization
//!
//! A single pure pass over the assembled document:
//! - `null` mapping values are dropped, except under the `extras` key
//! - empty mappings and sequences are dropped, except for keys listed in
//!   [`ALLOWED_EMPTY_COLLECTIONS`]
//! - floats with an integral value are re-emitted as integers, so fields
//!   typed as integer never appear as `5.0` to validators
//!
//! `extras` is copied verbatim without recursion. Emptiness is judged after
//! a value has been canonicalized, which makes the pass idempotent. Key order
//! is preserved as inserted.
//!
//! The integer coercion looks only at the value, never at the schema type of
//! the field. glTF never requires a literal `5.0`, so this is lossless for
//! conforming documents.

use serde_json::{Map, Number, Value};

use crate::extensions::KHR_MATERIALS_UNLIT;

/// Keys whose value is meaningful even when empty
pub const ALLOWED_EMPTY_COLLECTIONS: &[&str] = &[KHR_MATERIALS_UNLIT];

const EXTRAS: &str = "extras";

// 2^63: the first f64 past i64::MAX
const I64_LIMIT: f64 = 9_223_372_036_854_775_808.0;

/// Canonicalize a document tree
pub fn canonicalize(node: &Value) -> Value {
    match node {
        Value::Object(map) => Value::Object(canonicalize_map(map)),
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        Value::Number(number) => Value::Number(canonicalize_number(number)),
        other => other.clone(),
    }
}

fn canonicalize_map(map: &Map<String, Value>) -> Map<String, Value> {
    let mut fixed = Map::new();
    for (key, value) in map {
        if key == EXTRAS {
            fixed.insert(key.clone(), value.clone());
            continue;
        }

        let value = canonicalize(value);
        if should_include(key, &value) {
            fixed.insert(key.clone(), value);
        }
    }
    fixed
}

fn should_include(key: &str, value: &Value) -> bool {
    if value.is_null() {
        return false;
    }
    !is_empty_collection(value) || ALLOWED_EMPTY_COLLECTIONS.contains(&key)
}

fn is_empty_collection(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn canonicalize_number(number: &Number) -> Number {
    if !number.is_f64() {
        return number.clone();
    }

    match number.as_f64() {
        Some(f) if f.fract() == 0.0 && (-I64_LIMIT..I64_LIMIT).contains(&f) => {
            Number::from(f as i64)
        }
        _ => number.clone(),
    }
}
