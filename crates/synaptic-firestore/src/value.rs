//! Decoding of Firestore REST typed values into plain JSON.

use serde_json::{Map, Value};

/// Decode a REST `fields` object into a plain field map.
pub(crate) fn decode_fields(fields: Map<String, Value>) -> Map<String, Value> {
    fields
        .into_iter()
        .map(|(name, value)| (name, decode_value(value)))
        .collect()
}

/// Decode one typed value such as `{"integerValue": "42"}`.
///
/// Unknown value kinds pass through unchanged.
pub(crate) fn decode_value(value: Value) -> Value {
    let Value::Object(typed) = value else {
        return value;
    };
    let Some((kind, inner)) = typed.into_iter().next() else {
        return Value::Null;
    };

    match kind.as_str() {
        "nullValue" => Value::Null,
        // int64 travels as a decimal string
        "integerValue" => match inner {
            Value::String(s) => s.parse::<i64>().map(Value::from).unwrap_or(Value::String(s)),
            other => other,
        },
        "mapValue" => match inner {
            Value::Object(mut m) => match m.remove("fields") {
                Some(Value::Object(fields)) => Value::Object(decode_fields(fields)),
                _ => Value::Object(Map::new()),
            },
            _ => Value::Object(Map::new()),
        },
        "arrayValue" => match inner {
            Value::Object(mut m) => match m.remove("values") {
                Some(Value::Array(values)) => {
                    Value::Array(values.into_iter().map(decode_value).collect())
                }
                _ => Value::Array(Vec::new()),
            },
            _ => Value::Array(Vec::new()),
        },
        _ => inner,
    }
}
