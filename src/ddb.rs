//! DynamoDB attribute-value JSON to plain JSON.

use serde_json::{Map, Number, Value};
use tracing::warn;

/// Convert a DynamoDB item (`{"attr": {"S": "..."}}`) into a plain JSON object.
///
/// Values that are not attribute-value maps are passed through untouched.
pub fn unmarshall(item: &Value) -> Value {
    match item {
        Value::Object(attributes) => Value::Object(
            attributes
                .iter()
                .map(|(name, attr)| (name.clone(), unmarshall_attribute(attr)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Convert one typed attribute value, e.g. `{"N": "1"}` → `1`.
pub fn unmarshall_attribute(attr: &Value) -> Value {
    let Some(typed) = attr.as_object().filter(|m| m.len() == 1) else {
        return attr.clone();
    };
    let Some((kind, value)) = typed.iter().next() else {
        return attr.clone();
    };

    match (kind.as_str(), value) {
        ("S", Value::String(s)) | ("B", Value::String(s)) => Value::String(s.clone()),
        ("N", Value::String(n)) => number(n),
        ("BOOL", Value::Bool(b)) => Value::Bool(*b),
        ("NULL", _) => Value::Null,
        ("M", Value::Object(map)) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), unmarshall_attribute(v)))
                .collect::<Map<String, Value>>(),
        ),
        ("L", Value::Array(items)) => Value::Array(items.iter().map(unmarshall_attribute).collect()),
        ("SS", Value::Array(items)) | ("BS", Value::Array(items)) => Value::Array(items.clone()),
        ("NS", Value::Array(items)) => Value::Array(
            items
                .iter()
                .map(|n| n.as_str().map(number).unwrap_or_else(|| n.clone()))
                .collect(),
        ),
        _ => {
            warn!(attribute_type = %kind, "Unrecognised attribute value, passing through");
            attr.clone()
        }
    }
}

fn number(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Number(i.into());
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(raw.to_string()))
}
