//! Best-effort conversion of raw values into typed attribute values.
//!
//! Nothing here fails: a value that cannot be converted to the declared type
//! comes back as `None` and the caller leaves the attribute unset.

use crate::date::DateFormatStrategy;
use crate::transform::TransformRegistry;
use recordkit_schema::{AttributeDescription, AttributeType, AttributeValue};
use serde_json::{Number, Value};

/// Coerce `raw` into the declared type of `attribute`.
pub fn coerce(
    raw: &Value,
    attribute: &AttributeDescription,
    date_format: &dyn DateFormatStrategy,
    transforms: &TransformRegistry,
) -> Option<AttributeValue> {
    if raw.is_null() {
        return None;
    }

    match attribute.attribute_type {
        AttributeType::String => string_value(raw).map(AttributeValue::String),
        AttributeType::Integer => integer_value(raw).map(AttributeValue::Integer),
        AttributeType::Float => float_value(raw).map(AttributeValue::Float),
        AttributeType::Boolean => boolean_value(raw).map(AttributeValue::Boolean),
        AttributeType::Date => raw
            .as_str()
            .and_then(|text| date_format.parse(text))
            .map(AttributeValue::Date),
        AttributeType::Binary => binary_value(raw).map(AttributeValue::Binary),
        AttributeType::Transformable => match attribute.transformer.as_deref() {
            Some(name) => transforms.transform(name, raw),
            None => Some(AttributeValue::Opaque(raw.clone())),
        },
        AttributeType::Undefined => Some(AttributeValue::Opaque(raw.clone())),
    }
}

fn string_value(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn integer_value(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => integer_from_number(n),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integer_from_f64))
        }
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn integer_from_number(n: &Number) -> Option<i64> {
    n.as_i64().or_else(|| {
        if n.is_u64() {
            // Larger than i64::MAX.
            None
        } else {
            n.as_f64().and_then(integer_from_f64)
        }
    })
}

/// Truncate toward zero; reject NaN, infinities and out-of-range values.
fn integer_from_f64(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is itself out of range.
    if f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f.trunc() as i64)
    } else {
        None
    }
}

fn float_value(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn boolean_value(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Some(true),
            "false" | "no" | "n" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn binary_value(raw: &Value) -> Option<Vec<u8>> {
    match raw {
        Value::String(s) => Some(s.as_bytes().to_vec()),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
            .collect(),
        _ => None,
    }
}
