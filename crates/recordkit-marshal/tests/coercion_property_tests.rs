use proptest::prelude::*;
use recordkit_marshal::coerce::coerce;
use recordkit_marshal::{PatternDateFormat, Rfc3339DateFormat, TransformRegistry};
use recordkit_schema::{AttributeDescription, AttributeType, AttributeValue};
use serde_json::{json, Value};

fn coerce_as(ty: AttributeType, raw: &Value) -> Option<AttributeValue> {
    let attribute = AttributeDescription::new("x", ty);
    coerce(raw, &attribute, &Rfc3339DateFormat, &TransformRegistry::with_builtins())
}

fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        any::<f64>()
            .prop_filter("finite", |f| f.is_finite())
            .prop_map(|f| json!(f)),
        ".{0,12}".prop_map(Value::String),
    ]
}

fn arb_type() -> impl Strategy<Value = AttributeType> {
    prop_oneof![
        Just(AttributeType::String),
        Just(AttributeType::Integer),
        Just(AttributeType::Float),
        Just(AttributeType::Boolean),
        Just(AttributeType::Date),
        Just(AttributeType::Binary),
        Just(AttributeType::Transformable),
        Just(AttributeType::Undefined),
    ]
}

proptest! {
    #[test]
    fn coerced_values_match_declared_type(ty in arb_type(), raw in arb_scalar()) {
        if let Some(value) = coerce_as(ty, &raw) {
            let expected = match ty {
                AttributeType::Transformable | AttributeType::Undefined => AttributeType::Transformable,
                other => other,
            };
            prop_assert_eq!(value.attribute_type(), expected);
        }
    }

    #[test]
    fn null_never_coerces(ty in arb_type()) {
        prop_assert_eq!(coerce_as(ty, &Value::Null), None);
    }

    #[test]
    fn integers_survive_string_round_trip(n in any::<i64>()) {
        prop_assert_eq!(
            coerce_as(AttributeType::Integer, &json!(n.to_string())),
            Some(AttributeValue::Integer(n))
        );
        prop_assert_eq!(
            coerce_as(AttributeType::String, &json!(n)),
            Some(AttributeValue::String(n.to_string()))
        );
    }

    #[test]
    fn fractional_numbers_truncate_toward_zero(whole in -1_000_000i64..1_000_000, frac in 0.01f64..0.99) {
        let raw = if whole < 0 { whole as f64 - frac } else { whole as f64 + frac };
        prop_assert_eq!(coerce_as(AttributeType::Integer, &json!(raw)), Some(AttributeValue::Integer(whole)));
    }

    #[test]
    fn byte_arrays_become_binary(bytes in proptest::collection::vec(any::<u8>(), 0..32)) {
        prop_assert_eq!(
            coerce_as(AttributeType::Binary, &json!(bytes)),
            Some(AttributeValue::Binary(bytes.clone()))
        );
    }

    #[test]
    fn day_pattern_parses_valid_dates(year in 1900i32..2100, month in 1u32..=12, day in 1u32..=28) {
        let attribute = AttributeDescription::new("d", AttributeType::Date);
        let text = format!("{year:04}-{month:02}-{day:02}");
        let value = coerce(
            &json!(text.clone()),
            &attribute,
            &PatternDateFormat::unicode("yyyy-MM-dd"),
            &TransformRegistry::new(),
        );
        let date = value.and_then(|v| v.as_date()).map(|d| d.date_naive().to_string());
        prop_assert_eq!(date, Some(text));
    }
}
