//! Typed property values.
use std::collections::BTreeMap;

use derive_more::From;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A property value attached to a profile or event.
///
/// Conveniently implements `From` conversions for `String`, `&str`, `f64`, and `bool`.
///
/// ```
/// # use beacon_core::model::PropertyValue;
/// let string_value: PropertyValue = "example".into();
/// let number_value: PropertyValue = 42.0.into();
/// let bool_value: PropertyValue = true.into();
/// ```
#[derive(Debug, Serialize, Deserialize, PartialEq, From, Clone)]
#[serde(untagged)]
pub enum PropertyValue {
    /// A string value.
    String(String),
    /// A numerical value.
    Number(f64),
    /// A boolean value.
    Boolean(bool),
    /// A list of values.
    List(Vec<PropertyValue>),
    /// A nested map of values.
    Map(BTreeMap<String, PropertyValue>),
    /// A null value or absence of value.
    Null,
}

impl PropertyValue {
    /// Borrow the string payload, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        if let PropertyValue::String(s) = self {
            Some(s.as_str())
        } else {
            None
        }
    }

    /// Numeric payload, if this is a number.
    pub fn as_number(&self) -> Option<f64> {
        if let PropertyValue::Number(n) = self {
            Some(*n)
        } else {
            None
        }
    }

    /// Convert into a [`serde_json::Value`] without a fallible serializer round trip.
    pub fn to_json(&self) -> Value {
        match self {
            PropertyValue::String(s) => Value::String(s.clone()),
            PropertyValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            PropertyValue::Boolean(b) => Value::Bool(*b),
            PropertyValue::List(items) => {
                Value::Array(items.iter().map(PropertyValue::to_json).collect())
            }
            PropertyValue::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
            PropertyValue::Null => Value::Null,
        }
    }

    /// Build a property value from a [`serde_json::Value`].
    pub fn from_json(value: &Value) -> PropertyValue {
        match value {
            Value::String(s) => PropertyValue::String(s.clone()),
            Value::Number(n) => n
                .as_f64()
                .map(PropertyValue::Number)
                .unwrap_or(PropertyValue::Null),
            Value::Bool(b) => PropertyValue::Boolean(*b),
            Value::Array(items) => {
                PropertyValue::List(items.iter().map(PropertyValue::from_json).collect())
            }
            Value::Object(entries) => PropertyValue::Map(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), PropertyValue::from_json(value)))
                    .collect(),
            ),
            Value::Null => PropertyValue::Null,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::PropertyValue;

    #[test]
    fn json_round_trip() {
        let json = json!({
            "plan": "premium",
            "visits": 3.0,
            "beta": true,
            "tags": ["a", "b"],
            "nested": { "k": null },
        });

        let value = PropertyValue::from_json(&json);

        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn convenient_conversions() {
        assert_eq!(
            PropertyValue::from("x"),
            PropertyValue::String("x".to_owned())
        );
        assert_eq!(PropertyValue::from(2.0).as_number(), Some(2.0));
        assert_eq!(PropertyValue::from(true), PropertyValue::Boolean(true));
    }
}
