//! Dynamic value type for node properties and event payloads.
//!
//! Properties arrive from the client as loosely-typed data; node kinds pattern
//! match on the variant they expect and reject mismatches with
//! [`PropertyError::InvalidType`](crate::PropertyError). The same type is the
//! payload currency for events flowing back out through the pump.

use std::collections::BTreeMap;

/// A dynamic tagged union covering every shape a property or event payload
/// can take.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// Absent value.
    #[default]
    Undefined,
    /// Explicit null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Double-precision number. Integer-valued fields (node ids, channel
    /// indices) arrive as this variant.
    Number(f64),
    /// UTF-8 string.
    String(String),
    /// String-keyed map.
    Object(BTreeMap<String, Value>),
    /// Heterogeneous list.
    Array(Vec<Value>),
    /// Packed single-precision sample data.
    Floats(Vec<f32>),
    /// Opaque handle to a client-side function.
    FunctionRef(u64),
}

impl Value {
    /// Returns the number if this is a [`Value::Number`].
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the boolean if this is a [`Value::Bool`].
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the string if this is a [`Value::String`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the element list if this is a [`Value::Array`].
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the map if this is a [`Value::Object`].
    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the sample data if this is a [`Value::Floats`].
    pub fn as_floats(&self) -> Option<&[f32]> {
        match self {
            Value::Floats(data) => Some(data),
            _ => None,
        }
    }

    /// Interprets the value as a non-negative integer, the shape node ids and
    /// channel indices take on the wire.
    ///
    /// Returns `None` for non-numbers, negatives, NaN, and non-integral
    /// numbers.
    pub fn as_index(&self) -> Option<usize> {
        let n = self.as_number()?;
        if n.is_finite() && n >= 0.0 && n.fract() == 0.0 && n <= u32::MAX as f64 {
            Some(n as usize)
        } else {
            None
        }
    }

    /// Builds an object value from `(key, value)` pairs.
    pub fn object<const N: usize>(pairs: [(&str, Value); N]) -> Value {
        Value::Object(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Vec<f32>> for Value {
    fn from(data: Vec<f32>) -> Self {
        Value::Floats(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_index_accepts_integral_numbers() {
        assert_eq!(Value::Number(7.0).as_index(), Some(7));
        assert_eq!(Value::Number(0.0).as_index(), Some(0));
    }

    #[test]
    fn test_as_index_rejects_bad_shapes() {
        assert_eq!(Value::Number(-1.0).as_index(), None);
        assert_eq!(Value::Number(1.5).as_index(), None);
        assert_eq!(Value::Number(f64::NAN).as_index(), None);
        assert_eq!(Value::String("3".into()).as_index(), None);
        assert_eq!(Value::Undefined.as_index(), None);
    }

    #[test]
    fn test_accessors_are_variant_exact() {
        assert_eq!(Value::Bool(true).as_number(), None);
        assert_eq!(Value::Number(1.0).as_bool(), None);
        assert_eq!(Value::Floats(vec![1.0]).as_array(), None);
        assert_eq!(
            Value::Floats(vec![1.0, 2.0]).as_floats(),
            Some(&[1.0f32, 2.0][..])
        );
    }

    #[test]
    fn test_object_builder() {
        let v = Value::object([("source", "m1".into()), ("data", Value::Number(0.5))]);
        let map = v.as_object().unwrap();
        assert_eq!(map.get("source").and_then(Value::as_str), Some("m1"));
        assert_eq!(map.get("data").and_then(Value::as_number), Some(0.5));
    }
}
