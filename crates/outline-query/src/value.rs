//! Values bound to query variables.

use std::collections::HashMap;
use std::fmt;

/// A scalar value produced by the graph store or by a selection expression.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Value {
    /// Absent value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value (entity ids and epoch-millisecond timestamps included).
    Integer(i64),
    /// Floating point value.
    Float(f64),
    /// Text value.
    String(String),
}

impl Value {
    /// Returns a short name for the value's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
        }
    }

    /// Returns the text if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Hashable identity of this value, used to merge result rows.
    ///
    /// Keys are equal iff the values have the same type and content, so
    /// `Integer(1)` and `String("1")` stay distinct. Floats compare bitwise.
    pub fn key(&self) -> ValueKey {
        match self {
            Value::Null => ValueKey::Null,
            Value::Bool(b) => ValueKey::Bool(*b),
            Value::Integer(n) => ValueKey::Integer(*n),
            Value::Float(x) => ValueKey::Float(x.to_bits()),
            Value::String(s) => ValueKey::String(s.clone()),
        }
    }
}

/// Type-tagged, hashable form of a [`Value`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    /// Key of [`Value::Null`].
    Null,
    /// Key of a boolean.
    Bool(bool),
    /// Key of an integer.
    Integer(i64),
    /// Bit pattern of a float.
    Float(u64),
    /// Key of a string.
    String(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// One result tuple keyed by bound-variable name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundRow {
    values: HashMap<String, Value>,
}

impl BoundRow {
    /// Creates an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `variable` to `value`, replacing any earlier binding.
    pub fn insert(&mut self, variable: impl Into<String>, value: Value) {
        self.values.insert(variable.into(), value);
    }

    /// Returns the value bound to `variable`.
    pub fn get(&self, variable: &str) -> Option<&Value> {
        self.values.get(variable)
    }

    /// Number of bound variables.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over `(variable, value)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for BoundRow {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_display() {
        assert_eq!(Value::from("Daily Notes").to_string(), "Daily Notes");
        assert_eq!(Value::Integer(42).to_string(), "42");
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::Bool(true).to_string(), "true");
    }

    #[test]
    fn test_value_key_distinguishes_entities() {
        assert_eq!(Value::Integer(7).key(), Value::Integer(7).key());
        assert_ne!(Value::Integer(7).key(), Value::Integer(8).key());
    }

    #[test]
    fn test_value_key_is_type_tagged() {
        assert_ne!(Value::Integer(1).key(), Value::from("1").key());
        assert_ne!(Value::Null.key(), Value::from("null").key());
        assert_ne!(Value::Bool(true).key(), Value::from("true").key());
        assert_eq!(Value::Float(1.5).key(), Value::Float(1.5).key());
    }

    #[test]
    fn test_bound_row_from_iter() {
        let row: BoundRow = [("Page", Value::Integer(1)), ("Block", Value::Integer(2))]
            .into_iter()
            .collect();
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("Page"), Some(&Value::Integer(1)));
        assert!(row.get("Missing").is_none());
    }
}
