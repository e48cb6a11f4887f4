//! Cell values and their type discriminants.
//!
//! Provides the `Value` enum stored in every row cell and the `ValueType`
//! discriminant used by column definitions.

use std::cmp::Ordering;
use std::fmt;

/// Value type discriminants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Null,
    Boolean,
    Number,
    String,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean => write!(f, "boolean"),
            Self::Number => write!(f, "number"),
            Self::String => write!(f, "string"),
        }
    }
}

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
}

impl Value {
    /// Create a string value.
    #[must_use]
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    /// Create a number value.
    #[must_use]
    pub fn number(n: impl Into<f64>) -> Self {
        Self::Number(n.into())
    }

    /// Create a boolean value.
    #[must_use]
    pub const fn boolean(b: bool) -> Self {
        Self::Boolean(b)
    }

    /// Get the value type discriminant.
    #[must_use]
    pub const fn value_type(&self) -> ValueType {
        match self {
            Self::Null => ValueType::Null,
            Self::Boolean(_) => ValueType::Boolean,
            Self::Number(_) => ValueType::Number,
            Self::String(_) => ValueType::String,
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Order two values of the same type.
    ///
    /// Returns `None` when either side is null, the types differ, or a
    /// number is NaN. Comparison predicates treat `None` as "no match".
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Boolean(a), Self::Boolean(b)) => Some(a.cmp(b)),
            (Self::Number(a), Self::Number(b)) => a.partial_cmp(b),
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Equality as the predicate engine sees it: null never equals anything.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }

    /// Total order used for sorting query output.
    ///
    /// Nulls sort first, then booleans, numbers and strings.
    #[must_use]
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        const fn rank(value: &Value) -> u8 {
            match value {
                Value::Null => 0,
                Value::Boolean(_) => 1,
                Value::Number(_) => 2,
                Value::String(_) => 3,
            }
        }
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            _ => self
                .compare(other)
                .unwrap_or_else(|| rank(self).cmp(&rank(other))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_same_type() {
        assert_eq!(
            Value::number(1).compare(&Value::number(2)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::string("b").compare(&Value::string("a")),
            Some(Ordering::Greater)
        );
        assert_eq!(
            Value::boolean(false).compare(&Value::boolean(true)),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn test_compare_mixed_or_null_is_none() {
        assert_eq!(Value::number(1).compare(&Value::string("1")), None);
        assert_eq!(Value::Null.compare(&Value::Null), None);
        assert_eq!(Value::Number(f64::NAN).compare(&Value::number(1)), None);
    }

    #[test]
    fn test_null_never_matches() {
        assert!(!Value::Null.matches(&Value::Null));
        assert!(Value::string("x").matches(&Value::string("x")));
    }

    #[test]
    fn test_sort_cmp_orders_nulls_first() {
        let mut values = vec![
            Value::string("a"),
            Value::number(3),
            Value::Null,
            Value::boolean(true),
            Value::number(-1),
        ];
        values.sort_by(Value::sort_cmp);
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::boolean(true),
                Value::number(-1),
                Value::number(3),
                Value::string("a"),
            ]
        );
    }

    #[test]
    fn test_from_option() {
        assert_eq!(Value::from(None::<bool>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::string("x"));
    }
}
