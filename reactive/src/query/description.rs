//! Declarative predicate descriptions.
//!
//! A `PredicateDescription` is an ordered list of `key → value` entries.
//! Keys are column names, the combinators `$and`/`$or`/`$not`, or operator
//! names such as `$lt`. Entry order is kept as written because `$not` only
//! negates its first child.
//!
//! Descriptions are built with [`PredicateDescription::entry`] or decoded
//! from any self-describing serde format:
//!
//! ```
//! use reactive::query::PredicateDescription;
//!
//! let built = PredicateDescription::new()
//!     .entry("time1", PredicateDescription::new().entry("$gte", 50).entry("$lt", 100));
//! let decoded: PredicateDescription =
//!     serde_json::from_str(r#"{"time1": {"$gte": 50, "$lt": 100}}"#)?;
//! assert_eq!(built.len(), decoded.len());
//! # Ok::<(), serde_json::Error>(())
//! ```

use regex::Regex;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;

use crate::types::Value;

/// A scalar operand: text, number, or boolean.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ValueLiteral {
    Boolean(bool),
    Number(f64),
    Text(String),
}

impl From<ValueLiteral> for Value {
    fn from(literal: ValueLiteral) -> Self {
        match literal {
            ValueLiteral::Boolean(b) => Self::Boolean(b),
            ValueLiteral::Number(n) => Self::Number(n),
            ValueLiteral::Text(s) => Self::String(s),
        }
    }
}

impl fmt::Display for ValueLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<&str> for ValueLiteral {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for ValueLiteral {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for ValueLiteral {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for ValueLiteral {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<bool> for ValueLiteral {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

/// The value side of a description entry.
#[derive(Debug, Clone)]
pub enum DescriptionValue {
    Literal(ValueLiteral),
    Array(Vec<ValueLiteral>),
    Pattern(Regex),
    Nested(PredicateDescription),
}

impl DescriptionValue {
    /// Short name of the value's shape, used in error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Literal(_) => "literal",
            Self::Array(_) => "array",
            Self::Pattern(_) => "pattern",
            Self::Nested(_) => "nested description",
        }
    }
}

impl From<ValueLiteral> for DescriptionValue {
    fn from(literal: ValueLiteral) -> Self {
        Self::Literal(literal)
    }
}

macro_rules! literal_description_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for DescriptionValue {
                fn from(value: $ty) -> Self {
                    Self::Literal(ValueLiteral::from(value))
                }
            }
        )*
    };
}

literal_description_value!(&str, String, f64, i32, bool);

impl<T: Into<ValueLiteral>> From<Vec<T>> for DescriptionValue {
    fn from(items: Vec<T>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<ValueLiteral>, const N: usize> From<[T; N]> for DescriptionValue {
    fn from(items: [T; N]) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }
}

impl From<Regex> for DescriptionValue {
    fn from(pattern: Regex) -> Self {
        Self::Pattern(pattern)
    }
}

impl From<PredicateDescription> for DescriptionValue {
    fn from(description: PredicateDescription) -> Self {
        Self::Nested(description)
    }
}

/// An ordered, recursively nested predicate description.
#[derive(Debug, Clone, Default)]
pub struct PredicateDescription {
    entries: Vec<(String, DescriptionValue)>,
}

impl PredicateDescription {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append an entry. Later entries never replace earlier ones.
    #[must_use]
    pub fn entry(mut self, key: impl Into<String>, value: impl Into<DescriptionValue>) -> Self {
        self.entries.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn entries(&self) -> &[(String, DescriptionValue)] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<DescriptionValue>> FromIterator<(K, V)> for PredicateDescription {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

///
/// ValueWire
/// Decode shape for one entry value; patterns are recognized by key afterwards.
///

#[derive(Deserialize)]
#[serde(untagged)]
enum ValueWire {
    Literal(ValueLiteral),
    Array(Vec<ValueLiteral>),
    Nested(PredicateDescription),
}

impl ValueWire {
    fn into_value(self, key: &str) -> Result<DescriptionValue, String> {
        match self {
            Self::Literal(ValueLiteral::Text(pattern)) if takes_pattern(key) => Regex::new(&pattern)
                .map(DescriptionValue::Pattern)
                .map_err(|e| format!("invalid pattern for {key}: {e}")),
            Self::Literal(literal) => Ok(DescriptionValue::Literal(literal)),
            Self::Array(items) => Ok(DescriptionValue::Array(items)),
            Self::Nested(description) => Ok(DescriptionValue::Nested(description)),
        }
    }
}

fn takes_pattern(key: &str) -> bool {
    matches!(key, "$match" | "$notMatch")
}

struct DescriptionVisitor;

impl<'de> Visitor<'de> for DescriptionVisitor {
    type Value = PredicateDescription;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a map of predicate entries")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some(key) = map.next_key::<String>()? {
            let wire: ValueWire = map.next_value()?;
            let value = wire.into_value(&key).map_err(de::Error::custom)?;
            entries.push((key, value));
        }
        Ok(PredicateDescription { entries })
    }
}

impl<'de> Deserialize<'de> for PredicateDescription {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(DescriptionVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(description: &PredicateDescription) -> Vec<&str> {
        description.entries().iter().map(|(k, _)| k.as_str()).collect()
    }

    #[test]
    fn test_builder_keeps_entry_order() {
        let description = PredicateDescription::new()
            .entry("name", "a")
            .entry("_id", "b")
            .entry("name", "c");
        assert_eq!(keys(&description), vec!["name", "_id", "name"]);
    }

    #[test]
    fn test_from_impls_pick_value_shape() {
        assert!(matches!(
            DescriptionValue::from(3),
            DescriptionValue::Literal(ValueLiteral::Number(n)) if (n - 3.0).abs() < f64::EPSILON
        ));
        assert!(matches!(
            DescriptionValue::from([1, 2]),
            DescriptionValue::Array(items) if items.len() == 2
        ));
        assert_eq!(DescriptionValue::from(true).kind(), "literal");
        assert_eq!(
            DescriptionValue::from(PredicateDescription::new()).kind(),
            "nested description"
        );
    }

    #[test]
    fn test_deserialize_preserves_order_and_shapes() {
        let description: PredicateDescription = serde_json::from_str(
            r#"{"$not": {"time2": 5, "time1": 1}, "name": {"$match": "^name:1", "$in": ["a", 2, true]}}"#,
        )
        .expect("valid description");

        assert_eq!(keys(&description), vec!["$not", "name"]);
        let DescriptionValue::Nested(not_body) = &description.entries()[0].1 else {
            panic!("expected nested description");
        };
        assert_eq!(keys(not_body), vec!["time2", "time1"]);

        let DescriptionValue::Nested(name) = &description.entries()[1].1 else {
            panic!("expected nested description");
        };
        assert!(matches!(&name.entries()[0].1, DescriptionValue::Pattern(p) if p.is_match("name:12")));
        assert!(matches!(
            &name.entries()[1].1,
            DescriptionValue::Array(items) if items == &vec![
                ValueLiteral::Text("a".to_string()),
                ValueLiteral::Number(2.0),
                ValueLiteral::Boolean(true),
            ]
        ));
    }

    #[test]
    fn test_deserialize_rejects_bad_pattern() {
        let error = serde_json::from_str::<PredicateDescription>(r#"{"name": {"$match": "("}}"#)
            .expect_err("unbalanced group");
        assert!(error.to_string().contains("invalid pattern for $match"));
    }

    #[test]
    fn test_deserialize_rejects_non_map() {
        assert!(serde_json::from_str::<PredicateDescription>("[1, 2]").is_err());
    }
}
