//! Boolean predicates over rows.
//!
//! `Predicate` is the engine's filter primitive. The builders on `Column`
//! map one-to-one onto the operators the predicate compiler emits, and
//! `Predicate::and`/`or`/`not` compose them.

use std::cmp::Ordering;
use std::fmt;

use regex::Regex;

use super::schema::Column;
use crate::types::{Row, Value};

/// Ordering comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    const fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => matches!(ordering, Ordering::Equal),
            Self::Lt => matches!(ordering, Ordering::Less),
            Self::Lte => !matches!(ordering, Ordering::Greater),
            Self::Gt => matches!(ordering, Ordering::Greater),
            Self::Gte => !matches!(ordering, Ordering::Less),
        }
    }

    const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
        }
    }
}

/// A boolean predicate over a row.
///
/// Comparisons against null or against a value of another type never
/// match; only `IsNull` matches null cells.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// `column <op> value`.
    Compare {
        column: Column,
        op: CompareOp,
        value: Value,
    },
    /// `low <= column <= high`.
    Between {
        column: Column,
        low: Value,
        high: Value,
    },
    /// `column` equals one of `values`.
    In { column: Column, values: Vec<Value> },
    IsNull(Column),
    IsNotNull(Column),
    /// String cell matches the regular expression.
    Match { column: Column, pattern: Regex },
    /// All children hold. An empty conjunction is true.
    And(Vec<Predicate>),
    /// At least one child holds. An empty disjunction is false.
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    /// Conjunction of all predicates.
    #[must_use]
    pub const fn and(predicates: Vec<Self>) -> Self {
        Self::And(predicates)
    }

    /// Disjunction of all predicates.
    #[must_use]
    pub const fn or(predicates: Vec<Self>) -> Self {
        Self::Or(predicates)
    }

    /// Negation.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(predicate: Self) -> Self {
        Self::Not(Box::new(predicate))
    }

    /// Evaluate the predicate against a row.
    #[must_use]
    pub fn eval(&self, row: &Row) -> bool {
        match self {
            Self::Compare { column, op, value } => row
                .get(&column.name)
                .compare(value)
                .is_some_and(|ordering| op.accepts(ordering)),
            Self::Between { column, low, high } => {
                let cell = row.get(&column.name);
                CompareOp::Gte.accepts_opt(cell.compare(low))
                    && CompareOp::Lte.accepts_opt(cell.compare(high))
            }
            Self::In { column, values } => {
                let cell = row.get(&column.name);
                values.iter().any(|v| cell.matches(v))
            }
            Self::IsNull(column) => row.get(&column.name).is_null(),
            Self::IsNotNull(column) => !row.get(&column.name).is_null(),
            Self::Match { column, pattern } => row
                .get(&column.name)
                .as_str()
                .is_some_and(|s| pattern.is_match(s)),
            Self::And(children) => children.iter().all(|p| p.eval(row)),
            Self::Or(children) => children.iter().any(|p| p.eval(row)),
            Self::Not(inner) => !inner.eval(row),
        }
    }
}

impl CompareOp {
    fn accepts_opt(self, ordering: Option<Ordering>) -> bool {
        ordering.is_some_and(|o| self.accepts(o))
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, children: &[Predicate], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, " {sep} ")?;
        }
        write!(f, "{child}")?;
    }
    write!(f, ")")
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compare { column, op, value } => {
                write!(f, "{column} {} {value}", op.symbol())
            }
            Self::Between { column, low, high } => {
                write!(f, "{column} BETWEEN {low} AND {high}")
            }
            Self::In { column, values } => {
                write!(f, "{column} IN [")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Self::IsNull(column) => write!(f, "{column} IS NULL"),
            Self::IsNotNull(column) => write!(f, "{column} IS NOT NULL"),
            Self::Match { column, pattern } => write!(f, "{column} MATCH /{pattern}/"),
            Self::And(children) => write_joined(f, children, "AND"),
            Self::Or(children) => write_joined(f, children, "OR"),
            Self::Not(inner) => write!(f, "NOT {inner}"),
        }
    }
}

// =============================================================================
// Column builders
// =============================================================================

impl Column {
    fn compare(&self, op: CompareOp, value: impl Into<Value>) -> Predicate {
        Predicate::Compare {
            column: self.clone(),
            op,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn eq(&self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Eq, value)
    }

    /// Not-equal is the exact complement of `eq`, so null cells match it.
    #[must_use]
    pub fn ne(&self, value: impl Into<Value>) -> Predicate {
        Predicate::not(self.eq(value))
    }

    #[must_use]
    pub fn lt(&self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Lt, value)
    }

    #[must_use]
    pub fn lte(&self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Lte, value)
    }

    #[must_use]
    pub fn gt(&self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Gt, value)
    }

    #[must_use]
    pub fn gte(&self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Gte, value)
    }

    /// Inclusive range.
    #[must_use]
    pub fn between(&self, low: impl Into<Value>, high: impl Into<Value>) -> Predicate {
        Predicate::Between {
            column: self.clone(),
            low: low.into(),
            high: high.into(),
        }
    }

    #[must_use]
    pub fn in_list(&self, values: Vec<Value>) -> Predicate {
        Predicate::In {
            column: self.clone(),
            values,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> Predicate {
        Predicate::IsNull(self.clone())
    }

    #[must_use]
    pub fn is_not_null(&self) -> Predicate {
        Predicate::IsNotNull(self.clone())
    }

    #[must_use]
    pub fn matches(&self, pattern: Regex) -> Predicate {
        Predicate::Match {
            column: self.clone(),
            pattern,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::{ColumnResolver, TableSchema};
    use crate::types::ValueType;

    fn schema() -> TableSchema {
        TableSchema::new("T")
            .with_column("n", ValueType::Number)
            .with_column("s", ValueType::String)
            .with_nullable_column("b", ValueType::Boolean)
    }

    fn col(name: &str) -> Column {
        schema().column(name).expect("column should exist")
    }

    fn row(n: f64, s: &str, b: Option<bool>) -> Row {
        Row::new().with("n", n).with("s", s).with("b", b)
    }

    #[test]
    fn test_comparisons() {
        let r = row(10.0, "x", Some(true));
        assert!(col("n").eq(10).eval(&r));
        assert!(!col("n").ne(10).eval(&r));
        assert!(col("n").lt(11).eval(&r));
        assert!(!col("n").lt(10).eval(&r));
        assert!(col("n").lte(10).eval(&r));
        assert!(col("n").gt(9).eval(&r));
        assert!(col("n").gte(10).eval(&r));
        assert!(!col("n").gt(10).eval(&r));
    }

    #[test]
    fn test_type_mismatch_never_matches() {
        let r = row(10.0, "x", None);
        assert!(!col("n").eq("10").eval(&r));
        assert!(!col("n").lt("a").eval(&r));
        assert!(col("n").ne("10").eval(&r));
    }

    #[test]
    fn test_null_semantics() {
        let r = row(1.0, "x", None);
        assert!(col("b").is_null().eval(&r));
        assert!(!col("b").is_not_null().eval(&r));
        assert!(!col("b").eq(false).eval(&r));
        assert!(col("b").ne(false).eval(&r));
    }

    #[test]
    fn test_between_is_inclusive() {
        let between = col("n").between(1, 20);
        assert!(between.eval(&row(1.0, "", None)));
        assert!(between.eval(&row(20.0, "", None)));
        assert!(!between.eval(&row(0.0, "", None)));
        assert!(!between.eval(&row(21.0, "", None)));
    }

    #[test]
    fn test_in_list() {
        let p = col("n").in_list(vec![Value::number(1), Value::number(3)]);
        assert!(p.eval(&row(3.0, "", None)));
        assert!(!p.eval(&row(2.0, "", None)));
    }

    #[test]
    fn test_match() {
        let p = col("s").matches(Regex::new(r"^name:\d$").expect("valid regex"));
        assert!(p.eval(&row(0.0, "name:7", None)));
        assert!(!p.eval(&row(0.0, "name:77", None)));
        assert!(!col("n").matches(Regex::new(".*").expect("valid regex")).eval(&row(1.0, "", None)));
    }

    #[test]
    fn test_combinators() {
        let r = row(5.0, "x", None);
        assert!(Predicate::and(vec![col("n").gt(1), col("n").lt(10)]).eval(&r));
        assert!(!Predicate::and(vec![col("n").gt(1), col("n").lt(5)]).eval(&r));
        assert!(Predicate::or(vec![col("n").lt(1), col("n").eq(5)]).eval(&r));
        assert!(Predicate::not(col("n").eq(4)).eval(&r));
        assert!(Predicate::and(Vec::new()).eval(&r));
        assert!(!Predicate::or(Vec::new()).eval(&r));
    }

    #[test]
    fn test_display() {
        let p = Predicate::and(vec![col("n").gte(50), Predicate::not(col("s").eq("a"))]);
        assert_eq!(p.to_string(), "(T.n >= 50 AND NOT T.s = \"a\")");
    }
}
