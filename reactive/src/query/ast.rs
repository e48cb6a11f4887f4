//! Normalized predicate tree.
//!
//! Normalization turns the loosely-shaped description grammar into tagged
//! nodes with checked operands. It knows nothing about schemas; column
//! names stay unresolved until compilation.
//!
//! # Column context
//!
//! The walk carries an optional column context. A nested description under
//! a column key sets the context for its entries, and combinators pass the
//! current context through unchanged. A leaf applies to the context column
//! if there is one, else to its own key.

use regex::Regex;

use super::description::{DescriptionValue, PredicateDescription, ValueLiteral};
use super::error::CompileError;
use crate::types::Value;

/// The closed set of comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Match,
    NotMatch,
    Between,
    In,
    IsNull,
}

impl Operator {
    const ALL: [Self; 11] = [
        Self::Eq,
        Self::Ne,
        Self::Lt,
        Self::Lte,
        Self::Gt,
        Self::Gte,
        Self::Match,
        Self::NotMatch,
        Self::Between,
        Self::In,
        Self::IsNull,
    ];

    /// Look up an operator by its key, e.g. `"$lte"`.
    #[must_use]
    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.key() == key)
    }

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Ne => "$ne",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::Match => "$match",
            Self::NotMatch => "$notMatch",
            Self::Between => "$between",
            Self::In => "$in",
            Self::IsNull => "$isNull",
        }
    }
}

/// Boolean combinators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
    /// Negates the first child only.
    Not,
}

impl Combinator {
    #[must_use]
    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "$and" => Some(Self::And),
            "$or" => Some(Self::Or),
            "$not" => Some(Self::Not),
            _ => None,
        }
    }

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::And => "$and",
            Self::Or => "$or",
            Self::Not => "$not",
        }
    }
}

/// A shape-checked operator operand.
#[derive(Debug, Clone)]
pub enum Operand {
    Value(Value),
    Range(Value, Value),
    Set(Vec<Value>),
    Pattern(Regex),
    Flag(bool),
}

/// A node of the normalized tree.
#[derive(Debug, Clone)]
pub enum PredicateNode {
    /// Implicit equality.
    Literal { column: String, value: Value },
    Operator {
        column: String,
        operator: Operator,
        operand: Operand,
    },
    Combinator {
        combinator: Combinator,
        children: Vec<PredicateNode>,
    },
    /// Entries nested under a column key.
    ColumnScope {
        column: String,
        children: Vec<PredicateNode>,
    },
}

/// Normalize a description into a list of top-level nodes.
///
/// The nodes are implicitly conjoined.
pub fn normalize(description: &PredicateDescription) -> Result<Vec<PredicateNode>, CompileError> {
    normalize_entries(description, None)
}

fn normalize_entries(
    description: &PredicateDescription,
    context: Option<&str>,
) -> Result<Vec<PredicateNode>, CompileError> {
    description
        .entries()
        .iter()
        .map(|(key, value)| normalize_entry(key, value, context))
        .collect()
}

fn normalize_entry(
    key: &str,
    value: &DescriptionValue,
    context: Option<&str>,
) -> Result<PredicateNode, CompileError> {
    if let Some(combinator) = Combinator::parse(key) {
        let DescriptionValue::Nested(nested) = value else {
            return Err(CompileError::InvalidOperand {
                key: key.to_string(),
                expected: "a nested description",
                found: value.kind(),
            });
        };
        return Ok(PredicateNode::Combinator {
            combinator,
            children: normalize_entries(nested, context)?,
        });
    }

    if let Some(column) = context
        && key.starts_with('$')
    {
        let operator = Operator::parse(key).ok_or_else(|| CompileError::UnknownOperator {
            column: column.to_string(),
            operator: key.to_string(),
        })?;
        return Ok(PredicateNode::Operator {
            column: column.to_string(),
            operator,
            operand: check_operand(operator, value)?,
        });
    }

    let column = context.unwrap_or(key);
    match value {
        DescriptionValue::Nested(nested) => Ok(PredicateNode::ColumnScope {
            column: key.to_string(),
            children: normalize_entries(nested, Some(key))?,
        }),
        DescriptionValue::Literal(literal) => Ok(PredicateNode::Literal {
            column: column.to_string(),
            value: literal.clone().into(),
        }),
        DescriptionValue::Array(_) | DescriptionValue::Pattern(_) => {
            Err(CompileError::UnsupportedLeaf {
                column: column.to_string(),
                found: value.kind(),
            })
        }
    }
}

fn check_operand(operator: Operator, value: &DescriptionValue) -> Result<Operand, CompileError> {
    let invalid = |expected| CompileError::InvalidOperand {
        key: operator.key().to_string(),
        expected,
        found: value.kind(),
    };

    match operator {
        Operator::Eq
        | Operator::Ne
        | Operator::Lt
        | Operator::Lte
        | Operator::Gt
        | Operator::Gte => match value {
            DescriptionValue::Literal(literal) => Ok(Operand::Value(literal.clone().into())),
            _ => Err(invalid("a literal")),
        },
        Operator::Match | Operator::NotMatch => match value {
            DescriptionValue::Pattern(pattern) => Ok(Operand::Pattern(pattern.clone())),
            _ => Err(invalid("a pattern")),
        },
        Operator::Between => match value {
            DescriptionValue::Array(items) => match items.as_slice() {
                [ValueLiteral::Number(low), ValueLiteral::Number(high)] => {
                    Ok(Operand::Range(Value::Number(*low), Value::Number(*high)))
                }
                _ => Err(invalid("two numbers")),
            },
            _ => Err(invalid("two numbers")),
        },
        Operator::In => match value {
            DescriptionValue::Array(items) => Ok(Operand::Set(
                items.iter().cloned().map(Value::from).collect(),
            )),
            _ => Err(invalid("an array")),
        },
        Operator::IsNull => match value {
            DescriptionValue::Literal(ValueLiteral::Boolean(flag)) => Ok(Operand::Flag(*flag)),
            _ => Err(invalid("a boolean")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested() -> PredicateDescription {
        PredicateDescription::new()
    }

    #[test]
    fn test_operator_keys_round_trip() {
        for op in Operator::ALL {
            assert_eq!(Operator::parse(op.key()), Some(op));
        }
        assert_eq!(Operator::parse("$like"), None);
        assert_eq!(Combinator::parse("$nor"), None);
    }

    #[test]
    fn test_top_level_literal_is_implicit_equality() {
        let nodes = normalize(&nested().entry("name", "a")).expect("normalizes");
        assert!(matches!(
            nodes.as_slice(),
            [PredicateNode::Literal { column, value }] if column == "name" && *value == Value::string("a")
        ));
    }

    #[test]
    fn test_scope_sets_context_for_operators() {
        let description = nested().entry("time1", nested().entry("$gte", 5).entry("$lt", 9));
        let nodes = normalize(&description).expect("normalizes");
        let [PredicateNode::ColumnScope { column, children }] = nodes.as_slice() else {
            panic!("expected one scope, got {nodes:?}");
        };
        assert_eq!(column, "time1");
        assert!(children.iter().all(|child| matches!(
            child,
            PredicateNode::Operator { column, .. } if column == "time1"
        )));
    }

    #[test]
    fn test_combinator_keeps_context() {
        let description = nested().entry(
            "time1",
            nested().entry("$or", nested().entry("$lt", 1).entry("$gt", 9)),
        );
        let nodes = normalize(&description).expect("normalizes");
        let [PredicateNode::ColumnScope { children, .. }] = nodes.as_slice() else {
            panic!("expected a scope");
        };
        let [
            PredicateNode::Combinator {
                combinator: Combinator::Or,
                children,
            },
        ] = children.as_slice()
        else {
            panic!("expected $or inside the scope");
        };
        assert_eq!(children.len(), 2);
    }

    #[test]
    fn test_operator_key_without_context_is_a_column() {
        let nodes = normalize(&nested().entry("$lt", 5)).expect("normalizes");
        assert!(matches!(
            nodes.as_slice(),
            [PredicateNode::Literal { column, .. }] if column == "$lt"
        ));
    }

    #[test]
    fn test_unknown_operator_rejected() {
        let error = normalize(&nested().entry("time1", nested().entry("$like", 5)))
            .expect_err("unknown operator");
        assert_eq!(
            error,
            CompileError::UnknownOperator {
                column: "time1".to_string(),
                operator: "$like".to_string(),
            }
        );
    }

    #[test]
    fn test_operand_shapes_checked() {
        let cases = [
            nested().entry("$between", [1]),
            nested().entry("$between", vec![ValueLiteral::from("a"), ValueLiteral::from(2)]),
            nested().entry("$in", 3),
            nested().entry("$isNull", "yes"),
            nested().entry("$match", "literal text"),
            nested().entry("$lt", [1, 2]),
        ];
        for body in cases {
            let error = normalize(&nested().entry("time1", body)).expect_err("bad operand");
            assert!(matches!(error, CompileError::InvalidOperand { .. }), "{error}");
        }
    }

    #[test]
    fn test_combinator_requires_nested_description() {
        let error = normalize(&nested().entry("$and", 1)).expect_err("bad combinator");
        assert_eq!(error.to_string(), "$and expects a nested description, got literal");
    }

    #[test]
    fn test_bare_array_is_unsupported() {
        let error = normalize(&nested().entry("time1", [1, 2])).expect_err("bare array");
        assert_eq!(
            error,
            CompileError::UnsupportedLeaf {
                column: "time1".to_string(),
                found: "array",
            }
        );
    }
}
