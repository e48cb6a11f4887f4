//! Predicate compiler.
//!
//! Compiles a `PredicateDescription` into an engine `Predicate` for one
//! table. Compilation runs in two phases: the description is normalized
//! into `PredicateNode`s, then each node is resolved against the table's
//! columns and mapped onto the engine's predicate builders.
//!
//! # Invariants
//!
//! - Every column reference resolves or compilation fails with
//!   `CompileError::UnknownColumn`. Column scopes are resolved too, even
//!   when their body produces no predicate.
//! - Top-level entries are conjoined.
//! - `$not` negates its first child only; further children are ignored.
//! - A combinator whose body produces nothing contributes nothing.

use super::ast::{self, Combinator, Operand, Operator, PredicateNode};
use super::description::PredicateDescription;
use super::error::CompileError;
use crate::storage::{Column, ColumnResolver, Predicate};

/// Compiles predicate descriptions against a column resolver.
pub struct PredicateCompiler;

impl PredicateCompiler {
    /// Compile a description for the resolver's table.
    ///
    /// Returns `Ok(None)` when the description yields no predicate, for
    /// example when it is empty.
    pub fn compile(
        description: &PredicateDescription,
        resolver: &impl ColumnResolver,
    ) -> Result<Option<Predicate>, CompileError> {
        let nodes = ast::normalize(description)?;
        let predicates = compile_nodes(&nodes, resolver)?;
        let predicate = conjoin(predicates);
        if let Some(predicate) = &predicate {
            tracing::debug!(
                "compiled predicate for {}: {predicate}",
                resolver.table_name()
            );
        }
        Ok(predicate)
    }
}

fn compile_nodes(
    nodes: &[PredicateNode],
    resolver: &impl ColumnResolver,
) -> Result<Vec<Predicate>, CompileError> {
    let mut predicates = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            PredicateNode::Literal { column, value } => {
                predicates.push(resolve(column, resolver)?.eq(value.clone()));
            }
            PredicateNode::Operator {
                column,
                operator,
                operand,
            } => {
                let column = resolve(column, resolver)?;
                predicates.push(build(&column, *operator, operand));
            }
            PredicateNode::Combinator {
                combinator,
                children,
            } => {
                let children = compile_nodes(children, resolver)?;
                let combined = match combinator {
                    Combinator::And => conjoin(children),
                    Combinator::Or => disjoin(children),
                    Combinator::Not => children.into_iter().next().map(Predicate::not),
                };
                predicates.extend(combined);
            }
            PredicateNode::ColumnScope { column, children } => {
                resolve(column, resolver)?;
                predicates.extend(compile_nodes(children, resolver)?);
            }
        }
    }
    Ok(predicates)
}

fn resolve(column: &str, resolver: &impl ColumnResolver) -> Result<Column, CompileError> {
    resolver
        .column(column)
        .ok_or_else(|| CompileError::UnknownColumn {
            column: column.to_string(),
            table: resolver.table_name().to_string(),
        })
}

/// Map an operator onto the column's predicate builder.
///
/// Normalization pairs each operator with its operand shape, so the operand
/// decides the builder and the operator only picks among same-shaped ones.
fn build(column: &Column, operator: Operator, operand: &Operand) -> Predicate {
    match operand {
        Operand::Value(v) => match operator {
            Operator::Ne => column.ne(v.clone()),
            Operator::Lt => column.lt(v.clone()),
            Operator::Lte => column.lte(v.clone()),
            Operator::Gt => column.gt(v.clone()),
            Operator::Gte => column.gte(v.clone()),
            _ => column.eq(v.clone()),
        },
        Operand::Pattern(p) if operator == Operator::NotMatch => {
            Predicate::not(column.matches(p.clone()))
        }
        Operand::Pattern(p) => column.matches(p.clone()),
        Operand::Range(low, high) => column.between(low.clone(), high.clone()),
        Operand::Set(values) => column.in_list(values.clone()),
        Operand::Flag(true) => column.is_null(),
        Operand::Flag(false) => column.is_not_null(),
    }
}

fn conjoin(mut predicates: Vec<Predicate>) -> Option<Predicate> {
    match predicates.len() {
        0 => None,
        1 => predicates.pop(),
        _ => Some(Predicate::and(predicates)),
    }
}

fn disjoin(mut predicates: Vec<Predicate>) -> Option<Predicate> {
    match predicates.len() {
        0 => None,
        1 => predicates.pop(),
        _ => Some(Predicate::or(predicates)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::TableSchema;
    use crate::types::{Row, ValueType};
    use regex::Regex;

    fn schema() -> TableSchema {
        TableSchema::new("Task")
            .with_column("_id", ValueType::String)
            .with_column("time", ValueType::Number)
            .with_nullable_column("done", ValueType::Boolean)
    }

    fn desc() -> PredicateDescription {
        PredicateDescription::new()
    }

    fn compile(description: &PredicateDescription) -> Option<Predicate> {
        PredicateCompiler::compile(description, &schema()).expect("compiles")
    }

    fn row(time: i32, done: Option<bool>) -> Row {
        Row::new()
            .with("_id", format!("task:{time}"))
            .with("time", time)
            .with("done", done)
    }

    #[test]
    fn test_empty_description_compiles_to_none() {
        assert!(compile(&desc()).is_none());
        assert!(compile(&desc().entry("$and", desc())).is_none());
        assert!(compile(&desc().entry("$not", desc())).is_none());
    }

    #[test]
    fn test_unknown_column_message() {
        let error = PredicateCompiler::compile(&desc().entry("nope", 1), &schema())
            .expect_err("unknown column");
        assert_eq!(error.to_string(), "Column was not defined in table, nope in Task");
    }

    #[test]
    fn test_operator_without_context_is_unknown_column() {
        let error = PredicateCompiler::compile(&desc().entry("$lt", 5), &schema())
            .expect_err("operator outside a column");
        assert_eq!(
            error,
            CompileError::UnknownColumn {
                column: "$lt".to_string(),
                table: "Task".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_scope_column_fails_even_if_empty() {
        let error = PredicateCompiler::compile(&desc().entry("nope", desc()), &schema())
            .expect_err("unknown scope");
        assert!(matches!(error, CompileError::UnknownColumn { column, .. } if column == "nope"));
    }

    #[test]
    fn test_eq_is_implicit_equality() {
        let explicit = compile(&desc().entry("time", desc().entry("$eq", 3))).expect("predicate");
        let implicit = compile(&desc().entry("time", 3)).expect("predicate");
        assert_eq!(explicit.to_string(), implicit.to_string());
        assert!(explicit.eval(&row(3, None)));
        assert!(!explicit.eval(&row(4, None)));
    }

    #[test]
    fn test_operators() {
        let cases: Vec<(PredicateDescription, fn(i32) -> bool)> = vec![
            (desc().entry("$ne", 3), |t| t != 3),
            (desc().entry("$lt", 3), |t| t < 3),
            (desc().entry("$lte", 3), |t| t <= 3),
            (desc().entry("$gt", 3), |t| t > 3),
            (desc().entry("$gte", 3), |t| t >= 3),
            (desc().entry("$between", [2, 4]), |t| (2..=4).contains(&t)),
            (desc().entry("$in", [1, 5, 50]), |t| t == 1 || t == 5),
        ];
        for (body, expected) in cases {
            let predicate = compile(&desc().entry("time", body)).expect("predicate");
            for t in 0..8 {
                assert_eq!(predicate.eval(&row(t, None)), expected(t), "{predicate} at {t}");
            }
        }
    }

    #[test]
    fn test_pattern_operators() {
        let pattern = Regex::new(r"task:[12]$").expect("regex");
        let matched = compile(&desc().entry("_id", desc().entry("$match", pattern.clone())))
            .expect("predicate");
        let unmatched =
            compile(&desc().entry("_id", desc().entry("$notMatch", pattern))).expect("predicate");
        assert!(matched.eval(&row(2, None)));
        assert!(!matched.eval(&row(3, None)));
        assert!(unmatched.eval(&row(3, None)));
    }

    #[test]
    fn test_is_null() {
        let null = compile(&desc().entry("done", desc().entry("$isNull", true))).expect("predicate");
        let not_null =
            compile(&desc().entry("done", desc().entry("$isNull", false))).expect("predicate");
        assert!(null.eval(&row(1, None)));
        assert!(!null.eval(&row(1, Some(false))));
        assert!(not_null.eval(&row(1, Some(true))));
    }

    #[test]
    fn test_not_negates_first_child_only() {
        let predicate = compile(&desc().entry("$not", desc().entry("time", 1).entry("time", 2)))
            .expect("predicate");
        assert!(!predicate.eval(&row(1, None)));
        // The second child is ignored, so time = 2 still passes.
        assert!(predicate.eval(&row(2, None)));
    }

    #[test]
    fn test_or_inside_column_scope() {
        let predicate = compile(&desc().entry(
            "time",
            desc().entry("$or", desc().entry("$lt", 2).entry("$gt", 5)),
        ))
        .expect("predicate");
        let selected: Vec<i32> = (0..8).filter(|t| predicate.eval(&row(*t, None))).collect();
        assert_eq!(selected, vec![0, 1, 6, 7]);
    }

    #[test]
    fn test_top_level_entries_conjoin() {
        let predicate = compile(
            &desc()
                .entry("time", desc().entry("$gte", 2))
                .entry("done", false),
        )
        .expect("predicate");
        assert!(predicate.eval(&row(3, Some(false))));
        assert!(!predicate.eval(&row(3, Some(true))));
        assert!(!predicate.eval(&row(1, Some(false))));
    }
}
