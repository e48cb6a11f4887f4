/// Errors raised while normalizing or compiling a predicate description.
///
/// Compilation fails fast: the first offending entry is reported and no
/// partial predicate is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// A column reference does not resolve against the target table.
    UnknownColumn { column: String, table: String },
    /// A `$`-prefixed key under a column is not a known operator.
    UnknownOperator { column: String, operator: String },
    /// An operator or combinator was given a value of the wrong shape.
    InvalidOperand {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
    /// An array or pattern was given without an operator to interpret it.
    UnsupportedLeaf { column: String, found: &'static str },
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownColumn { column, table } => {
                write!(f, "Column was not defined in table, {column} in {table}")
            }
            Self::UnknownOperator { column, operator } => {
                write!(f, "unknown operator {operator} on column {column}")
            }
            Self::InvalidOperand {
                key,
                expected,
                found,
            } => write!(f, "{key} expects {expected}, got {found}"),
            Self::UnsupportedLeaf { column, found } => {
                write!(f, "{found} value for column {column} needs an operator")
            }
        }
    }
}

impl std::error::Error for CompileError {}
