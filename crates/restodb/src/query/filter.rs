//! Predicates and sort keys accumulated by the query builder.

use serde_json::Value;

/// Comparison operator of a predicate.
///
/// Only the three operators the translator supports; every predicate is
/// AND-ed with the others in the order it was added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// `column = $n`
    Eq,
    /// `column >= $n`
    Gte,
    /// `column <= $n`
    Lte,
}

impl Op {
    pub fn as_sql(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Gte => ">=",
            Op::Lte => "<=",
        }
    }
}

/// One `column <op> value` predicate. The value is always bound, never inlined.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: &'static str,
    pub op: Op,
    pub value: Value,
}

impl Filter {
    pub fn new(column: &'static str, op: Op, value: impl Into<Value>) -> Self {
        Self {
            column,
            op,
            value: value.into(),
        }
    }
}

/// One ORDER BY key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub column: &'static str,
    pub ascending: bool,
}

impl SortKey {
    pub(crate) fn to_sql(self) -> String {
        format!(
            "{} {}",
            self.column,
            if self.ascending { "ASC" } else { "DESC" }
        )
    }
}
