use std::fmt;

use super::error::{ExecutionError, ExecutionResult};
use crate::storage::{Field, Tuple};

/// Comparison operator of a selection or join predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateOp {
    Equals,
    GreaterThan,
    LessThan,
    LessThanOrEq,
    GreaterThanOrEq,
    NotEquals,
}

impl fmt::Display for PredicateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            PredicateOp::Equals => "=",
            PredicateOp::GreaterThan => ">",
            PredicateOp::LessThan => "<",
            PredicateOp::LessThanOrEq => "<=",
            PredicateOp::GreaterThanOrEq => ">=",
            PredicateOp::NotEquals => "<>",
        };
        write!(f, "{}", symbol)
    }
}

/// Evaluate `left op right`; integers compare numerically, strings
/// lexicographically. Comparing across types is a schema error.
pub(crate) fn compare_fields(
    left: &Field,
    op: PredicateOp,
    right: &Field,
) -> ExecutionResult<bool> {
    let ordering = match (left, right) {
        (Field::Int(a), Field::Int(b)) => a.cmp(b),
        (Field::Str(a), Field::Str(b)) => a.cmp(b),
        _ => {
            return Err(ExecutionError::TypeMismatch(
                left.field_type(),
                right.field_type(),
            ));
        }
    };
    Ok(match op {
        PredicateOp::Equals => ordering.is_eq(),
        PredicateOp::GreaterThan => ordering.is_gt(),
        PredicateOp::LessThan => ordering.is_lt(),
        PredicateOp::LessThanOrEq => ordering.is_le(),
        PredicateOp::GreaterThanOrEq => ordering.is_ge(),
        PredicateOp::NotEquals => ordering.is_ne(),
    })
}

/// Compares one field of a tuple against a constant
#[derive(Debug, Clone)]
pub struct Predicate {
    field: usize,
    op: PredicateOp,
    operand: Field,
}

impl Predicate {
    pub fn new(field: usize, op: PredicateOp, operand: Field) -> Self {
        Self { field, op, operand }
    }

    pub fn field(&self) -> usize {
        self.field
    }

    pub fn op(&self) -> PredicateOp {
        self.op
    }

    pub fn operand(&self) -> &Field {
        &self.operand
    }

    pub fn filter(&self, tuple: &Tuple) -> ExecutionResult<bool> {
        let field = tuple
            .field(self.field)
            .ok_or(ExecutionError::FieldIndex(self.field))?;
        compare_fields(field, self.op, &self.operand)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{} {} {}", self.field, self.op, self.operand)
    }
}

/// Compares a field of one tuple against a field of another
#[derive(Debug, Clone)]
pub struct JoinPredicate {
    field1: usize,
    op: PredicateOp,
    field2: usize,
}

impl JoinPredicate {
    pub fn new(field1: usize, op: PredicateOp, field2: usize) -> Self {
        Self { field1, op, field2 }
    }

    pub fn field1(&self) -> usize {
        self.field1
    }

    pub fn field2(&self) -> usize {
        self.field2
    }

    pub fn op(&self) -> PredicateOp {
        self.op
    }

    pub fn filter(&self, left: &Tuple, right: &Tuple) -> ExecutionResult<bool> {
        let a = left
            .field(self.field1)
            .ok_or(ExecutionError::FieldIndex(self.field1))?;
        let b = right
            .field(self.field2)
            .ok_or(ExecutionError::FieldIndex(self.field2))?;
        compare_fields(a, self.op, b)
    }
}
