use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("No more tuples")]
    NoMoreTuples,

    #[error("Operator is not open")]
    NotOpen,

    #[error("Field index {0} out of range")]
    FieldIndex(usize),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Cannot compare {0} with {1}")]
    TypeMismatch(crate::storage::FieldType, crate::storage::FieldType),

    #[error("Aggregate {0} is not supported over strings")]
    UnsupportedAggregate(super::AggregateOp),
}

pub type ExecutionResult<T> = Result<T, ExecutionError>;
