use thiserror::Error;

use crate::execution::ExecutionError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("Value {value} outside histogram range [{min}, {max}]")]
    OutOfRange { value: i32, min: i32, max: i32 },

    #[error("No histogram for column {0}")]
    NoHistogram(usize),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type StatsResult<T> = Result<T, StatsError>;
