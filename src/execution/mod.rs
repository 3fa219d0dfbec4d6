mod aggregate;
mod aggregator;
mod delete;
mod error;
mod filter;
mod insert;
mod join;
mod predicate;
mod seq_scan;

pub use aggregate::Aggregate;
pub use aggregator::{
    AggregateOp, Aggregator, AggregatorIter, IntegerAggregator, StringAggregator,
};
pub use delete::Delete;
pub use error::{ExecutionError, ExecutionResult};
pub use filter::Filter;
pub use insert::Insert;
pub use join::Join;
pub use predicate::{JoinPredicate, Predicate, PredicateOp};
pub use seq_scan::SeqScan;

use crate::storage::{Tuple, TupleDesc};

/// Pull-based operator contract.
///
/// An operator tree is driven from the root: `open`, then alternating
/// `has_next`/`next` until exhausted, with `rewind` equivalent to `close`
/// followed by `open`. Iteration is strictly single-threaded per tree.
pub trait OpIterator {
    fn open(&mut self) -> ExecutionResult<()>;
    fn has_next(&mut self) -> ExecutionResult<bool>;
    fn next(&mut self) -> ExecutionResult<Tuple>;
    fn rewind(&mut self) -> ExecutionResult<()>;
    fn close(&mut self);
    fn tuple_desc(&self) -> &TupleDesc;
}
