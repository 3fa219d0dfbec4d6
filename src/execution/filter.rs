use super::OpIterator;
use super::error::{ExecutionError, ExecutionResult};
use super::predicate::Predicate;
use crate::storage::{Tuple, TupleDesc};

/// Yields the child's tuples that satisfy a predicate
pub struct Filter<'a> {
    predicate: Predicate,
    child: Box<dyn OpIterator + 'a>,
    desc: TupleDesc,
    opened: bool,
    lookahead: Option<Tuple>,
}

impl<'a> Filter<'a> {
    pub fn new(predicate: Predicate, child: Box<dyn OpIterator + 'a>) -> Self {
        let desc = child.tuple_desc().clone();
        Self {
            predicate,
            child,
            desc,
            opened: false,
            lookahead: None,
        }
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    fn fetch_next(&mut self) -> ExecutionResult<Option<Tuple>> {
        while self.child.has_next()? {
            let tuple = self.child.next()?;
            if self.predicate.filter(&tuple)? {
                return Ok(Some(tuple));
            }
        }
        Ok(None)
    }
}

impl OpIterator for Filter<'_> {
    fn open(&mut self) -> ExecutionResult<()> {
        self.child.open()?;
        self.opened = true;
        self.lookahead = None;
        Ok(())
    }

    fn has_next(&mut self) -> ExecutionResult<bool> {
        if !self.opened {
            return Err(ExecutionError::NotOpen);
        }
        if self.lookahead.is_none() {
            self.lookahead = self.fetch_next()?;
        }
        Ok(self.lookahead.is_some())
    }

    fn next(&mut self) -> ExecutionResult<Tuple> {
        self.has_next()?;
        self.lookahead.take().ok_or(ExecutionError::NoMoreTuples)
    }

    fn rewind(&mut self) -> ExecutionResult<()> {
        self.child.rewind()?;
        self.lookahead = None;
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.opened = false;
        self.lookahead = None;
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }
}
