use super::OpIterator;
use super::error::{ExecutionError, ExecutionResult};
use super::predicate::JoinPredicate;
use crate::storage::{Tuple, TupleDesc};

/// Nested-loops join.
///
/// For every left tuple the right child is rewound and scanned in full;
/// matches are emitted as the concatenation of the two tuples.
pub struct Join<'a> {
    predicate: JoinPredicate,
    left: Box<dyn OpIterator + 'a>,
    right: Box<dyn OpIterator + 'a>,
    desc: TupleDesc,
    current_left: Option<Tuple>,
    opened: bool,
    lookahead: Option<Tuple>,
}

impl<'a> Join<'a> {
    pub fn new(
        predicate: JoinPredicate,
        left: Box<dyn OpIterator + 'a>,
        right: Box<dyn OpIterator + 'a>,
    ) -> Self {
        let desc = TupleDesc::merge(left.tuple_desc(), right.tuple_desc());
        Self {
            predicate,
            left,
            right,
            desc,
            current_left: None,
            opened: false,
            lookahead: None,
        }
    }

    pub fn predicate(&self) -> &JoinPredicate {
        &self.predicate
    }

    fn merge(&self, left: &Tuple, right: &Tuple) -> Tuple {
        let mut fields = Vec::with_capacity(left.fields().len() + right.fields().len());
        fields.extend_from_slice(left.fields());
        fields.extend_from_slice(right.fields());
        Tuple::new(self.desc.clone(), fields)
    }

    fn fetch_next(&mut self) -> ExecutionResult<Option<Tuple>> {
        loop {
            let left = match &self.current_left {
                Some(tuple) => tuple.clone(),
                None => {
                    if !self.left.has_next()? {
                        return Ok(None);
                    }
                    let tuple = self.left.next()?;
                    self.right.rewind()?;
                    self.current_left = Some(tuple.clone());
                    tuple
                }
            };

            while self.right.has_next()? {
                let right = self.right.next()?;
                if self.predicate.filter(&left, &right)? {
                    return Ok(Some(self.merge(&left, &right)));
                }
            }
            self.current_left = None;
        }
    }
}

impl OpIterator for Join<'_> {
    fn open(&mut self) -> ExecutionResult<()> {
        self.left.open()?;
        self.right.open()?;
        self.opened = true;
        self.current_left = None;
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
        self.left.rewind()?;
        self.right.rewind()?;
        self.current_left = None;
        self.lookahead = None;
        Ok(())
    }

    fn close(&mut self) {
        self.left.close();
        self.right.close();
        self.opened = false;
        self.current_left = None;
        self.lookahead = None;
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }
}
