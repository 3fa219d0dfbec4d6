use super::OpIterator;
use super::error::{ExecutionError, ExecutionResult};
use crate::database::Database;
use crate::storage::{Field, FieldType, Tuple, TupleDesc};
use crate::transaction::TransactionId;

/// Deletes every tuple produced by the child from its table, through the
/// buffer pool.
///
/// Like `Insert`, yields a single count tuple and nothing afterwards.
pub struct Delete<'a> {
    db: &'a Database,
    tid: TransactionId,
    child: Box<dyn OpIterator + 'a>,
    desc: TupleDesc,
    opened: bool,
    done: bool,
}

impl<'a> Delete<'a> {
    pub fn new(db: &'a Database, tid: TransactionId, child: Box<dyn OpIterator + 'a>) -> Self {
        Self {
            db,
            tid,
            child,
            desc: TupleDesc::new(vec![FieldType::Int], vec![Some("deleted".to_string())]),
            opened: false,
            done: false,
        }
    }
}

impl OpIterator for Delete<'_> {
    fn open(&mut self) -> ExecutionResult<()> {
        self.child.open()?;
        self.opened = true;
        self.done = false;
        Ok(())
    }

    fn has_next(&mut self) -> ExecutionResult<bool> {
        if !self.opened {
            return Err(ExecutionError::NotOpen);
        }
        Ok(!self.done)
    }

    fn next(&mut self) -> ExecutionResult<Tuple> {
        if !self.opened {
            return Err(ExecutionError::NotOpen);
        }
        if self.done {
            return Err(ExecutionError::NoMoreTuples);
        }
        self.done = true;

        let mut count = 0;
        while self.child.has_next()? {
            let mut tuple = self.child.next()?;
            self.db
                .buffer_pool()
                .delete_tuple(self.db, self.tid, &mut tuple)?;
            count += 1;
        }
        Ok(Tuple::new(self.desc.clone(), vec![Field::Int(count)]))
    }

    fn rewind(&mut self) -> ExecutionResult<()> {
        self.child.rewind()?;
        self.done = false;
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.opened = false;
        self.done = false;
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }
}
