use super::OpIterator;
use super::error::{ExecutionError, ExecutionResult};
use crate::database::Database;
use crate::storage::{Field, FieldType, StorageError, Tuple, TupleDesc};
use crate::transaction::TransactionId;

/// Inserts every tuple produced by the child into a table, through the
/// buffer pool.
///
/// Yields a single one-column tuple holding the number of insertions, and
/// nothing on later calls.
pub struct Insert<'a> {
    db: &'a Database,
    tid: TransactionId,
    child: Box<dyn OpIterator + 'a>,
    table_id: u32,
    desc: TupleDesc,
    opened: bool,
    done: bool,
}

impl<'a> Insert<'a> {
    pub fn new(
        db: &'a Database,
        tid: TransactionId,
        child: Box<dyn OpIterator + 'a>,
        table_id: u32,
    ) -> ExecutionResult<Self> {
        let table_desc = db
            .catalog()
            .tuple_desc(table_id)
            .ok_or(StorageError::UnknownTable(table_id))?;
        if *child.tuple_desc() != table_desc {
            return Err(ExecutionError::SchemaMismatch(format!(
                "cannot insert ({}) into table of ({})",
                child.tuple_desc(),
                table_desc
            )));
        }
        Ok(Self {
            db,
            tid,
            child,
            table_id,
            desc: TupleDesc::new(vec![FieldType::Int], vec![Some("inserted".to_string())]),
            opened: false,
            done: false,
        })
    }
}

impl OpIterator for Insert<'_> {
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
                .insert_tuple(self.db, self.tid, self.table_id, &mut tuple)?;
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
