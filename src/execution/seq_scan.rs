use super::OpIterator;
use super::error::{ExecutionError, ExecutionResult};
use crate::database::Database;
use crate::storage::{HeapFileIter, StorageError, Tuple, TupleDesc};
use crate::transaction::TransactionId;

/// Sequential scan of one table on behalf of a transaction.
///
/// The reported schema carries alias-qualified column names
/// (`alias.column`); the tuples themselves keep the table's schema.
pub struct SeqScan<'a> {
    db: &'a Database,
    tid: TransactionId,
    table_id: u32,
    desc: TupleDesc,
    iter: Option<HeapFileIter<'a>>,
}

impl<'a> SeqScan<'a> {
    pub fn new(
        db: &'a Database,
        tid: TransactionId,
        table_id: u32,
        alias: &str,
    ) -> ExecutionResult<Self> {
        let base = db
            .catalog()
            .tuple_desc(table_id)
            .ok_or(StorageError::UnknownTable(table_id))?;
        let types = base.items().iter().map(|item| item.field_type).collect();
        let names = base
            .items()
            .iter()
            .map(|item| item.name.as_ref().map(|name| format!("{}.{}", alias, name)))
            .collect();
        Ok(Self {
            db,
            tid,
            table_id,
            desc: TupleDesc::new(types, names),
            iter: None,
        })
    }

    pub fn table_id(&self) -> u32 {
        self.table_id
    }
}

impl OpIterator for SeqScan<'_> {
    fn open(&mut self) -> ExecutionResult<()> {
        let file = self
            .db
            .catalog()
            .database_file(self.table_id)
            .ok_or(StorageError::UnknownTable(self.table_id))?;
        let mut iter = file.iter(self.db, self.tid);
        iter.open()?;
        self.iter = Some(iter);
        Ok(())
    }

    fn has_next(&mut self) -> ExecutionResult<bool> {
        match &mut self.iter {
            Some(iter) => Ok(iter.has_next()?),
            None => Err(ExecutionError::NotOpen),
        }
    }

    fn next(&mut self) -> ExecutionResult<Tuple> {
        let iter = self.iter.as_mut().ok_or(ExecutionError::NotOpen)?;
        iter.next()?.ok_or(ExecutionError::NoMoreTuples)
    }

    fn rewind(&mut self) -> ExecutionResult<()> {
        let iter = self.iter.as_mut().ok_or(ExecutionError::NotOpen)?;
        iter.rewind()?;
        Ok(())
    }

    fn close(&mut self) {
        self.iter = None;
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }
}
