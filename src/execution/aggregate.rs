use super::OpIterator;
use super::aggregator::{AggregateOp, Aggregator, IntegerAggregator, StringAggregator};
use super::error::{ExecutionError, ExecutionResult};
use crate::storage::{FieldType, Tuple, TupleDesc};

/// Aggregation operator over a single column, optionally grouped by a
/// single column.
///
/// The child is drained into the aggregator the first time the operator is
/// opened; afterwards the operator iterates the per-group results.
pub struct Aggregate<'a> {
    child: Box<dyn OpIterator + 'a>,
    agg: Box<dyn Aggregator>,
    agg_field: usize,
    group_field: Option<usize>,
    op: AggregateOp,
    desc: TupleDesc,
    merged: bool,
    results: Option<std::vec::IntoIter<Tuple>>,
}

impl<'a> Aggregate<'a> {
    pub fn new(
        child: Box<dyn OpIterator + 'a>,
        agg_field: usize,
        group_field: Option<usize>,
        op: AggregateOp,
    ) -> ExecutionResult<Self> {
        let child_desc = child.tuple_desc();
        let agg_type = child_desc
            .field_type(agg_field)
            .ok_or(ExecutionError::FieldIndex(agg_field))?;
        let group_type = match group_field {
            None => None,
            Some(idx) => Some(
                child_desc
                    .field_type(idx)
                    .ok_or(ExecutionError::FieldIndex(idx))?,
            ),
        };

        let agg: Box<dyn Aggregator> = match agg_type {
            FieldType::Int => Box::new(IntegerAggregator::new(
                group_field,
                group_type,
                agg_field,
                op,
            )),
            FieldType::Str => Box::new(StringAggregator::new(
                group_field,
                group_type,
                agg_field,
                op,
            )?),
        };

        // output columns carry the child's names: the aggregate column is
        // labelled OP(column), the group column keeps its own name
        let agg_name = format!(
            "{}({})",
            op,
            child_desc.field_name(agg_field).unwrap_or("")
        );
        let desc = match (group_field, group_type) {
            (Some(idx), Some(group_type)) => TupleDesc::new(
                vec![group_type, FieldType::Int],
                vec![
                    child_desc.field_name(idx).map(str::to_string),
                    Some(agg_name),
                ],
            ),
            _ => TupleDesc::new(vec![FieldType::Int], vec![Some(agg_name)]),
        };

        Ok(Self {
            child,
            agg,
            agg_field,
            group_field,
            op,
            desc,
            merged: false,
            results: None,
        })
    }

    pub fn aggregate_field(&self) -> usize {
        self.agg_field
    }

    pub fn group_field(&self) -> Option<usize> {
        self.group_field
    }

    pub fn aggregate_op(&self) -> AggregateOp {
        self.op
    }
}

impl OpIterator for Aggregate<'_> {
    fn open(&mut self) -> ExecutionResult<()> {
        self.child.open()?;
        if !self.merged {
            while self.child.has_next()? {
                let tuple = self.child.next()?;
                self.agg.merge_tuple_into_group(&tuple)?;
            }
            self.merged = true;
        }
        self.results = Some(self.agg.result_tuples().into_iter());
        Ok(())
    }

    fn has_next(&mut self) -> ExecutionResult<bool> {
        match &self.results {
            Some(results) => Ok(!results.as_slice().is_empty()),
            None => Err(ExecutionError::NotOpen),
        }
    }

    fn next(&mut self) -> ExecutionResult<Tuple> {
        self.results
            .as_mut()
            .ok_or(ExecutionError::NotOpen)?
            .next()
            .ok_or(ExecutionError::NoMoreTuples)
    }

    fn rewind(&mut self) -> ExecutionResult<()> {
        self.results = Some(self.agg.result_tuples().into_iter());
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.results = None;
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::storage::DbFile;
    use crate::database::Database;
    use crate::execution::SeqScan;
    use crate::storage::{Field, HeapFile};
    use crate::transaction::TransactionId;
    use tempfile::TempDir;

    fn setup(rows: &[(i32, i32)]) -> (TempDir, Database, u32) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("log")).unwrap();
        let desc = TupleDesc::new(
            vec![FieldType::Int, FieldType::Int],
            vec![Some("g".to_string()), Some("x".to_string())],
        );
        let file = Arc::new(HeapFile::new(dir.path().join("t.dat"), desc.clone()).unwrap());
        let table_id = file.id();
        db.catalog().add_table(file, "t");

        let tid = TransactionId::new();
        for &(g, x) in rows {
            let mut tuple = Tuple::new(desc.clone(), vec![Field::Int(g), Field::Int(x)]);
            db.buffer_pool()
                .insert_tuple(&db, tid, table_id, &mut tuple)
                .unwrap();
        }
        db.buffer_pool().transaction_complete(&db, tid, true).unwrap();
        (dir, db, table_id)
    }

    fn drain(op: &mut dyn OpIterator) -> Vec<Vec<i32>> {
        let mut rows = Vec::new();
        while op.has_next().unwrap() {
            let tuple = op.next().unwrap();
            rows.push(
                tuple
                    .fields()
                    .iter()
                    .map(|field| match field {
                        Field::Int(v) => *v,
                        Field::Str(_) => unreachable!(),
                    })
                    .collect(),
            );
        }
        rows.sort();
        rows
    }

    #[test]
    fn test_ungrouped_sum() {
        let (_dir, db, table_id) = setup(&[(0, 1), (0, 2), (1, 3)]);
        let scan = SeqScan::new(&db, TransactionId::new(), table_id, "t").unwrap();
        let mut agg = Aggregate::new(Box::new(scan), 1, None, AggregateOp::Sum).unwrap();
        assert_eq!(agg.tuple_desc().field_name(0), Some("SUM(t.x)"));

        agg.open().unwrap();
        assert_eq!(drain(&mut agg), vec![vec![6]]);
    }

    #[test]
    fn test_grouped_max() {
        let (_dir, db, table_id) = setup(&[(1, 5), (1, 9), (2, 4), (2, 2)]);
        let scan = SeqScan::new(&db, TransactionId::new(), table_id, "t").unwrap();
        let mut agg = Aggregate::new(Box::new(scan), 1, Some(0), AggregateOp::Max).unwrap();
        assert_eq!(agg.tuple_desc().num_fields(), 2);
        assert_eq!(agg.tuple_desc().field_name(0), Some("t.g"));
        assert_eq!(agg.tuple_desc().field_name(1), Some("MAX(t.x)"));

        agg.open().unwrap();
        assert_eq!(drain(&mut agg), vec![vec![1, 9], vec![2, 4]]);
    }

    #[test]
    fn test_rewind_replays_results() {
        let (_dir, db, table_id) = setup(&[(1, 5), (2, 6)]);
        let scan = SeqScan::new(&db, TransactionId::new(), table_id, "t").unwrap();
        let mut agg = Aggregate::new(Box::new(scan), 1, Some(0), AggregateOp::Count).unwrap();
        agg.open().unwrap();
        let first = drain(&mut agg);
        agg.rewind().unwrap();
        assert_eq!(drain(&mut agg), first);
    }

    #[test]
    fn test_empty_input_no_groups() {
        let (_dir, db, table_id) = setup(&[]);
        let scan = SeqScan::new(&db, TransactionId::new(), table_id, "t").unwrap();
        let mut agg = Aggregate::new(Box::new(scan), 1, Some(0), AggregateOp::Sum).unwrap();
        agg.open().unwrap();
        assert!(!agg.has_next().unwrap());
    }
}
