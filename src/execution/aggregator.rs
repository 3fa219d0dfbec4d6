use std::collections::HashMap;
use std::fmt;

use super::OpIterator;
use super::error::{ExecutionError, ExecutionResult};
use crate::storage::{Field, FieldType, Tuple, TupleDesc};

/// Supported aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregateOp::Count => "COUNT",
            AggregateOp::Sum => "SUM",
            AggregateOp::Avg => "AVG",
            AggregateOp::Min => "MIN",
            AggregateOp::Max => "MAX",
        };
        write!(f, "{}", name)
    }
}

/// Grouped aggregation state fed one tuple at a time.
///
/// The group key is `None` when the aggregation is ungrouped; results are
/// one tuple per group, `(aggregate)` or `(group, aggregate)` depending on
/// whether grouping is present.
pub trait Aggregator {
    fn merge_tuple_into_group(&mut self, tuple: &Tuple) -> ExecutionResult<()>;
    fn output_desc(&self) -> TupleDesc;
    fn result_tuples(&self) -> Vec<Tuple>;
}

fn output_desc(group_type: Option<FieldType>) -> TupleDesc {
    match group_type {
        None => TupleDesc::new(
            vec![FieldType::Int],
            vec![Some("aggregateValue".to_string())],
        ),
        Some(group_type) => TupleDesc::new(
            vec![group_type, FieldType::Int],
            vec![
                Some("groupValue".to_string()),
                Some("aggregateValue".to_string()),
            ],
        ),
    }
}

/// Resolve and type-check the group key of one input tuple
fn group_key(
    tuple: &Tuple,
    group_field: Option<usize>,
    group_type: Option<FieldType>,
) -> ExecutionResult<Option<Field>> {
    let Some(idx) = group_field else {
        return Ok(None);
    };
    let field = tuple.field(idx).ok_or(ExecutionError::FieldIndex(idx))?;
    if let Some(expected) = group_type
        && field.field_type() != expected
    {
        return Err(ExecutionError::SchemaMismatch(format!(
            "group value is {}, expected {}",
            field.field_type(),
            expected
        )));
    }
    Ok(Some(field.clone()))
}

fn result_tuple(desc: &TupleDesc, group: Option<&Field>, value: i32) -> Tuple {
    match group {
        None => Tuple::new(desc.clone(), vec![Field::Int(value)]),
        Some(group) => Tuple::new(desc.clone(), vec![group.clone(), Field::Int(value)]),
    }
}

/// Aggregator over an integer column; supports COUNT, SUM, AVG, MIN, MAX.
///
/// Every group's values are materialized, so memory is proportional to the
/// input. AVG is the integer division of the integer sum.
pub struct IntegerAggregator {
    group_field: Option<usize>,
    group_type: Option<FieldType>,
    agg_field: usize,
    op: AggregateOp,
    groups: HashMap<Option<Field>, Vec<i32>>,
}

impl IntegerAggregator {
    pub fn new(
        group_field: Option<usize>,
        group_type: Option<FieldType>,
        agg_field: usize,
        op: AggregateOp,
    ) -> Self {
        Self {
            group_field,
            group_type,
            agg_field,
            op,
            groups: HashMap::new(),
        }
    }

    pub fn iter(&self) -> AggregatorIter<'_> {
        AggregatorIter::new(self)
    }
}

impl Aggregator for IntegerAggregator {
    fn merge_tuple_into_group(&mut self, tuple: &Tuple) -> ExecutionResult<()> {
        let key = group_key(tuple, self.group_field, self.group_type)?;
        let value = match tuple
            .field(self.agg_field)
            .ok_or(ExecutionError::FieldIndex(self.agg_field))?
        {
            Field::Int(v) => *v,
            field => {
                return Err(ExecutionError::SchemaMismatch(format!(
                    "aggregate value is {}, expected INT",
                    field.field_type()
                )));
            }
        };
        self.groups.entry(key).or_default().push(value);
        Ok(())
    }

    fn output_desc(&self) -> TupleDesc {
        output_desc(self.group_type)
    }

    fn result_tuples(&self) -> Vec<Tuple> {
        let desc = self.output_desc();
        self.groups
            .iter()
            .map(|(group, values)| {
                let sum: i64 = values.iter().map(|&v| v as i64).sum();
                let value = match self.op {
                    AggregateOp::Count => values.len() as i32,
                    AggregateOp::Sum => sum as i32,
                    AggregateOp::Avg => (sum / values.len() as i64) as i32,
                    // a group exists only because at least one value was merged
                    AggregateOp::Min => values.iter().copied().min().unwrap_or(0),
                    AggregateOp::Max => values.iter().copied().max().unwrap_or(0),
                };
                result_tuple(&desc, group.as_ref(), value)
            })
            .collect()
    }
}

/// Aggregator over a string column; COUNT is the only supported function,
/// and only the per-group count is kept
pub struct StringAggregator {
    group_field: Option<usize>,
    group_type: Option<FieldType>,
    agg_field: usize,
    groups: HashMap<Option<Field>, i32>,
}

impl StringAggregator {
    pub fn new(
        group_field: Option<usize>,
        group_type: Option<FieldType>,
        agg_field: usize,
        op: AggregateOp,
    ) -> ExecutionResult<Self> {
        if op != AggregateOp::Count {
            return Err(ExecutionError::UnsupportedAggregate(op));
        }
        Ok(Self {
            group_field,
            group_type,
            agg_field,
            groups: HashMap::new(),
        })
    }

    pub fn iter(&self) -> AggregatorIter<'_> {
        AggregatorIter::new(self)
    }
}

impl Aggregator for StringAggregator {
    fn merge_tuple_into_group(&mut self, tuple: &Tuple) -> ExecutionResult<()> {
        let key = group_key(tuple, self.group_field, self.group_type)?;
        tuple
            .field(self.agg_field)
            .ok_or(ExecutionError::FieldIndex(self.agg_field))?;
        *self.groups.entry(key).or_insert(0) += 1;
        Ok(())
    }

    fn output_desc(&self) -> TupleDesc {
        output_desc(self.group_type)
    }

    fn result_tuples(&self) -> Vec<Tuple> {
        let desc = self.output_desc();
        self.groups
            .iter()
            .map(|(group, &count)| result_tuple(&desc, group.as_ref(), count))
            .collect()
    }
}

/// Operator view of an aggregator's results.
///
/// The result set is computed from the aggregator's state at `open`, so a
/// rewind (or a reopen) reflects tuples merged since.
pub struct AggregatorIter<'a> {
    agg: &'a dyn Aggregator,
    desc: TupleDesc,
    results: Option<std::vec::IntoIter<Tuple>>,
}

impl<'a> AggregatorIter<'a> {
    pub fn new(agg: &'a dyn Aggregator) -> Self {
        let desc = agg.output_desc();
        Self {
            agg,
            desc,
            results: None,
        }
    }
}

impl OpIterator for AggregatorIter<'_> {
    fn open(&mut self) -> ExecutionResult<()> {
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
        self.close();
        self.open()
    }

    fn close(&mut self) {
        self.results = None;
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }
}
