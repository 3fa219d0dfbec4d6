use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::NUM_HIST_BINS;
use super::error::{StatsError, StatsResult};
use super::int_histogram::IntHistogram;
use super::string_histogram::StringHistogram;
use crate::database::Database;
use crate::execution::{OpIterator, PredicateOp, SeqScan};
use crate::storage::{Field, FieldType, StorageError};
use crate::transaction::TransactionId;

/// Cost charged per page read; sequential reads and seeks are not
/// distinguished
pub const IO_COST_PER_PAGE: usize = 1000;

/// Per-table statistics backing the cost-based optimizer: the table's size
/// plus one histogram per column.
///
/// Built by two full scans: the first learns each integer column's range
/// and the tuple count, the second populates the histograms.
pub struct TableStats {
    num_pages: usize,
    io_cost_per_page: usize,
    total_tuples: usize,
    int_hists: HashMap<usize, IntHistogram>,
    str_hists: HashMap<usize, StringHistogram>,
}

impl TableStats {
    pub fn new(db: &Database, table_id: u32, io_cost_per_page: usize) -> StatsResult<Self> {
        let file = db
            .catalog()
            .database_file(table_id)
            .ok_or(StorageError::UnknownTable(table_id))?;
        let desc = file.tuple_desc().clone();
        let num_pages = file.num_pages()?;
        let num_fields = desc.num_fields();

        let tid = TransactionId::new();
        let mut scan = SeqScan::new(db, tid, table_id, "stats")?;
        scan.open()?;

        let mut mins = vec![i32::MAX; num_fields];
        let mut maxs = vec![i32::MIN; num_fields];
        let mut total_tuples = 0usize;
        while scan.has_next()? {
            let tuple = scan.next()?;
            total_tuples += 1;
            for idx in 0..num_fields {
                if let Some(Field::Int(v)) = tuple.field(idx) {
                    mins[idx] = mins[idx].min(*v);
                    maxs[idx] = maxs[idx].max(*v);
                }
            }
        }

        let mut int_hists = HashMap::new();
        let mut str_hists = HashMap::new();
        for idx in 0..num_fields {
            match desc.field_type(idx) {
                Some(FieldType::Int) => {
                    int_hists.insert(idx, IntHistogram::new(NUM_HIST_BINS, mins[idx], maxs[idx]));
                }
                Some(FieldType::Str) => {
                    str_hists.insert(idx, StringHistogram::new());
                }
                None => {}
            }
        }

        scan.rewind()?;
        while scan.has_next()? {
            let tuple = scan.next()?;
            for idx in 0..num_fields {
                match tuple.field(idx) {
                    Some(Field::Int(v)) => {
                        if let Some(hist) = int_hists.get_mut(&idx) {
                            hist.add_value(*v)?;
                        }
                    }
                    Some(Field::Str(s)) => {
                        if let Some(hist) = str_hists.get_mut(&idx) {
                            hist.add_value(s)?;
                        }
                    }
                    None => {}
                }
            }
        }
        scan.close();
        db.buffer_pool().transaction_complete(db, tid, true)?;

        tracing::debug!(table_id, total_tuples, num_pages, "built table statistics");
        Ok(Self {
            num_pages,
            io_cost_per_page,
            total_tuples,
            int_hists,
            str_hists,
        })
    }

    /// Cost of a full sequential scan; partial pages cost as much as full
    /// ones
    pub fn estimate_scan_cost(&self) -> f64 {
        (self.num_pages * self.io_cost_per_page) as f64
    }

    /// Expected tuple count after applying a predicate with the given
    /// selectivity
    pub fn estimate_table_cardinality(&self, selectivity: f64) -> usize {
        (self.total_tuples as f64 * selectivity) as usize
    }

    /// Selectivity of `column op constant`, dispatched to the column's
    /// histogram by the constant's type
    pub fn estimate_selectivity(
        &self,
        field: usize,
        op: PredicateOp,
        constant: &Field,
    ) -> StatsResult<f64> {
        match constant {
            Field::Int(v) => self
                .int_hists
                .get(&field)
                .map(|hist| hist.estimate_selectivity(op, *v)),
            Field::Str(s) => self
                .str_hists
                .get(&field)
                .map(|hist| hist.estimate_selectivity(op, s)),
        }
        .ok_or(StatsError::NoHistogram(field))
    }

    pub fn total_tuples(&self) -> usize {
        self.total_tuples
    }
}

/// Process-wide table statistics, keyed by table name and populated once at
/// startup
pub struct StatsRegistry {
    map: Mutex<HashMap<String, Arc<TableStats>>>,
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self {
            map: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, table_name: &str) -> Option<Arc<TableStats>> {
        self.map.lock().unwrap().get(table_name).cloned()
    }

    pub fn set(&self, table_name: &str, stats: Arc<TableStats>) {
        self.map.lock().unwrap().insert(table_name.to_string(), stats);
    }

    /// Build statistics for every table in the catalog
    pub fn compute_statistics(&self, db: &Database) -> StatsResult<()> {
        for table_id in db.catalog().table_ids() {
            let stats = TableStats::new(db, table_id, IO_COST_PER_PAGE)?;
            if let Some(name) = db.catalog().table_name(table_id) {
                self.set(&name, Arc::new(stats));
            }
        }
        Ok(())
    }
}

impl Default for StatsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::storage::DbFile;
    use crate::storage::{HeapFile, Tuple, TupleDesc};
    use tempfile::TempDir;

    fn setup(rows: i32) -> (TempDir, Database, u32) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("log")).unwrap();
        let desc = TupleDesc::new(
            vec![FieldType::Int, FieldType::Str],
            vec![Some("n".to_string()), Some("s".to_string())],
        );
        let file = Arc::new(HeapFile::new(dir.path().join("t.dat"), desc.clone()).unwrap());
        let table_id = file.id();
        db.catalog().add_table(file, "t");

        let tid = TransactionId::new();
        for i in 1..=rows {
            let mut tuple = Tuple::new(
                desc.clone(),
                vec![Field::Int(i), Field::Str(format!("row{:04}", i))],
            );
            db.buffer_pool()
                .insert_tuple(&db, tid, table_id, &mut tuple)
                .unwrap();
        }
        db.buffer_pool().transaction_complete(&db, tid, true).unwrap();
        (dir, db, table_id)
    }

    #[test]
    fn test_scan_cost_and_cardinality() {
        let (_dir, db, table_id) = setup(100);
        let stats = TableStats::new(&db, table_id, IO_COST_PER_PAGE).unwrap();

        assert_eq!(stats.total_tuples(), 100);
        let num_pages = db
            .catalog()
            .database_file(table_id)
            .unwrap()
            .num_pages()
            .unwrap();
        assert!(num_pages > 0);
        assert_eq!(
            stats.estimate_scan_cost(),
            (num_pages * IO_COST_PER_PAGE) as f64
        );
        assert_eq!(stats.estimate_table_cardinality(0.5), 50);
        assert_eq!(stats.estimate_table_cardinality(0.0), 0);
        assert_eq!(stats.estimate_table_cardinality(1.0), 100);
    }

    #[test]
    fn test_int_column_selectivity() {
        let (_dir, db, table_id) = setup(100);
        let stats = TableStats::new(&db, table_id, IO_COST_PER_PAGE).unwrap();

        let eq = stats
            .estimate_selectivity(0, PredicateOp::Equals, &Field::Int(50))
            .unwrap();
        assert!((eq - 0.01).abs() < 1e-9);

        let gt = stats
            .estimate_selectivity(0, PredicateOp::GreaterThan, &Field::Int(0))
            .unwrap();
        assert_eq!(gt, 1.0);
    }

    #[test]
    fn test_string_column_selectivity() {
        let (_dir, db, table_id) = setup(10);
        let stats = TableStats::new(&db, table_id, IO_COST_PER_PAGE).unwrap();

        let sel = stats
            .estimate_selectivity(1, PredicateOp::Equals, &Field::Str("row0001".to_string()))
            .unwrap();
        assert!((0.0..=1.0).contains(&sel));
    }

    #[test]
    fn test_constant_type_picks_histogram() {
        let (_dir, db, table_id) = setup(10);
        let stats = TableStats::new(&db, table_id, IO_COST_PER_PAGE).unwrap();

        // the string column has no integer histogram
        assert!(matches!(
            stats.estimate_selectivity(1, PredicateOp::Equals, &Field::Int(1)),
            Err(StatsError::NoHistogram(1))
        ));
    }

    #[test]
    fn test_registry_populates_all_tables() {
        let (_dir, db, _table_id) = setup(10);
        db.stats().compute_statistics(&db).unwrap();
        let stats = db.stats().get("t").unwrap();
        assert_eq!(stats.total_tuples(), 10);
        assert!(db.stats().get("missing").is_none());
    }

    #[test]
    fn test_empty_table() {
        let (_dir, db, table_id) = setup(0);
        let stats = TableStats::new(&db, table_id, IO_COST_PER_PAGE).unwrap();
        assert_eq!(stats.total_tuples(), 0);
        assert_eq!(stats.estimate_scan_cost(), 0.0);
        let sel = stats
            .estimate_selectivity(0, PredicateOp::Equals, &Field::Int(5))
            .unwrap();
        assert_eq!(sel, 0.0);
    }
}
