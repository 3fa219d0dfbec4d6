use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::storage::{DbFile, FieldType, HeapFile, StorageError, TupleDesc};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Unknown column type: {0}")]
    UnknownColumnType(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ColumnMetadata {
    name: Option<String>,
    #[serde(rename = "type")]
    column_type: String, // "INT" or "STRING"
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TableMetadata {
    name: String,
    columns: Vec<ColumnMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogMetadata {
    tables: Vec<TableMetadata>,
}

struct CatalogEntry {
    file: Arc<dyn DbFile>,
    name: String,
}

/// Registry of the tables known to the engine: table id to file and name.
///
/// Interior-mutable so a shared `Database` can register tables from any
/// thread. Lookups return `None` for unknown ids; the storage layer maps
/// that to its own error.
pub struct Catalog {
    tables: Mutex<HashMap<u32, CatalogEntry>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
        }
    }

    /// Register a table under the given name.
    ///
    /// Re-registration wins: an existing table with the same name or the
    /// same underlying file is replaced.
    pub fn add_table(&self, file: Arc<dyn DbFile>, name: &str) {
        let mut tables = self.tables.lock().unwrap();
        tables.retain(|_, entry| entry.name != name);
        tables.insert(
            file.id(),
            CatalogEntry {
                file,
                name: name.to_string(),
            },
        );
    }

    pub fn database_file(&self, table_id: u32) -> Option<Arc<dyn DbFile>> {
        self.tables
            .lock()
            .unwrap()
            .get(&table_id)
            .map(|entry| entry.file.clone())
    }

    pub fn tuple_desc(&self, table_id: u32) -> Option<TupleDesc> {
        self.tables
            .lock()
            .unwrap()
            .get(&table_id)
            .map(|entry| entry.file.tuple_desc().clone())
    }

    pub fn table_name(&self, table_id: u32) -> Option<String> {
        self.tables
            .lock()
            .unwrap()
            .get(&table_id)
            .map(|entry| entry.name.clone())
    }

    pub fn table_id(&self, name: &str) -> Option<u32> {
        self.tables
            .lock()
            .unwrap()
            .iter()
            .find(|(_, entry)| entry.name == name)
            .map(|(id, _)| *id)
    }

    pub fn table_ids(&self) -> Vec<u32> {
        self.tables.lock().unwrap().keys().copied().collect()
    }

    pub fn clear(&self) {
        self.tables.lock().unwrap().clear();
    }

    /// Persist the registered tables to `metadata.json` in `dir`.
    ///
    /// Data files are located by convention: table `name` lives in
    /// `<dir>/<name>.dat`.
    pub fn save(&self, dir: &Path) -> CatalogResult<()> {
        let tables = self.tables.lock().unwrap();
        let mut metadata = CatalogMetadata { tables: Vec::new() };
        for entry in tables.values() {
            let columns = entry
                .file
                .tuple_desc()
                .items()
                .iter()
                .map(|item| ColumnMetadata {
                    name: item.name.clone(),
                    column_type: match item.field_type {
                        FieldType::Int => "INT".to_string(),
                        FieldType::Str => "STRING".to_string(),
                    },
                })
                .collect();
            metadata.tables.push(TableMetadata {
                name: entry.name.clone(),
                columns,
            });
        }
        metadata.tables.sort_by(|a, b| a.name.cmp(&b.name));

        let content = serde_json::to_string_pretty(&metadata)?;
        fs::write(dir.join("metadata.json"), content)?;
        Ok(())
    }

    /// Re-register every table recorded in `<dir>/metadata.json`
    pub fn load(&self, dir: &Path) -> CatalogResult<()> {
        let content = fs::read_to_string(dir.join("metadata.json"))?;
        let metadata: CatalogMetadata = serde_json::from_str(&content)?;

        for table in metadata.tables {
            let mut types = Vec::with_capacity(table.columns.len());
            let mut names = Vec::with_capacity(table.columns.len());
            for column in table.columns {
                types.push(match column.column_type.as_str() {
                    "INT" => FieldType::Int,
                    "STRING" => FieldType::Str,
                    other => return Err(CatalogError::UnknownColumnType(other.to_string())),
                });
                names.push(column.name);
            }
            let desc = TupleDesc::new(types, names);
            let file = HeapFile::new(dir.join(format!("{}.dat", table.name)), desc)?;
            self.add_table(Arc::new(file), &table.name);
        }
        Ok(())
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_desc() -> TupleDesc {
        TupleDesc::new(
            vec![FieldType::Int, FieldType::Str],
            vec![Some("id".to_string()), Some("name".to_string())],
        )
    }

    #[test]
    fn test_add_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::new();
        let file = Arc::new(HeapFile::new(dir.path().join("users.dat"), test_desc()).unwrap());
        let id = file.id();
        catalog.add_table(file, "users");

        assert_eq!(catalog.table_name(id), Some("users".to_string()));
        assert_eq!(catalog.table_id("users"), Some(id));
        assert_eq!(catalog.tuple_desc(id), Some(test_desc()));
        assert!(catalog.database_file(id).is_some());
        assert!(catalog.database_file(id.wrapping_add(1)).is_none());
    }

    #[test]
    fn test_reregistration_replaces_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::new();
        let old = Arc::new(HeapFile::new(dir.path().join("a.dat"), test_desc()).unwrap());
        let new = Arc::new(HeapFile::new(dir.path().join("b.dat"), test_desc()).unwrap());
        let old_id = old.id();
        let new_id = new.id();

        catalog.add_table(old, "users");
        catalog.add_table(new, "users");

        assert_eq!(catalog.table_id("users"), Some(new_id));
        assert!(catalog.database_file(old_id).is_none());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::new();
        let file = Arc::new(HeapFile::new(dir.path().join("users.dat"), test_desc()).unwrap());
        let id = file.id();
        catalog.add_table(file, "users");
        catalog.save(dir.path()).unwrap();

        let restored = Catalog::new();
        restored.load(dir.path()).unwrap();
        assert_eq!(restored.table_id("users"), Some(id));
        assert_eq!(restored.tuple_desc(id), Some(test_desc()));
        assert_eq!(restored.tuple_desc(id).unwrap().field_name(1), Some("name"));
    }
}
