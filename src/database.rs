use std::path::Path;

use crate::catalog::Catalog;
use crate::optimizer::StatsRegistry;
use crate::storage::{BufferPool, DEFAULT_PAGES, LogFile, StorageResult};

/// The engine's shared context: catalog, buffer pool, log writer, and table
/// statistics, threaded explicitly through constructors and operator calls.
///
/// One transaction runs per thread; the buffer pool and its lock manager
/// are the only shared mutable state, so a `&Database` can be handed to any
/// number of threads.
pub struct Database {
    catalog: Catalog,
    buffer_pool: BufferPool,
    log: LogFile,
    stats: StatsRegistry,
}

impl Database {
    /// Context with the default buffer pool size
    pub fn new<P: AsRef<Path>>(log_path: P) -> StorageResult<Self> {
        Self::with_pool_size(log_path, DEFAULT_PAGES)
    }

    pub fn with_pool_size<P: AsRef<Path>>(log_path: P, pool_size: usize) -> StorageResult<Self> {
        Ok(Self {
            catalog: Catalog::new(),
            buffer_pool: BufferPool::new(pool_size),
            log: LogFile::new(log_path)?,
            stats: StatsRegistry::new(),
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &BufferPool {
        &self.buffer_pool
    }

    pub fn log(&self) -> &LogFile {
        &self.log
    }

    pub fn stats(&self) -> &StatsRegistry {
        &self.stats
    }
}
