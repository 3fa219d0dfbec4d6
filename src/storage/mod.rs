mod buffer_pool;
mod error;
mod field;
mod heap_file;
mod log;
mod page;
mod schema;
mod tuple;

pub use buffer_pool::{BufferPool, LockManager, LockMode, PageRef};
pub use error::{StorageError, StorageResult};
pub use field::{Field, FieldType};
pub use heap_file::{DbFile, HeapFile, HeapFileIter};
pub use log::LogFile;
pub use page::{HeapPage, PageId};
pub use schema::{TdItem, TupleDesc};
pub use tuple::{RecordId, Tuple};

/// Page size in bytes
pub const PAGE_SIZE: usize = 4096;

/// Maximum payload length of a string field; its on-disk width is
/// `MAX_STR_LEN + 4` (a length prefix precedes the padded bytes)
pub const MAX_STR_LEN: usize = 128;

/// Default number of pages held by the buffer pool
pub const DEFAULT_PAGES: usize = 50;
