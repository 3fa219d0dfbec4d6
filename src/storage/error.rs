use std::io;
use thiserror::Error;

use super::page::PageId;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Page {0} is out of range")]
    InvalidPage(PageId),

    #[error("No empty slot on page {0}")]
    PageFull(PageId),

    #[error("Slot {1} on page {0} is already empty")]
    SlotEmpty(PageId, usize),

    #[error("Tuple does not belong to page {0}")]
    NotOnPage(PageId),

    #[error("Tuple has no record id")]
    TupleNotStored,

    #[error("Transaction aborted: lock acquisition timed out")]
    TransactionAborted,

    #[error("Buffer pool full: every cached page is dirty")]
    BufferFull,

    #[error("Page {0} is not cached")]
    PageNotCached(PageId),

    #[error("Unknown table id {0}")]
    UnknownTable(u32),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

pub type StorageResult<T> = Result<T, StorageError>;
