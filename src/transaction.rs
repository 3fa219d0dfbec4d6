use std::sync::atomic::{AtomicU64, Ordering};

use crate::database::Database;
use crate::storage::StorageResult;

static NEXT_TID: AtomicU64 = AtomicU64::new(0);

/// Identity of a transaction; drawn from a process-wide counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(u64);

impl TransactionId {
    pub fn new() -> Self {
        Self(NEXT_TID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Access intent on a page; maps to shared/exclusive locking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permissions {
    ReadOnly,
    ReadWrite,
}

/// A running transaction.
///
/// Completion goes through the buffer pool: commit flushes the pages this
/// transaction wrote, abort discards them, and either way all of its locks
/// are released.
#[derive(Debug)]
pub struct Transaction {
    tid: TransactionId,
}

impl Transaction {
    pub fn new() -> Self {
        Self {
            tid: TransactionId::new(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.tid
    }

    pub fn commit(&self, db: &Database) -> StorageResult<()> {
        db.buffer_pool().transaction_complete(db, self.tid, true)
    }

    pub fn abort(&self, db: &Database) -> StorageResult<()> {
        db.buffer_pool().transaction_complete(db, self.tid, false)
    }
}
