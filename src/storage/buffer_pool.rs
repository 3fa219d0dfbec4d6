use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use lru::LruCache;
use rand::Rng;

use super::error::{StorageError, StorageResult};
use super::page::{HeapPage, PageId};
use super::tuple::Tuple;
use crate::database::Database;
use crate::transaction::{Permissions, TransactionId};

/// Shared handle to a cached page. The page's contents are guarded by the
/// S/X page lock acquired through `get_page`; the `RwLock` is the runtime
/// enforcement of that discipline.
pub type PageRef = Arc<RwLock<HeapPage>>;

/// Lock strength on a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

impl From<Permissions> for LockMode {
    fn from(perm: Permissions) -> Self {
        match perm {
            Permissions::ReadOnly => LockMode::Shared,
            Permissions::ReadWrite => LockMode::Exclusive,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct LockEntry {
    tid: TransactionId,
    mode: LockMode,
}

/// Page-granularity lock table under a single coarse mutex.
///
/// `acquire` never blocks; callers retry. A transaction holding the only
/// shared lock on a page may upgrade it to exclusive in place, which admits
/// the common read-then-write pattern without self-deadlock.
pub struct LockManager {
    table: Mutex<HashMap<PageId, Vec<LockEntry>>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
        }
    }

    /// Try to take the lock; returns false if it conflicts with another
    /// transaction's holdings
    pub fn acquire(&self, tid: TransactionId, pid: PageId, mode: LockMode) -> bool {
        let mut table = self.table.lock().unwrap();
        let locks = table.entry(pid).or_default();

        if let Some(held) = locks.iter_mut().find(|entry| entry.tid == tid) {
            // re-request of an equal or weaker mode is a no-op
            if held.mode == mode || held.mode == LockMode::Exclusive {
                return true;
            }
            // S -> X upgrade, permitted only for the sole holder
            if locks.len() == 1 {
                locks[0].mode = LockMode::Exclusive;
                return true;
            }
            return false;
        }

        if locks.iter().any(|entry| entry.mode == LockMode::Exclusive) {
            return false;
        }
        if mode == LockMode::Shared {
            locks.push(LockEntry { tid, mode });
            return true;
        }
        // exclusive request: any other holder conflicts
        if locks.is_empty() {
            locks.push(LockEntry { tid, mode });
            return true;
        }
        false
    }

    pub fn release(&self, tid: TransactionId, pid: PageId) {
        let mut table = self.table.lock().unwrap();
        if let Some(locks) = table.get_mut(&pid) {
            locks.retain(|entry| entry.tid != tid);
            if locks.is_empty() {
                table.remove(&pid);
            }
        }
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.table
            .lock()
            .unwrap()
            .get(&pid)
            .is_some_and(|locks| locks.iter().any(|entry| entry.tid == tid))
    }

    /// Every page the transaction holds a lock on, with the mode held
    pub fn pages_locked_by(&self, tid: TransactionId) -> Vec<(PageId, LockMode)> {
        self.table
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(pid, locks)| {
                locks
                    .iter()
                    .find(|entry| entry.tid == tid)
                    .map(|entry| (*pid, entry.mode))
            })
            .collect()
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

const RETRY_SLEEP: Duration = Duration::from_millis(2);

/// Bounded page cache with strict two-phase locking at page granularity.
///
/// All page access goes through `get_page`: it takes the lock implied by the
/// requested permissions (retrying with a randomized 1-3 s timeout, the sole
/// deadlock-avoidance mechanism), then serves the page from the cache or
/// loads it through the owning file. Writes stay in the cache until flush;
/// eviction is NO-STEAL, so a page dirtied by an uncommitted transaction
/// never reaches disk early.
pub struct BufferPool {
    capacity: usize,
    cache: Mutex<LruCache<PageId, PageRef>>,
    locks: LockManager,
}

impl BufferPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            // capacity is enforced by hand: the cache's own eviction would
            // drop the least-recently-used page even when it is dirty
            cache: Mutex::new(LruCache::unbounded()),
            locks: LockManager::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fetch a page on behalf of `tid`, locking it according to `perm`.
    ///
    /// Blocks (by bounded retry) until the lock is granted; exceeding the
    /// randomized timeout aborts the transaction. On a cache miss the page
    /// is read through its file, evicting a clean page first if the pool is
    /// full.
    pub fn get_page(
        &self,
        db: &Database,
        tid: TransactionId,
        pid: PageId,
        perm: Permissions,
    ) -> StorageResult<PageRef> {
        let mode = LockMode::from(perm);
        let timeout = Duration::from_millis(rand::thread_rng().gen_range(1000..3000));
        let start = Instant::now();
        while !self.locks.acquire(tid, pid, mode) {
            if start.elapsed() >= timeout {
                tracing::debug!(tid = tid.value(), page = %pid, "lock wait timed out");
                return Err(StorageError::TransactionAborted);
            }
            std::thread::sleep(RETRY_SLEEP);
        }

        {
            let mut cache = self.cache.lock().unwrap();
            if let Some(page) = cache.get(&pid) {
                return Ok(page.clone());
            }
            if cache.len() >= self.capacity {
                Self::evict(&mut cache)?;
            }
        }

        let file = db
            .catalog()
            .database_file(pid.table_id)
            .ok_or(StorageError::UnknownTable(pid.table_id))?;
        let page = Arc::new(RwLock::new(file.read_page(pid)?));

        let mut cache = self.cache.lock().unwrap();
        if let Some(existing) = cache.get(&pid) {
            // another transaction loaded it concurrently; keep one copy
            return Ok(existing.clone());
        }
        if cache.len() >= self.capacity {
            Self::evict(&mut cache)?;
        }
        cache.put(pid, page.clone());
        Ok(page)
    }

    /// Release one lock mid-transaction. Used by the heap-file insert loop
    /// when it skips a full page; anywhere else this undermines two-phase
    /// locking.
    pub fn release_page(&self, tid: TransactionId, pid: PageId) {
        self.locks.release(tid, pid);
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.locks.holds_lock(tid, pid)
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.locks
    }

    /// Insert a tuple into the table, write-locking every page the file
    /// touches. Modified pages are marked dirty and (re-)cached so later
    /// requests see them.
    pub fn insert_tuple(
        &self,
        db: &Database,
        tid: TransactionId,
        table_id: u32,
        tuple: &mut Tuple,
    ) -> StorageResult<()> {
        let file = db
            .catalog()
            .database_file(table_id)
            .ok_or(StorageError::UnknownTable(table_id))?;
        let pages = file.insert_tuple(db, tid, tuple)?;
        self.cache_dirtied(tid, pages)
    }

    /// Delete a tuple from its table; the owning page is write-locked,
    /// marked dirty, and re-cached
    pub fn delete_tuple(
        &self,
        db: &Database,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> StorageResult<()> {
        let table_id = tuple
            .record_id()
            .ok_or(StorageError::TupleNotStored)?
            .page_id
            .table_id;
        let file = db
            .catalog()
            .database_file(table_id)
            .ok_or(StorageError::UnknownTable(table_id))?;
        let pages = file.delete_tuple(db, tid, tuple)?;
        self.cache_dirtied(tid, pages)
    }

    fn cache_dirtied(&self, tid: TransactionId, pages: Vec<PageRef>) -> StorageResult<()> {
        for page_ref in pages {
            let pid = {
                let mut page = page_ref.write().unwrap();
                page.mark_dirty(Some(tid));
                page.id()
            };
            let mut cache = self.cache.lock().unwrap();
            if cache.len() >= self.capacity && !cache.contains(&pid) {
                Self::evict(&mut cache)?;
            }
            cache.put(pid, page_ref);
        }
        Ok(())
    }

    /// Commit or abort: flush (and rebind the before-image of) every page
    /// this transaction write-locked, or discard them unwritten; then
    /// release all of its locks
    pub fn transaction_complete(
        &self,
        db: &Database,
        tid: TransactionId,
        commit: bool,
    ) -> StorageResult<()> {
        let held = self.locks.pages_locked_by(tid);
        for (pid, mode) in &held {
            if *mode == LockMode::Shared {
                continue;
            }
            let cached = self.cache.lock().unwrap().peek(pid).cloned();
            if let Some(page_ref) = cached {
                if commit {
                    self.flush_page(db, *pid)?;
                    page_ref.write().unwrap().set_before_image()?;
                } else {
                    self.discard_page(*pid);
                }
            }
        }
        for (pid, _) in held {
            self.locks.release(tid, pid);
        }
        tracing::debug!(
            tid = tid.value(),
            commit,
            "transaction complete, locks released"
        );
        Ok(())
    }

    /// Flush every dirty page to disk
    pub fn flush_all_pages(&self, db: &Database) -> StorageResult<()> {
        for pid in self.dirty_page_ids(None) {
            self.flush_page(db, pid)?;
        }
        Ok(())
    }

    /// Flush the pages dirtied by one transaction
    pub fn flush_pages(&self, db: &Database, tid: TransactionId) -> StorageResult<()> {
        for pid in self.dirty_page_ids(Some(tid)) {
            self.flush_page(db, pid)?;
        }
        Ok(())
    }

    fn dirty_page_ids(&self, tid: Option<TransactionId>) -> Vec<PageId> {
        let cache = self.cache.lock().unwrap();
        cache
            .iter()
            .filter(|(_, page)| {
                let dirty = page.read().unwrap().dirty();
                match tid {
                    Some(tid) => dirty == Some(tid),
                    None => dirty.is_some(),
                }
            })
            .map(|(pid, _)| *pid)
            .collect()
    }

    /// Write one page through to its file, observing the WAL protocol: the
    /// update record is logged and forced before the page bytes are
    /// written. Clears the dirty flag but leaves the before-image alone;
    /// that is rebound at commit, not at flush.
    fn flush_page(&self, db: &Database, pid: PageId) -> StorageResult<()> {
        let page_ref = self
            .cache
            .lock()
            .unwrap()
            .peek(&pid)
            .cloned()
            .ok_or(StorageError::PageNotCached(pid))?;

        let (dirty, before, after) = {
            let page = page_ref.read().unwrap();
            (page.dirty(), page.before_image().to_vec(), page.serialize()?)
        };
        let Some(tid) = dirty else {
            return Ok(());
        };

        db.log().write_update(tid, &before, &after)?;
        db.log().force()?;

        let file = db
            .catalog()
            .database_file(pid.table_id)
            .ok_or(StorageError::UnknownTable(pid.table_id))?;
        file.write_page(&page_ref.read().unwrap())?;
        page_ref.write().unwrap().mark_dirty(None);
        tracing::debug!(page = %pid, tid = tid.value(), "flushed page");
        Ok(())
    }

    /// Drop a page from the cache without writing it
    pub fn discard_page(&self, pid: PageId) {
        self.cache.lock().unwrap().pop(&pid);
    }

    /// NO-STEAL eviction: discard the least-recently-used clean page.
    /// Dirty pages belong to uncommitted transactions and must not reach
    /// disk, so when everything is dirty the pool is simply full.
    fn evict(cache: &mut LruCache<PageId, PageRef>) -> StorageResult<()> {
        let mut victim = None;
        for (pid, page) in cache.iter() {
            if page.read().unwrap().dirty().is_none() {
                // iteration runs most- to least-recently used; keep the last
                victim = Some(*pid);
            }
        }
        match victim {
            Some(pid) => {
                cache.pop(&pid);
                tracing::trace!(page = %pid, "evicted clean page");
                Ok(())
            }
            None => Err(StorageError::BufferFull),
        }
    }

    #[cfg(test)]
    pub(crate) fn cached_page_count(&self) -> usize {
        self.cache.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::database::Database;
    use crate::storage::{DbFile, Field, FieldType, HeapFile, TupleDesc};
    use tempfile::TempDir;

    fn int_pair_desc() -> TupleDesc {
        TupleDesc::from_types(vec![FieldType::Int, FieldType::Int])
    }

    fn int_pair(a: i32, b: i32) -> Tuple {
        Tuple::new(int_pair_desc(), vec![Field::Int(a), Field::Int(b)])
    }

    fn setup_with_pool(pool_size: usize) -> (TempDir, Database, u32) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::with_pool_size(dir.path().join("log"), pool_size).unwrap();
        let file =
            Arc::new(HeapFile::new(dir.path().join("table.dat"), int_pair_desc()).unwrap());
        let table_id = file.id();
        db.catalog().add_table(file, "table");
        (dir, db, table_id)
    }

    fn setup() -> (TempDir, Database, u32) {
        setup_with_pool(crate::storage::DEFAULT_PAGES)
    }

    /// Populate `pages` pages by raw file writes, bypassing the pool
    fn fill_pages(db: &Database, table_id: u32, pages: usize) {
        let file = db.catalog().database_file(table_id).unwrap();
        for page_no in 0..pages {
            let page = HeapPage::new(
                PageId::new(table_id, page_no),
                &HeapPage::empty_page_data(),
                int_pair_desc(),
            )
            .unwrap();
            file.write_page(&page).unwrap();
        }
    }

    #[test]
    fn test_lock_compatibility_matrix() {
        let locks = LockManager::new();
        let pid = PageId::new(1, 0);
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();

        // no locks: S and X both granted
        assert!(locks.acquire(t1, pid, LockMode::Shared));
        // re-request is a no-op
        assert!(locks.acquire(t1, pid, LockMode::Shared));
        // second reader joins
        assert!(locks.acquire(t2, pid, LockMode::Shared));
        // upgrade denied while another reader holds S
        assert!(!locks.acquire(t1, pid, LockMode::Exclusive));

        locks.release(t2, pid);
        // sole holder upgrades in place
        assert!(locks.acquire(t1, pid, LockMode::Exclusive));
        // X covers a later S request by the same transaction
        assert!(locks.acquire(t1, pid, LockMode::Shared));
        // other transactions blocked entirely
        assert!(!locks.acquire(t2, pid, LockMode::Shared));
        assert!(!locks.acquire(t2, pid, LockMode::Exclusive));

        locks.release(t1, pid);
        assert!(!locks.holds_lock(t1, pid));
        assert!(locks.acquire(t2, pid, LockMode::Exclusive));
    }

    #[test]
    fn test_pages_locked_by() {
        let locks = LockManager::new();
        let t1 = TransactionId::new();
        let p0 = PageId::new(1, 0);
        let p1 = PageId::new(1, 1);

        locks.acquire(t1, p0, LockMode::Shared);
        locks.acquire(t1, p1, LockMode::Exclusive);

        let mut held = locks.pages_locked_by(t1);
        held.sort_by_key(|(pid, _)| pid.page_no);
        assert_eq!(held.len(), 2);
        assert_eq!(held[0], (p0, LockMode::Shared));
        assert_eq!(held[1], (p1, LockMode::Exclusive));
    }

    #[test]
    fn test_get_page_caches() {
        let (_dir, db, table_id) = setup();
        fill_pages(&db, table_id, 1);

        let tid = TransactionId::new();
        let pid = PageId::new(table_id, 0);
        let first = db
            .buffer_pool()
            .get_page(&db, tid, pid, Permissions::ReadOnly)
            .unwrap();
        let second = db
            .buffer_pool()
            .get_page(&db, tid, pid, Permissions::ReadOnly)
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(db.buffer_pool().cached_page_count(), 1);
    }

    #[test]
    fn test_shared_then_exclusive_upgrade() {
        let (_dir, db, table_id) = setup();
        fill_pages(&db, table_id, 1);

        let tid = TransactionId::new();
        let pid = PageId::new(table_id, 0);
        db.buffer_pool()
            .get_page(&db, tid, pid, Permissions::ReadOnly)
            .unwrap();
        // sole S holder: write request upgrades rather than deadlocking
        db.buffer_pool()
            .get_page(&db, tid, pid, Permissions::ReadWrite)
            .unwrap();
        assert!(db.buffer_pool().holds_lock(tid, pid));
    }

    #[test]
    fn test_conflicting_upgrade_aborts() {
        let (_dir, db, table_id) = setup();
        fill_pages(&db, table_id, 1);

        let t1 = TransactionId::new();
        let t2 = TransactionId::new();
        let pid = PageId::new(table_id, 0);
        db.buffer_pool()
            .get_page(&db, t1, pid, Permissions::ReadOnly)
            .unwrap();
        db.buffer_pool()
            .get_page(&db, t2, pid, Permissions::ReadOnly)
            .unwrap();

        // both hold S; t1's upgrade can never be granted and times out
        let result = db
            .buffer_pool()
            .get_page(&db, t1, pid, Permissions::ReadWrite);
        assert!(matches!(result, Err(StorageError::TransactionAborted)));
    }

    #[test]
    fn test_insert_marks_dirty() {
        let (_dir, db, table_id) = setup();
        let tid = TransactionId::new();

        let mut tuple = int_pair(1, 2);
        db.buffer_pool()
            .insert_tuple(&db, tid, table_id, &mut tuple)
            .unwrap();

        let pid = tuple.record_id().unwrap().page_id;
        let page_ref = db
            .buffer_pool()
            .get_page(&db, tid, pid, Permissions::ReadOnly)
            .unwrap();
        assert_eq!(page_ref.read().unwrap().dirty(), Some(tid));
    }

    #[test]
    fn test_commit_flushes_and_cleans() {
        let (_dir, db, table_id) = setup();
        let tid = TransactionId::new();

        let mut tuple = int_pair(7, 8);
        db.buffer_pool()
            .insert_tuple(&db, tid, table_id, &mut tuple)
            .unwrap();
        let pid = tuple.record_id().unwrap().page_id;

        let log_before = db.log().size().unwrap();
        db.buffer_pool()
            .transaction_complete(&db, tid, true)
            .unwrap();

        // WAL record written, dirty flag cleared, locks released
        assert!(db.log().size().unwrap() > log_before);
        let page_ref = db
            .buffer_pool()
            .get_page(&db, TransactionId::new(), pid, Permissions::ReadOnly)
            .unwrap();
        assert_eq!(page_ref.read().unwrap().dirty(), None);
        assert!(!db.buffer_pool().holds_lock(tid, pid));

        // the write survived: re-read from disk
        let file = db.catalog().database_file(table_id).unwrap();
        let page = file.read_page(pid).unwrap();
        assert_eq!(page.iter().count(), 1);
    }

    #[test]
    fn test_abort_discards_without_writing() {
        let (_dir, db, table_id) = setup();
        fill_pages(&db, table_id, 1);
        let tid = TransactionId::new();

        let mut tuple = int_pair(9, 9);
        db.buffer_pool()
            .insert_tuple(&db, tid, table_id, &mut tuple)
            .unwrap();
        let pid = tuple.record_id().unwrap().page_id;

        let log_before = db.log().size().unwrap();
        db.buffer_pool()
            .transaction_complete(&db, tid, false)
            .unwrap();

        // nothing logged, nothing written, no dirty page left behind
        assert_eq!(db.log().size().unwrap(), log_before);
        let file = db.catalog().database_file(table_id).unwrap();
        assert_eq!(file.read_page(pid).unwrap().iter().count(), 0);

        let page_ref = db
            .buffer_pool()
            .get_page(&db, TransactionId::new(), pid, Permissions::ReadOnly)
            .unwrap();
        assert_eq!(page_ref.read().unwrap().dirty(), None);
        assert_eq!(page_ref.read().unwrap().iter().count(), 0);
    }

    #[test]
    fn test_eviction_skips_dirty_pages() {
        let (_dir, db, table_id) = setup_with_pool(2);
        fill_pages(&db, table_id, 3);
        let tid = TransactionId::new();

        // dirty pages 0 and 1 by deleting a tuple placed on each
        for page_no in 0..2 {
            let pid = PageId::new(table_id, page_no);
            let page_ref = db
                .buffer_pool()
                .get_page(&db, tid, pid, Permissions::ReadWrite)
                .unwrap();
            let mut tuple = int_pair(page_no as i32, 0);
            page_ref.write().unwrap().insert_tuple(&mut tuple).unwrap();
            page_ref.write().unwrap().mark_dirty(Some(tid));
        }

        // the pool is full of dirty pages; a third page cannot be admitted
        let result = db.buffer_pool().get_page(
            &db,
            tid,
            PageId::new(table_id, 2),
            Permissions::ReadOnly,
        );
        assert!(matches!(result, Err(StorageError::BufferFull)));

        // after commit both pages are clean and eviction succeeds
        db.buffer_pool()
            .transaction_complete(&db, tid, true)
            .unwrap();
        db.buffer_pool()
            .get_page(
                &db,
                TransactionId::new(),
                PageId::new(table_id, 2),
                Permissions::ReadOnly,
            )
            .unwrap();
        assert_eq!(db.buffer_pool().cached_page_count(), 2);
    }

    #[test]
    fn test_flush_pages_restricted_to_transaction() {
        let (_dir, db, table_id) = setup();
        fill_pages(&db, table_id, 2);
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();

        for (tid, page_no) in [(t1, 0), (t2, 1)] {
            let pid = PageId::new(table_id, page_no);
            let page_ref = db
                .buffer_pool()
                .get_page(&db, tid, pid, Permissions::ReadWrite)
                .unwrap();
            let mut tuple = int_pair(page_no as i32, 0);
            page_ref.write().unwrap().insert_tuple(&mut tuple).unwrap();
            page_ref.write().unwrap().mark_dirty(Some(tid));
        }

        db.buffer_pool().flush_pages(&db, t1).unwrap();

        let dirty: Vec<_> = db.buffer_pool().dirty_page_ids(None);
        assert_eq!(dirty, vec![PageId::new(table_id, 1)]);
    }

    #[test]
    fn test_discard_page() {
        let (_dir, db, table_id) = setup();
        fill_pages(&db, table_id, 1);
        let pid = PageId::new(table_id, 0);
        db.buffer_pool()
            .get_page(&db, TransactionId::new(), pid, Permissions::ReadOnly)
            .unwrap();
        assert_eq!(db.buffer_pool().cached_page_count(), 1);
        db.buffer_pool().discard_page(pid);
        assert_eq!(db.buffer_pool().cached_page_count(), 0);
    }
}
