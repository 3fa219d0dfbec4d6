use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::PAGE_SIZE;
use super::buffer_pool::PageRef;
use super::error::{StorageError, StorageResult};
use super::page::{HeapPage, PageId};
use super::schema::TupleDesc;
use super::tuple::Tuple;
use crate::database::Database;
use crate::transaction::{Permissions, TransactionId};

/// Storage interface of a table file, as consumed by the catalog and the
/// buffer pool
pub trait DbFile: Send + Sync {
    fn id(&self) -> u32;
    fn tuple_desc(&self) -> &TupleDesc;
    fn read_page(&self, pid: PageId) -> StorageResult<HeapPage>;
    fn write_page(&self, page: &HeapPage) -> StorageResult<()>;
    fn num_pages(&self) -> StorageResult<usize>;
    fn insert_tuple(
        &self,
        db: &Database,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> StorageResult<Vec<PageRef>>;
    fn delete_tuple(
        &self,
        db: &Database,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> StorageResult<Vec<PageRef>>;
    fn iter<'a>(&self, db: &'a Database, tid: TransactionId) -> HeapFileIter<'a>;
}

/// An unordered collection of tuples stored as contiguous fixed-size pages
/// in a single file.
///
/// The file is opened per page I/O; no handle is held between operations.
/// All page access during insert, delete, and iteration is mediated by the
/// buffer pool, which enforces the page-level locks.
pub struct HeapFile {
    path: PathBuf,
    desc: TupleDesc,
    table_id: u32,
}

/// Stable FNV-1a hash of the absolute path, folded to 32 bits; identifies
/// the table across process restarts
fn stable_table_id(path: &Path) -> u32 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in path.as_os_str().as_encoded_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    (hash ^ (hash >> 32)) as u32
}

impl HeapFile {
    /// Open (creating if absent) the heap file at `path`
    pub fn new<P: AsRef<Path>>(path: P, desc: TupleDesc) -> StorageResult<Self> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())?;
        let path = path.as_ref().canonicalize()?;
        let table_id = stable_table_id(&path);
        Ok(Self {
            path,
            desc,
            table_id,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one zeroed page to the end of the file
    fn append_empty_page(&self) -> StorageResult<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(&HeapPage::empty_page_data())?;
        Ok(())
    }
}

impl DbFile for HeapFile {
    fn id(&self) -> u32 {
        self.table_id
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }

    fn read_page(&self, pid: PageId) -> StorageResult<HeapPage> {
        let mut file = OpenOptions::new().read(true).open(&self.path)?;
        let offset = (pid.page_no * PAGE_SIZE) as u64;
        if offset >= file.metadata()?.len() {
            return Err(StorageError::InvalidPage(pid));
        }
        file.seek(SeekFrom::Start(offset))?;
        let mut data = vec![0u8; PAGE_SIZE];
        file.read_exact(&mut data)?;
        HeapPage::new(pid, &data, self.desc.clone())
    }

    fn write_page(&self, page: &HeapPage) -> StorageResult<()> {
        let pid = page.id();
        if pid.page_no > self.num_pages()? {
            return Err(StorageError::InvalidPage(pid));
        }
        let mut file = OpenOptions::new().write(true).open(&self.path)?;
        file.seek(SeekFrom::Start((pid.page_no * PAGE_SIZE) as u64))?;
        file.write_all(&page.serialize()?)?;
        Ok(())
    }

    fn num_pages(&self) -> StorageResult<usize> {
        let len = std::fs::metadata(&self.path)?.len();
        Ok(len as usize / PAGE_SIZE)
    }

    /// Insert into the first page with an empty slot, write-locking pages
    /// through the buffer pool as they are probed.
    ///
    /// The write lock on a full page is released before moving on; holding
    /// it would serialize every insert into a hot table for no benefit.
    /// When every page is full, the file grows by one zeroed page and the
    /// insert lands there.
    fn insert_tuple(
        &self,
        db: &Database,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> StorageResult<Vec<PageRef>> {
        for page_no in 0..self.num_pages()? {
            let pid = PageId::new(self.table_id, page_no);
            let page_ref = db
                .buffer_pool()
                .get_page(db, tid, pid, Permissions::ReadWrite)?;
            let mut page = page_ref.write().unwrap();
            if page.empty_slot_count() > 0 {
                page.insert_tuple(tuple)?;
                drop(page);
                return Ok(vec![page_ref]);
            }
            drop(page);
            db.buffer_pool().release_page(tid, pid);
        }

        self.append_empty_page()?;
        let pid = PageId::new(self.table_id, self.num_pages()? - 1);
        let page_ref = db
            .buffer_pool()
            .get_page(db, tid, pid, Permissions::ReadWrite)?;
        page_ref.write().unwrap().insert_tuple(tuple)?;
        Ok(vec![page_ref])
    }

    fn delete_tuple(
        &self,
        db: &Database,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> StorageResult<Vec<PageRef>> {
        let rid = tuple.record_id().ok_or(StorageError::TupleNotStored)?;
        let page_ref = db
            .buffer_pool()
            .get_page(db, tid, rid.page_id, Permissions::ReadWrite)?;
        page_ref.write().unwrap().delete_tuple(tuple)?;
        Ok(vec![page_ref])
    }

    fn iter<'a>(&self, db: &'a Database, tid: TransactionId) -> HeapFileIter<'a> {
        HeapFileIter {
            db,
            tid,
            table_id: self.table_id,
            page_no: 0,
            current: Vec::new().into_iter(),
            opened: false,
        }
    }
}

/// Tuple iterator over a whole heap file in (page, slot) order.
///
/// Pages are fetched lazily through the buffer pool with read intent; the
/// iterator holds no locks of its own. `rewind` is `close` followed by
/// `open`; no positioning survives it.
pub struct HeapFileIter<'a> {
    db: &'a Database,
    tid: TransactionId,
    table_id: u32,
    page_no: usize,
    current: std::vec::IntoIter<Tuple>,
    opened: bool,
}

impl HeapFileIter<'_> {
    fn num_pages(&self) -> StorageResult<usize> {
        self.db
            .catalog()
            .database_file(self.table_id)
            .ok_or(StorageError::UnknownTable(self.table_id))?
            .num_pages()
    }

    /// Snapshot the used tuples of one page under its read lock
    fn load_page(&self, page_no: usize) -> StorageResult<std::vec::IntoIter<Tuple>> {
        let pid = PageId::new(self.table_id, page_no);
        let page_ref = self
            .db
            .buffer_pool()
            .get_page(self.db, self.tid, pid, Permissions::ReadOnly)?;
        let page = page_ref.read().unwrap();
        Ok(page.iter().cloned().collect::<Vec<_>>().into_iter())
    }

    pub fn open(&mut self) -> StorageResult<()> {
        self.opened = true;
        self.page_no = 0;
        self.current = if self.num_pages()? == 0 {
            Vec::new().into_iter()
        } else {
            self.load_page(0)?
        };
        Ok(())
    }

    pub fn has_next(&mut self) -> StorageResult<bool> {
        if !self.opened {
            return Ok(false);
        }
        while self.current.as_slice().is_empty() {
            if self.page_no + 1 >= self.num_pages()? {
                return Ok(false);
            }
            self.page_no += 1;
            self.current = self.load_page(self.page_no)?;
        }
        Ok(true)
    }

    pub fn next(&mut self) -> StorageResult<Option<Tuple>> {
        if !self.has_next()? {
            return Ok(None);
        }
        Ok(self.current.next())
    }

    pub fn rewind(&mut self) -> StorageResult<()> {
        self.close();
        self.open()
    }

    pub fn close(&mut self) {
        self.opened = false;
        self.current = Vec::new().into_iter();
    }
}
