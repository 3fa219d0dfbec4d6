use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::error::StorageResult;
use crate::transaction::TransactionId;

const UPDATE_RECORD: u8 = 1;

/// Append-only write-ahead log.
///
/// Only the hooks the buffer pool needs are implemented: before any dirty
/// page reaches disk, an update record carrying the page's before- and
/// after-images is appended and forced. Replay and undo belong to the
/// recovery manager.
pub struct LogFile {
    file: Mutex<File>,
    path: PathBuf,
}

impl LogFile {
    pub fn new<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            file: Mutex::new(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an update record: the dirtying transaction plus the page's
    /// before- and after-images
    pub fn write_update(
        &self,
        tid: TransactionId,
        before: &[u8],
        after: &[u8],
    ) -> StorageResult<()> {
        let mut file = self.file.lock().unwrap();
        file.write_all(&[UPDATE_RECORD])?;
        file.write_all(&tid.value().to_le_bytes())?;
        file.write_all(&(before.len() as u32).to_le_bytes())?;
        file.write_all(before)?;
        file.write_all(&(after.len() as u32).to_le_bytes())?;
        file.write_all(after)?;
        tracing::trace!(tid = tid.value(), "logged update record");
        Ok(())
    }

    /// Force buffered records to stable storage
    pub fn force(&self) -> StorageResult<()> {
        self.file.lock().unwrap().sync_data()?;
        Ok(())
    }

    /// Current log length in bytes
    pub fn size(&self) -> StorageResult<u64> {
        Ok(self.file.lock().unwrap().metadata()?.len())
    }
}
