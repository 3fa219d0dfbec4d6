use std::fmt;

use super::PAGE_SIZE;
use super::error::{StorageError, StorageResult};
use super::schema::TupleDesc;
use super::tuple::{RecordId, Tuple};
use crate::transaction::TransactionId;

/// Identifies a page within a table file: the owning table plus a dense,
/// zero-based page number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId {
    pub table_id: u32,
    pub page_no: usize,
}

impl PageId {
    pub fn new(table_id: u32, page_no: usize) -> Self {
        Self { table_id, page_no }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table_id, self.page_no)
    }
}

/// A fixed-size slotted page of tuples.
///
/// On disk the page is a packed slot bitmap (one bit per slot, LSB first
/// within each byte) followed by the fixed-width tuple slots, with any
/// trailing bytes zeroed. The page keeps a before-image of its bytes for the
/// log writer, captured at construction and re-captured after commit, and
/// records the transaction that dirtied it until it is cleaned.
pub struct HeapPage {
    pid: PageId,
    desc: TupleDesc,
    header: Vec<u8>,
    tuples: Vec<Option<Tuple>>,
    dirty: Option<TransactionId>,
    before_image: Vec<u8>,
}

impl HeapPage {
    /// Number of tuple slots on a page with the given schema
    pub fn slots_per_page(desc: &TupleDesc) -> usize {
        (PAGE_SIZE * 8) / (desc.byte_size() * 8 + 1)
    }

    /// Size of the slot bitmap in bytes
    pub fn header_size(slots: usize) -> usize {
        slots.div_ceil(8)
    }

    /// A zeroed page image; deserializes to a page with every slot empty
    pub fn empty_page_data() -> Vec<u8> {
        vec![0u8; PAGE_SIZE]
    }

    /// Parse a page from its on-disk image.
    ///
    /// The image becomes the page's before-image.
    pub fn new(pid: PageId, data: &[u8], desc: TupleDesc) -> StorageResult<Self> {
        if data.len() != PAGE_SIZE {
            return Err(StorageError::Deserialization(format!(
                "page image must be {} bytes, got {}",
                PAGE_SIZE,
                data.len()
            )));
        }

        let slots = Self::slots_per_page(&desc);
        let header_size = Self::header_size(slots);
        let header = data[..header_size].to_vec();
        let width = desc.byte_size();

        let mut tuples = Vec::with_capacity(slots);
        for slot in 0..slots {
            let used = header[slot / 8] & (1 << (slot % 8)) != 0;
            if used {
                let start = header_size + slot * width;
                let mut tuple = Tuple::deserialize(desc.clone(), &data[start..start + width])?;
                tuple.set_record_id(Some(RecordId::new(pid, slot)));
                tuples.push(Some(tuple));
            } else {
                tuples.push(None);
            }
        }

        Ok(Self {
            pid,
            desc,
            header,
            tuples,
            dirty: None,
            before_image: data.to_vec(),
        })
    }

    pub fn id(&self) -> PageId {
        self.pid
    }

    pub fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }

    pub fn num_slots(&self) -> usize {
        self.tuples.len()
    }

    pub fn slot_used(&self, slot: usize) -> bool {
        slot < self.num_slots() && self.header[slot / 8] & (1 << (slot % 8)) != 0
    }

    fn set_slot(&mut self, slot: usize, used: bool) {
        if used {
            self.header[slot / 8] |= 1 << (slot % 8);
        } else {
            self.header[slot / 8] &= !(1 << (slot % 8));
        }
    }

    pub fn empty_slot_count(&self) -> usize {
        let used: u32 = self.header.iter().map(|b| b.count_ones()).sum();
        self.num_slots() - used as usize
    }

    /// Serialize to exactly `PAGE_SIZE` bytes; unused slots and trailing
    /// padding are zero-filled
    pub fn serialize(&self) -> StorageResult<Vec<u8>> {
        let mut data = vec![0u8; PAGE_SIZE];
        let header_size = self.header.len();
        data[..header_size].copy_from_slice(&self.header);

        let width = self.desc.byte_size();
        for (slot, tuple) in self.tuples.iter().enumerate() {
            if self.slot_used(slot)
                && let Some(tuple) = tuple
            {
                let start = header_size + slot * width;
                data[start..start + width].copy_from_slice(&tuple.serialize()?);
            }
        }

        Ok(data)
    }

    /// Place the tuple in the lowest-index empty slot and assign its record
    /// id
    pub fn insert_tuple(&mut self, tuple: &mut Tuple) -> StorageResult<()> {
        if *tuple.tuple_desc() != self.desc {
            return Err(StorageError::SchemaMismatch(format!(
                "tuple schema ({}) does not match page schema ({})",
                tuple.tuple_desc(),
                self.desc
            )));
        }

        let slot = (0..self.num_slots())
            .find(|&slot| !self.slot_used(slot))
            .ok_or(StorageError::PageFull(self.pid))?;

        tuple.set_record_id(Some(RecordId::new(self.pid, slot)));
        self.set_slot(slot, true);
        self.tuples[slot] = Some(tuple.clone());
        Ok(())
    }

    /// Clear the slot holding the tuple.
    ///
    /// Only the slot bit is cleared here; serialization zeroes the bytes.
    pub fn delete_tuple(&mut self, tuple: &mut Tuple) -> StorageResult<()> {
        let rid = tuple.record_id().ok_or(StorageError::TupleNotStored)?;
        if rid.page_id != self.pid || rid.slot >= self.num_slots() {
            return Err(StorageError::NotOnPage(self.pid));
        }
        if !self.slot_used(rid.slot) {
            return Err(StorageError::SlotEmpty(self.pid, rid.slot));
        }

        self.set_slot(rid.slot, false);
        self.tuples[rid.slot] = None;
        tuple.set_record_id(None);
        Ok(())
    }

    /// Tuples in used slots, in ascending slot order.
    ///
    /// The sequence reflects the header at the time of the call; callers
    /// hold the appropriate page lock.
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> {
        self.tuples.iter().flatten()
    }

    pub fn mark_dirty(&mut self, tid: Option<TransactionId>) {
        self.dirty = tid;
    }

    pub fn dirty(&self) -> Option<TransactionId> {
        self.dirty
    }

    /// Rebind the before-image to the current contents; called at commit
    pub fn set_before_image(&mut self) -> StorageResult<()> {
        self.before_image = self.serialize()?;
        Ok(())
    }

    pub fn before_image(&self) -> &[u8] {
        &self.before_image
    }
}
