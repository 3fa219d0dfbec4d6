use std::fmt;

use super::error::{StorageError, StorageResult};
use super::field::Field;
use super::page::PageId;
use super::schema::TupleDesc;

/// Physical address of a stored tuple: a page plus a slot within it.
///
/// Valid only while the tuple occupies that slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: usize,
}

impl RecordId {
    pub fn new(page_id: PageId, slot: usize) -> Self {
        Self { page_id, slot }
    }
}

/// An in-memory row: a schema, one field per position, and the storage
/// address assigned by the layer that owns the row (if any).
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    desc: TupleDesc,
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Tuple {
    pub fn new(desc: TupleDesc, fields: Vec<Field>) -> Self {
        Self {
            desc,
            fields,
            record_id: None,
        }
    }

    pub fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }

    pub fn field(&self, idx: usize) -> Option<&Field> {
        self.fields.get(idx)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn set_field(&mut self, idx: usize, field: Field) {
        if idx < self.fields.len() {
            self.fields[idx] = field;
        }
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, rid: Option<RecordId>) {
        self.record_id = rid;
    }

    /// Serialize all fields in schema order
    pub fn serialize(&self) -> StorageResult<Vec<u8>> {
        let mut result = Vec::with_capacity(self.desc.byte_size());
        for field in &self.fields {
            result.extend_from_slice(&field.serialize()?);
        }
        Ok(result)
    }

    /// Deserialize a tuple of the given schema from its fixed-width form
    pub fn deserialize(desc: TupleDesc, data: &[u8]) -> StorageResult<Self> {
        if data.len() != desc.byte_size() {
            return Err(StorageError::Deserialization(format!(
                "expected {} bytes, got {}",
                desc.byte_size(),
                data.len()
            )));
        }

        let mut fields = Vec::with_capacity(desc.num_fields());
        let mut offset = 0;
        for item in desc.items() {
            let width = item.field_type.byte_size();
            fields.push(Field::deserialize(
                item.field_type,
                &data[offset..offset + width],
            )?);
            offset += width;
        }

        Ok(Self {
            desc,
            fields,
            record_id: None,
        })
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, "\t")?;
            }
            write!(f, "{}", field)?;
        }
        Ok(())
    }
}
