//! The fixed 32-byte trailer that locates a bplist's object table.

use bytes::{Buf, BufMut, BytesMut};

use super::marker;
use crate::error::ObjectError;

/// Trailer length in bytes.
pub const TRAILER_LEN: usize = 32;

const PADDING: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    /// Width of each offset-table entry.
    pub offset_size: u8,
    /// Width of each object reference inside arrays and dictionaries.
    pub item_size: u8,
    pub object_count: u64,
    pub root_object: u64,
    /// Byte position of the offset table from the start of the document.
    pub offset_table_index: u64,
}

impl Trailer {
    /// Parses and validates the trailer at the end of `data`.
    pub fn parse(data: &[u8]) -> Result<Self, ObjectError> {
        if data.len() < marker::MAGIC.len() + TRAILER_LEN {
            return Err(ObjectError::malformed("document too short for a bplist trailer"));
        }
        let mut buf = &data[data.len() - TRAILER_LEN..];
        buf.advance(PADDING);
        let trailer = Self {
            offset_size: buf.get_u8(),
            item_size: buf.get_u8(),
            object_count: buf.get_u64(),
            root_object: buf.get_u64(),
            offset_table_index: buf.get_u64(),
        };
        tracing::debug!(
            offset_size = trailer.offset_size,
            item_size = trailer.item_size,
            object_count = trailer.object_count,
            root = trailer.root_object,
            offset_table = trailer.offset_table_index,
            "bplist trailer"
        );
        trailer.validate(data.len())?;
        Ok(trailer)
    }

    fn validate(&self, len: usize) -> Result<(), ObjectError> {
        if !marker::is_valid_width(self.offset_size) {
            return Err(ObjectError::Malformed(format!(
                "invalid offset size {}",
                self.offset_size
            )));
        }
        if !marker::is_valid_width(self.item_size) {
            return Err(ObjectError::Malformed(format!(
                "invalid object reference size {}",
                self.item_size
            )));
        }
        // Every object takes at least one byte.
        if self.object_count == 0 || self.object_count > len as u64 {
            return Err(ObjectError::Malformed(format!(
                "invalid object count {}",
                self.object_count
            )));
        }
        if self.root_object >= self.object_count {
            return Err(ObjectError::Malformed(format!(
                "root object {} outside {} objects",
                self.root_object, self.object_count
            )));
        }
        let table_end = self
            .object_count
            .checked_mul(u64::from(self.offset_size))
            .and_then(|size| size.checked_add(self.offset_table_index));
        let body_end = (len - TRAILER_LEN) as u64;
        if self.offset_table_index < marker::MAGIC.len() as u64
            || table_end.is_none_or(|end| end > body_end)
        {
            return Err(ObjectError::Malformed(format!(
                "offset table at {} does not fit before the trailer",
                self.offset_table_index
            )));
        }
        Ok(())
    }

    pub fn write(&self, buf: &mut BytesMut) {
        buf.put_bytes(0, PADDING);
        buf.put_u8(self.offset_size);
        buf.put_u8(self.item_size);
        buf.put_u64(self.object_count);
        buf.put_u64(self.root_object);
        buf.put_u64(self.offset_table_index);
    }
}
