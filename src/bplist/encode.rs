//! Bplist encoding.
//!
//! A pre-pass assigns every distinct value a slot in the object table,
//! root first, then depth first with dictionary keys before values. The
//! records are then written in slot order, followed by the offset table
//! and the trailer.

use std::collections::HashMap;

use bytes::{BufMut, BytesMut};

use super::marker;
use super::trailer::Trailer;
use crate::error::ObjectError;
use crate::format::{Context, EncodeContext, FormatId};
use crate::types::{Kind, Number, Value};

/// Appends a complete bplist document to `buf`.
pub fn encode_document(
    buf: &mut BytesMut,
    value: &Value,
    cx: Context<'_>,
) -> Result<usize, ObjectError> {
    let mut table = ObjectTable::default();
    table.collect(value, cx.config.depth_limit())?;

    let count = table.slots.len() as u64;
    let item_size = marker::width_for(count.saturating_sub(1));

    let start = buf.len();
    buf.put_slice(marker::MAGIC);
    let mut offsets = Vec::with_capacity(table.slots.len());
    for (slot, refs) in table.slots.iter().zip(&table.refs) {
        offsets.push((buf.len() - start) as u64);
        match slot {
            Slot::Key(key) => write_string(buf, key),
            Slot::Value(value) => write_record(buf, value, refs, item_size, cx)?,
        }
    }

    let offset_table_index = (buf.len() - start) as u64;
    let offset_size = marker::width_for(offset_table_index);
    for offset in offsets {
        buf.put_uint(offset, usize::from(offset_size));
    }
    Trailer {
        offset_size,
        item_size,
        object_count: count,
        root_object: 0,
        offset_table_index,
    }
    .write(buf);

    tracing::debug!(
        objects = count,
        item_size,
        offset_size,
        "encoded bplist document"
    );
    Ok(buf.len() - start)
}

enum Slot {
    Value(Value),
    /// A dictionary key with no string value of the same content before it.
    Key(String),
}

/// Slot assignment for the pre-pass.
#[derive(Default)]
struct ObjectTable {
    slots: Vec<Slot>,
    /// Child slot numbers per slot: items for arrays, keys then values for
    /// dictionaries.
    refs: Vec<Vec<u64>>,
    strings: HashMap<String, u64>,
    objects: HashMap<usize, u64>,
}

impl ObjectTable {
    fn collect(&mut self, root: &Value, max_depth: usize) -> Result<(), ObjectError> {
        let (slot, _) = self.add(root);
        self.walk(slot, root, 1, max_depth)
    }

    fn push(&mut self, slot: Slot) -> u64 {
        self.slots.push(slot);
        self.refs.push(Vec::new());
        (self.slots.len() - 1) as u64
    }

    /// Returns the value's slot and whether it was newly assigned.
    fn add(&mut self, value: &Value) -> (u64, bool) {
        if let Some(s) = value.as_string() {
            if let Some(&slot) = self.strings.get(&s) {
                return (slot, false);
            }
            let slot = self.push(Slot::Value(value.clone()));
            self.strings.insert(s, slot);
            return (slot, true);
        }
        // Slots hold a handle, so addresses stay unique for the table's life.
        if let Some(&slot) = self.objects.get(&value.addr()) {
            return (slot, false);
        }
        let slot = self.push(Slot::Value(value.clone()));
        self.objects.insert(value.addr(), slot);
        (slot, true)
    }

    fn add_key(&mut self, key: &str) -> u64 {
        if let Some(&slot) = self.strings.get(key) {
            return slot;
        }
        let slot = self.push(Slot::Key(key.to_owned()));
        self.strings.insert(key.to_owned(), slot);
        slot
    }

    fn add_child(&mut self, child: &Value, depth: usize, max_depth: usize) -> Result<u64, ObjectError> {
        let (slot, new) = self.add(child);
        if new {
            self.walk(slot, child, depth + 1, max_depth)?;
        }
        Ok(slot)
    }

    fn walk(&mut self, slot: u64, value: &Value, depth: usize, max_depth: usize) -> Result<(), ObjectError> {
        let refs = match value.kind() {
            Kind::Array => {
                check_depth(depth, max_depth)?;
                let items = value.items().unwrap_or_default();
                let mut refs = Vec::with_capacity(items.len());
                for item in &items {
                    refs.push(self.add_child(item, depth, max_depth)?);
                }
                refs
            }
            Kind::Dictionary => {
                check_depth(depth, max_depth)?;
                let entries = value.entries().unwrap_or_default();
                let mut refs: Vec<u64> = entries.iter().map(|(k, _)| self.add_key(k)).collect();
                for (_, item) in &entries {
                    refs.push(self.add_child(item, depth, max_depth)?);
                }
                refs
            }
            _ => return Ok(()),
        };
        self.refs[slot as usize] = refs;
        Ok(())
    }
}

fn check_depth(depth: usize, max_depth: usize) -> Result<(), ObjectError> {
    if depth > max_depth {
        return Err(ObjectError::ResourceExhausted(format!(
            "nesting deeper than {max_depth}"
        )));
    }
    Ok(())
}

/// Writes a marker with an inline length, or `0xF` and an integer record.
pub fn put_header(buf: &mut BytesMut, kind: u8, len: u64) {
    let kind = kind & 0xF0;
    if len < u64::from(marker::LENGTH_FOLLOWS) {
        buf.put_u8(kind | len as u8);
    } else {
        buf.put_u8(kind | marker::LENGTH_FOLLOWS);
        write_uint(buf, len);
    }
}

/// Smallest unsigned integer record for `v`.
fn write_uint(buf: &mut BytesMut, v: u64) {
    match marker::width_for(v) {
        1 => {
            buf.put_u8(marker::INT_8);
            buf.put_u8(v as u8);
        }
        2 => {
            buf.put_u8(marker::INT_16);
            buf.put_u16(v as u16);
        }
        4 => {
            buf.put_u8(marker::INT_32);
            buf.put_u32(v as u32);
        }
        _ if v <= i64::MAX as u64 => {
            buf.put_u8(marker::INT_64);
            buf.put_u64(v);
        }
        _ => {
            buf.put_u8(marker::INT_128);
            buf.put_u64(0);
            buf.put_u64(v);
        }
    }
}

fn write_number(buf: &mut BytesMut, n: Number) {
    match n {
        Number::U8(v) => {
            buf.put_u8(marker::INT_8);
            buf.put_u8(v);
        }
        Number::U16(v) => {
            buf.put_u8(marker::INT_16);
            buf.put_u16(v);
        }
        Number::U32(v) => {
            buf.put_u8(marker::INT_32);
            buf.put_u32(v);
        }
        Number::U64(v) if v <= i64::MAX as u64 => {
            buf.put_u8(marker::INT_64);
            buf.put_u64(v);
        }
        Number::U64(v) => {
            buf.put_u8(marker::INT_128);
            buf.put_u64(0);
            buf.put_u64(v);
        }
        // Non-negative signed values keep their width in unsigned form.
        Number::I8(v) if v >= 0 => write_number(buf, Number::U8(v as u8)),
        Number::I16(v) if v >= 0 => write_number(buf, Number::U16(v as u16)),
        Number::I32(v) if v >= 0 => write_number(buf, Number::U32(v as u32)),
        Number::I8(_) | Number::I16(_) | Number::I32(_) | Number::I64(_) => {
            buf.put_u8(marker::INT_64);
            buf.put_i64(n.as_i64().unwrap_or_default());
        }
        Number::F32(v) => {
            buf.put_u8(marker::REAL_32);
            buf.put_f32(v);
        }
        Number::F64(v) => {
            buf.put_u8(marker::REAL_64);
            buf.put_f64(v);
        }
    }
}

fn write_string(buf: &mut BytesMut, s: &str) {
    if s.is_ascii() {
        put_header(buf, marker::ASCII_STRING, s.len() as u64);
        buf.put_slice(s.as_bytes());
    } else {
        let units: Vec<u16> = s.encode_utf16().collect();
        put_header(buf, marker::UTF16_STRING, units.len() as u64);
        for unit in units {
            buf.put_u16(unit);
        }
    }
}

fn write_refs(buf: &mut BytesMut, refs: &[u64], item_size: u8) {
    for &r in refs {
        buf.put_uint(r, usize::from(item_size));
    }
}

fn write_record(
    buf: &mut BytesMut,
    value: &Value,
    refs: &[u64],
    item_size: u8,
    cx: Context<'_>,
) -> Result<(), ObjectError> {
    match value.kind() {
        Kind::Null => buf.put_u8(marker::NULL),
        Kind::Boolean => buf.put_u8(if value.as_bool() == Some(true) {
            marker::TRUE
        } else {
            marker::FALSE
        }),
        Kind::Number => {
            if let Some(n) = value.as_number() {
                write_number(buf, n);
            }
        }
        Kind::String => write_string(buf, &value.as_string().unwrap_or_default()),
        Kind::Data => {
            let data = value.as_data().unwrap_or_default();
            put_header(buf, marker::DATA, data.len() as u64);
            buf.put_slice(&data);
        }
        Kind::Date => {
            let seconds = value.as_date().unwrap_or_default();
            buf.put_u8(marker::DATE);
            buf.put_f64(seconds as f64 - marker::APPLE_EPOCH_OFFSET as f64);
        }
        Kind::Array => {
            put_header(buf, marker::ARRAY, refs.len() as u64);
            write_refs(buf, refs, item_size);
        }
        Kind::Dictionary => {
            put_header(buf, marker::DICT, (refs.len() / 2) as u64);
            write_refs(buf, refs, item_size);
        }
        kind @ Kind::User(t) => {
            let hooks = cx.hooks;
            let hook = hooks.encoder(t).ok_or(ObjectError::UnsupportedKind {
                format: FormatId::Bplist,
                kind,
            })?;
            hook(&mut EncodeContext::new(buf, put_header), value)?;
        }
    }
    Ok(())
}
