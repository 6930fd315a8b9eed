//! Bplist decoding.
//!
//! Decoding runs in two passes. The first parses every record named by the
//! offset table: leaves become finished values and containers become empty
//! values plus their raw reference lists. After the reference graph is
//! checked for cycles, the second pass fills each container with the
//! shared child instances.

use bytes::Buf;

use super::marker;
use super::trailer::{TRAILER_LEN, Trailer};
use crate::error::ObjectError;
use crate::format::{Context, DecodeContext};
use crate::types::{Kind, Number, Value};

/// Decodes a complete bplist document.
pub fn decode_document(data: &[u8], cx: Context<'_>) -> Result<Value, ObjectError> {
    let magic = data
        .get(..marker::MAGIC.len())
        .ok_or_else(|| ObjectError::malformed("document shorter than the bplist magic"))?;
    if magic != marker::MAGIC {
        return Err(ObjectError::malformed("bad bplist magic"));
    }

    let trailer = Trailer::parse(data)?;
    if let Some(limit) = cx.config.object_limit()
        && trailer.object_count > limit as u64
    {
        return Err(ObjectError::ResourceExhausted(format!(
            "{} objects exceeds the limit of {limit}",
            trailer.object_count
        )));
    }

    // The trailer checks bound these conversions by the input length.
    let count = trailer.object_count as usize;
    let table_start = trailer.offset_table_index as usize;
    let body = &data[..data.len() - TRAILER_LEN];

    let parser = RecordParser {
        body,
        table_end: table_start,
        count,
        item_size: usize::from(trailer.item_size),
        cx,
    };
    let mut table = &body[table_start..];
    let mut entries = Vec::with_capacity(count);
    // Well-formed records never share reference bytes, so the references
    // of all records together fit in the body.
    let ref_budget = body.len() / parser.item_size;
    let mut refs = 0usize;
    for index in 0..count {
        let offset = table.get_uint(usize::from(trailer.offset_size));
        let entry = parser.parse(offset).map_err(|e| match e {
            ObjectError::Malformed(msg) => {
                ObjectError::Malformed(format!("object {index} at offset {offset}: {msg}"))
            }
            other => other,
        })?;
        refs = refs.saturating_add(entry.ref_count());
        if refs > ref_budget {
            return Err(ObjectError::ResourceExhausted(format!(
                "object {index} raises the reference count past the {ref_budget} the document can hold"
            )));
        }
        entries.push(entry);
    }

    check_keys(&entries)?;
    let height = check_graph(&entries, trailer.root_object as usize)?;
    let limit = cx.config.depth_limit();
    if height > limit {
        return Err(ObjectError::ResourceExhausted(format!(
            "nesting deeper than {limit}"
        )));
    }
    resolve(&entries);

    Ok(entries[trailer.root_object as usize].value().clone())
}

/// A record after the first pass.
enum Entry {
    Leaf(Value),
    /// Arrays and sets.
    Array { value: Value, items: Vec<usize> },
    Dictionary {
        value: Value,
        keys: Vec<usize>,
        values: Vec<usize>,
    },
}

impl Entry {
    fn value(&self) -> &Value {
        match self {
            Self::Leaf(value) | Self::Array { value, .. } | Self::Dictionary { value, .. } => value,
        }
    }

    /// Number of object references in the record.
    fn ref_count(&self) -> usize {
        match self {
            Self::Leaf(_) => 0,
            Self::Array { items, .. } => items.len(),
            Self::Dictionary { keys, values, .. } => keys.len() + values.len(),
        }
    }

    /// Object indices this record refers to.
    fn children(&self) -> &[usize] {
        match self {
            Self::Leaf(_) => &[],
            Self::Array { items, .. } => items,
            Self::Dictionary { values, .. } => values,
        }
    }
}

struct RecordParser<'b, 'c> {
    /// Everything before the trailer.
    body: &'b [u8],
    /// Records must start before the offset table.
    table_end: usize,
    count: usize,
    item_size: usize,
    cx: Context<'c>,
}

fn ensure_remaining(buf: &impl Buf, n: usize) -> Result<(), ObjectError> {
    if buf.remaining() < n {
        return Err(ObjectError::Malformed(format!(
            "need {n} bytes but only {} remaining",
            buf.remaining()
        )));
    }
    Ok(())
}

impl RecordParser<'_, '_> {
    fn parse(&self, offset: u64) -> Result<Entry, ObjectError> {
        let offset = usize::try_from(offset)
            .ok()
            .filter(|&o| o >= marker::MAGIC.len() && o < self.table_end)
            .ok_or_else(|| ObjectError::malformed("offset outside the object area"))?;
        let mut buf = &self.body[offset..];

        let m = buf.get_u8();
        let low = m & 0x0F;
        let value = match m & 0xF0 {
            marker::NULL => match m {
                marker::NULL => Value::null(),
                marker::FALSE => Value::boolean(false),
                marker::TRUE => Value::boolean(true),
                _ => return Err(ObjectError::Malformed(format!("unknown marker 0x{m:02X}"))),
            },
            marker::INT => Value::number(read_int(&mut buf, low)?),
            marker::REAL => {
                let number = match m {
                    marker::REAL_32 => {
                        ensure_remaining(&buf, 4)?;
                        Number::F32(buf.get_f32())
                    }
                    marker::REAL_64 => {
                        ensure_remaining(&buf, 8)?;
                        Number::F64(buf.get_f64())
                    }
                    _ => return Err(ObjectError::Malformed(format!("invalid real width 0x{m:02X}"))),
                };
                Value::number(number)
            }
            0x30 if m == marker::DATE => {
                ensure_remaining(&buf, 8)?;
                let seconds = buf.get_f64();
                if !seconds.is_finite() {
                    return Err(ObjectError::malformed("date is not finite"));
                }
                Value::date((seconds.floor() as i64).saturating_add(marker::APPLE_EPOCH_OFFSET))
            }
            marker::DATA => {
                let len = read_length(&mut buf, low)?;
                Value::data(take(&mut buf, len, 1)?.to_vec())
            }
            marker::ASCII_STRING => {
                let len = read_length(&mut buf, low)?;
                let bytes = take(&mut buf, len, 1)?;
                if !bytes.is_ascii() {
                    return Err(ObjectError::malformed("ASCII string record holds non-ASCII bytes"));
                }
                Value::string(String::from_utf8_lossy(bytes).into_owned())
            }
            marker::UTF16_STRING => {
                let len = read_length(&mut buf, low)?;
                let mut bytes = take(&mut buf, len, 2)?;
                let units: Vec<u16> = (0..len).map(|_| bytes.get_u16()).collect();
                let s = String::from_utf16(&units)
                    .map_err(|_| ObjectError::malformed("string is not valid UTF-16"))?;
                Value::string(s)
            }
            marker::UID => {
                let width = usize::from(low) + 1;
                if width > 8 {
                    return Err(ObjectError::Malformed(format!("UID of {width} bytes")));
                }
                ensure_remaining(&buf, width)?;
                Value::number(Number::U64(buf.get_uint(width)))
            }
            marker::ARRAY | marker::SET => {
                let len = read_length(&mut buf, low)?;
                let items = self.read_refs(&mut buf, len)?;
                return Ok(Entry::Array {
                    value: Value::array(),
                    items,
                });
            }
            marker::DICT => {
                let len = read_length(&mut buf, low)?;
                let keys = self.read_refs(&mut buf, len)?;
                let values = self.read_refs(&mut buf, len)?;
                return Ok(Entry::Dictionary {
                    value: Value::dictionary(),
                    keys,
                    values,
                });
            }
            high => {
                let hooks = self.cx.hooks;
                let Some(hook) = hooks.decoder(high) else {
                    return Err(ObjectError::Malformed(format!("unknown marker 0x{m:02X}")));
                };
                let len = read_length(&mut buf, low)?;
                hook(&mut DecodeContext::new(high, len as u64, &mut buf))?
            }
        };
        Ok(Entry::Leaf(value))
    }

    /// Reads `len` object references, each checked against the object count.
    fn read_refs(&self, buf: &mut &[u8], len: usize) -> Result<Vec<usize>, ObjectError> {
        let mut raw = take(buf, len, self.item_size)?;
        let mut refs = Vec::with_capacity(len);
        for _ in 0..len {
            let index = raw.get_uint(self.item_size);
            if index >= self.count as u64 {
                return Err(ObjectError::Malformed(format!(
                    "object reference {index} outside {} objects",
                    self.count
                )));
            }
            refs.push(index as usize);
        }
        Ok(refs)
    }
}

/// Reads an integer payload whose width is `1 << exp` bytes.
///
/// 8-byte integers are signed. 16-byte integers must fit in an unsigned
/// 64-bit value.
fn read_int(buf: &mut &[u8], exp: u8) -> Result<Number, ObjectError> {
    if exp > 4 {
        return Err(ObjectError::Malformed(format!("invalid integer width 2^{exp}")));
    }
    let width = 1usize << exp;
    ensure_remaining(&*buf, width)?;
    Ok(match width {
        1 => Number::U8(buf.get_u8()),
        2 => Number::U16(buf.get_u16()),
        4 => Number::U32(buf.get_u32()),
        8 => Number::I64(buf.get_i64()),
        _ => {
            if buf.get_u64() != 0 {
                return Err(ObjectError::malformed("128-bit integer exceeds 64 bits"));
            }
            Number::U64(buf.get_u64())
        }
    })
}

/// Resolves a record length: inline in the low nibble, or a following
/// integer record.
fn read_length(buf: &mut &[u8], low: u8) -> Result<usize, ObjectError> {
    if low != marker::LENGTH_FOLLOWS {
        return Ok(usize::from(low));
    }
    ensure_remaining(&*buf, 1)?;
    let m = buf.get_u8();
    if m & 0xF0 != marker::INT {
        return Err(ObjectError::Malformed(format!(
            "length record has marker 0x{m:02X}"
        )));
    }
    let len = read_int(buf, m & 0x0F)?;
    len.as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| ObjectError::malformed("invalid record length"))
}

/// Splits off `len * unit` bytes.
fn take<'b>(buf: &mut &'b [u8], len: usize, unit: usize) -> Result<&'b [u8], ObjectError> {
    let n = len
        .checked_mul(unit)
        .filter(|&n| n <= buf.len())
        .ok_or_else(|| {
            ObjectError::Malformed(format!(
                "record of {len} elements exceeds the {} remaining bytes",
                buf.len()
            ))
        })?;
    let (head, tail) = buf.split_at(n);
    *buf = tail;
    Ok(head)
}

/// Every dictionary key must refer to a string record.
fn check_keys(entries: &[Entry]) -> Result<(), ObjectError> {
    for entry in entries {
        if let Entry::Dictionary { keys, .. } = entry {
            for &key in keys {
                if entries[key].value().kind() != Kind::String {
                    return Err(ObjectError::Malformed(format!(
                        "dictionary key refers to a {} record",
                        entries[key].value().kind()
                    )));
                }
            }
        }
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    Active,
    Done,
}

/// Rejects reference cycles and returns the container nesting height of
/// `root` (0 for a leaf).
fn check_graph(entries: &[Entry], root: usize) -> Result<usize, ObjectError> {
    let mut state = vec![Visit::New; entries.len()];
    let mut height = vec![0usize; entries.len()];

    for start in 0..entries.len() {
        if state[start] != Visit::New {
            continue;
        }
        state[start] = Visit::Active;
        let mut stack = vec![(start, 0usize)];
        while let Some((node, next)) = stack.last_mut() {
            let node = *node;
            let children = entries[node].children();
            if let Some(&child) = children.get(*next) {
                *next += 1;
                match state[child] {
                    Visit::Active => {
                        return Err(ObjectError::Malformed(format!(
                            "object {child} contains itself"
                        )));
                    }
                    Visit::New => {
                        state[child] = Visit::Active;
                        stack.push((child, 0));
                    }
                    Visit::Done => {}
                }
            } else {
                height[node] = match entries[node] {
                    Entry::Leaf(_) => 0,
                    _ => 1 + children.iter().map(|&c| height[c]).max().unwrap_or(0),
                };
                state[node] = Visit::Done;
                stack.pop();
            }
        }
    }
    Ok(height[root])
}

/// Second pass: fill containers with their children.
fn resolve(entries: &[Entry]) {
    for entry in entries {
        match entry {
            Entry::Leaf(_) => {}
            Entry::Array { value, items } => {
                for &item in items {
                    value.push_unchecked(entries[item].value().clone());
                }
            }
            Entry::Dictionary { value, keys, values } => {
                for (&key, &item) in keys.iter().zip(values) {
                    let key = entries[key].value().as_string().unwrap_or_default();
                    value.insert_unchecked(key, entries[item].value().clone());
                }
            }
        }
    }
}
