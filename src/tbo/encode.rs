//! TBO encoding: `Value` → bytes.

use std::collections::HashMap;

use bytes::{BufMut, BytesMut};

use super::marker;
use crate::error::ObjectError;
use crate::format::{Context, EncodeContext, FormatId};
use crate::types::{Kind, Number, Value, tag};

/// Appends a complete TBO document (magic included) to `buf`.
pub fn encode_document(
    buf: &mut BytesMut,
    value: &Value,
    cx: Context<'_>,
) -> Result<usize, ObjectError> {
    let start = buf.len();
    buf.put_slice(marker::MAGIC);

    let mut encoder = Encoder {
        buf,
        strings: HashMap::new(),
        objects: HashMap::new(),
        next: 0,
        cx,
    };
    encoder.encode_value(value, 0)?;
    tracing::debug!(objects = encoder.next, "encoded tbo document");
    Ok(encoder.buf.len() - start)
}

struct Encoder<'a, 'c> {
    buf: &'a mut BytesMut,
    /// Strings (keys and values) already written, by content.
    strings: HashMap<String, u64>,
    /// Other values already written, by node address. The handle keeps the
    /// address from being reused while the table is alive.
    objects: HashMap<usize, (Value, u64)>,
    next: u64,
    cx: Context<'c>,
}

impl Encoder<'_, '_> {
    fn lookup(&self, value: &Value) -> Option<u64> {
        match value.as_string() {
            Some(s) => self.strings.get(&s).copied(),
            None => self.objects.get(&value.addr()).map(|(_, index)| *index),
        }
    }

    /// Records a fully written value as the next object-table slot.
    fn register(&mut self, value: &Value) {
        let index = self.next;
        self.next += 1;
        match value.as_string() {
            Some(s) => {
                self.strings.entry(s).or_insert(index);
            }
            None => {
                self.objects.entry(value.addr()).or_insert((value.clone(), index));
            }
        }
    }

    /// Writes a back-reference if `value` was already written, otherwise
    /// the value itself followed by its registration.
    fn encode_child(&mut self, value: &Value, depth: usize) -> Result<(), ObjectError> {
        if let Some(index) = self.lookup(value) {
            marker::put_header(self.buf, tag::BACKREF, index);
            return Ok(());
        }
        self.encode_value(value, depth)?;
        self.register(value);
        Ok(())
    }

    fn encode_key(&mut self, key: &str) {
        if let Some(&index) = self.strings.get(key) {
            marker::put_header(self.buf, tag::BACKREF, index);
            return;
        }
        encode_bytes(self.buf, tag::STRING, key.as_bytes());
        self.strings.insert(key.to_owned(), self.next);
        self.next += 1;
    }

    fn encode_value(&mut self, value: &Value, depth: usize) -> Result<(), ObjectError> {
        match value.kind() {
            Kind::Null => marker::put_header(self.buf, tag::NULL, 0),
            Kind::Boolean => {
                let b = value.as_bool().unwrap_or_default();
                marker::put_header(self.buf, tag::BOOLEAN, u64::from(b));
            }
            Kind::Number => {
                if let Some(n) = value.as_number() {
                    encode_number(self.buf, n);
                }
            }
            Kind::String => {
                let s = value.as_string().unwrap_or_default();
                encode_bytes(self.buf, tag::STRING, s.as_bytes());
            }
            Kind::Data => {
                let d = value.as_data().unwrap_or_default();
                encode_bytes(self.buf, tag::DATA, &d);
            }
            Kind::Date => {
                let seconds = value.as_date().unwrap_or_default();
                marker::put_header(self.buf, tag::DATE, seconds as u64);
            }
            Kind::Array => {
                self.enter(depth + 1)?;
                let items = value.items().unwrap_or_default();
                marker::put_header(self.buf, tag::ARRAY, items.len() as u64);
                for item in &items {
                    self.encode_child(item, depth + 1)?;
                }
            }
            Kind::Dictionary => {
                self.enter(depth + 1)?;
                let entries = value.entries().unwrap_or_default();
                marker::put_header(self.buf, tag::DICTIONARY, entries.len() as u64);
                for (key, item) in &entries {
                    self.encode_key(key);
                    self.encode_child(item, depth + 1)?;
                }
            }
            kind @ Kind::User(t) => {
                let hooks = self.cx.hooks;
                let hook = hooks.encoder(t).ok_or(ObjectError::UnsupportedKind {
                    format: FormatId::Bin,
                    kind,
                })?;
                hook(&mut EncodeContext::new(self.buf, marker::put_header), value)?;
            }
        }
        Ok(())
    }

    fn enter(&self, depth: usize) -> Result<(), ObjectError> {
        let limit = self.cx.config.depth_limit();
        if depth > limit {
            return Err(ObjectError::ResourceExhausted(format!(
                "nesting deeper than {limit}"
            )));
        }
        Ok(())
    }
}

fn encode_bytes(buf: &mut BytesMut, ty: u8, bytes: &[u8]) {
    marker::put_header(buf, ty, bytes.len() as u64);
    let start = buf.len();
    buf.put_slice(bytes);
    marker::mask(&mut buf[start..]);
}

fn encode_number(buf: &mut BytesMut, n: Number) {
    marker::put_header(buf, tag::NUMBER, u64::from(n.number_type().tag()));
    match n {
        Number::U8(v) => buf.put_u8(v),
        Number::I8(v) => buf.put_i8(v),
        Number::U16(v) => buf.put_u16(v),
        Number::I16(v) => buf.put_i16(v),
        Number::U32(v) => buf.put_u32(v),
        Number::I32(v) => buf.put_i32(v),
        Number::U64(v) => buf.put_u64(v),
        Number::I64(v) => buf.put_i64(v),
        Number::F32(v) => buf.put_f32(v),
        Number::F64(v) => buf.put_f64(v),
    }
}
