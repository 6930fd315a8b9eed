//! Per-format extension hooks for kinds beyond the built-ins.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::{Buf, BytesMut};

use crate::error::ObjectError;
use crate::types::Value;

/// Decodes one value whose wire tag has no built-in handler.
pub type DecodeHook =
    Arc<dyn Fn(&mut DecodeContext<'_, '_>) -> Result<Value, ObjectError> + Send + Sync>;

/// Encodes one user value, header included.
pub type EncodeHook =
    Arc<dyn Fn(&mut EncodeContext<'_>, &Value) -> Result<(), ObjectError> + Send + Sync>;

/// Hook tables of one registered format.
#[derive(Default, Clone)]
pub struct Hooks {
    decoders: HashMap<u8, DecodeHook>,
    encoders: HashMap<u8, EncodeHook>,
}

impl Hooks {
    pub fn decoder(&self, tag: u8) -> Option<&DecodeHook> {
        self.decoders.get(&tag)
    }

    pub fn encoder(&self, tag: u8) -> Option<&EncodeHook> {
        self.encoders.get(&tag)
    }

    pub(crate) fn set_decoder(&mut self, tag: u8, hook: DecodeHook) {
        self.decoders.insert(tag, hook);
    }

    pub(crate) fn set_encoder(&mut self, tag: u8, hook: EncodeHook) {
        self.encoders.insert(tag, hook);
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut decoders: Vec<_> = self.decoders.keys().collect();
        let mut encoders: Vec<_> = self.encoders.keys().collect();
        decoders.sort();
        encoders.sort();
        f.debug_struct("Hooks")
            .field("decoders", &decoders)
            .field("encoders", &encoders)
            .finish()
    }
}

/// Input handed to a [`DecodeHook`]: the wire tag, its size field, and a
/// cursor positioned just after the header.
pub struct DecodeContext<'a, 'b> {
    tag: u8,
    size: u64,
    input: &'a mut &'b [u8],
}

impl<'a, 'b> DecodeContext<'a, 'b> {
    pub(crate) fn new(tag: u8, size: u64, input: &'a mut &'b [u8]) -> Self {
        Self { tag, size, input }
    }

    pub fn tag(&self) -> u8 {
        self.tag
    }

    /// The header's size field (a length, count or inline payload).
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn remaining(&self) -> usize {
        self.input.len()
    }

    /// Consumes `n` bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'b [u8], ObjectError> {
        let data: &'b [u8] = self.input;
        if data.len() < n {
            return Err(ObjectError::Malformed(format!(
                "need {n} bytes but only {} remaining",
                data.len()
            )));
        }
        let (head, tail) = data.split_at(n);
        *self.input = tail;
        Ok(head)
    }

    pub fn read_u8(&mut self) -> Result<u8, ObjectError> {
        Ok(self.read_bytes(1)?.get_u8())
    }

    pub fn read_u16(&mut self) -> Result<u16, ObjectError> {
        Ok(self.read_bytes(2)?.get_u16())
    }

    pub fn read_u32(&mut self) -> Result<u32, ObjectError> {
        Ok(self.read_bytes(4)?.get_u32())
    }

    pub fn read_u64(&mut self) -> Result<u64, ObjectError> {
        Ok(self.read_bytes(8)?.get_u64())
    }
}

/// Output handed to an [`EncodeHook`]: the sink plus the format's header
/// writer.
pub struct EncodeContext<'a> {
    buf: &'a mut BytesMut,
    header: fn(&mut BytesMut, u8, u64),
}

impl<'a> EncodeContext<'a> {
    pub(crate) fn new(buf: &'a mut BytesMut, header: fn(&mut BytesMut, u8, u64)) -> Self {
        Self { buf, header }
    }

    /// Writes a value header in the format's own tag/size encoding.
    pub fn put_header(&mut self, tag: u8, size: u64) {
        (self.header)(self.buf, tag, size);
    }

    /// The sink, for writing the payload after the header.
    pub fn buf(&mut self) -> &mut BytesMut {
        self.buf
    }
}
