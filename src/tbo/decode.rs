//! TBO decoding: bytes → `Value`.

use bytes::Buf;

use super::marker;
use crate::error::ObjectError;
use crate::format::{Context, DecodeContext};
use crate::types::{Number, NumberType, Value, tag};

/// Decodes a complete TBO document, magic included.
pub fn decode_document(data: &[u8], cx: Context<'_>) -> Result<Value, ObjectError> {
    let magic = data
        .get(..marker::MAGIC.len())
        .ok_or_else(|| ObjectError::malformed("document shorter than the tbo magic"))?;
    if !magic.eq_ignore_ascii_case(marker::MAGIC) {
        return Err(ObjectError::malformed("bad tbo magic"));
    }

    let mut decoder = Decoder {
        input: &data[marker::MAGIC.len()..],
        table: Vec::new(),
        cx,
    };
    let (ty, size) = decoder.read_header()?;
    if ty == tag::BACKREF {
        return Err(ObjectError::malformed("root value cannot be a back-reference"));
    }
    let root = decoder.decode_body(ty, size, 0)?;
    if decoder.input.has_remaining() {
        tracing::trace!(trailing = decoder.input.remaining(), "ignoring bytes after tbo root");
    }
    tracing::debug!(objects = decoder.table.len(), "decoded tbo document");
    Ok(root)
}

struct Decoder<'b, 'c> {
    input: &'b [u8],
    /// Every value decoded so far (keys included), in completion order.
    table: Vec<Value>,
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

impl<'b> Decoder<'b, '_> {
    /// Reads a flag byte (plus extended type and escaped size) and returns
    /// `(type, size)`.
    fn read_header(&mut self) -> Result<(u8, u64), ObjectError> {
        ensure_remaining(&self.input, 1)?;
        let flag = self.input.get_u8();
        let mut ty = flag >> 4;
        let low = flag & 0x0F;
        if ty == marker::EXTENDED_TYPE {
            ensure_remaining(&self.input, 1)?;
            ty = self.input.get_u8();
        }

        let size = match marker::escape_width(low, self.cx.config.escapes()) {
            None => u64::from(low),
            Some(width) => {
                ensure_remaining(&self.input, width)?;
                self.input.get_uint(width)
            }
        };
        Ok((ty, size))
    }

    fn decode_value(&mut self, depth: usize) -> Result<Value, ObjectError> {
        let (ty, size) = self.read_header()?;
        if ty == tag::BACKREF {
            return self.backref(size);
        }
        let value = self.decode_body(ty, size, depth)?;
        self.register(value.clone())?;
        Ok(value)
    }

    fn backref(&self, index: u64) -> Result<Value, ObjectError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.table.get(i))
            .cloned()
            .ok_or_else(|| {
                ObjectError::Malformed(format!(
                    "back-reference {index} outside object table of {}",
                    self.table.len()
                ))
            })
    }

    fn register(&mut self, value: Value) -> Result<(), ObjectError> {
        if let Some(limit) = self.cx.config.object_limit()
            && self.table.len() >= limit
        {
            return Err(ObjectError::ResourceExhausted(format!(
                "object table exceeds {limit} entries"
            )));
        }
        self.table.push(value);
        Ok(())
    }

    fn decode_body(&mut self, ty: u8, size: u64, depth: usize) -> Result<Value, ObjectError> {
        match ty {
            tag::NULL => {
                if size != 0 {
                    return Err(ObjectError::malformed("null with non-zero size"));
                }
                Ok(Value::null())
            }
            tag::BOOLEAN => match size {
                0 => Ok(Value::boolean(false)),
                1 => Ok(Value::boolean(true)),
                _ => Err(ObjectError::Malformed(format!("invalid boolean payload {size}"))),
            },
            tag::NUMBER => self.decode_number(size),
            tag::DATE => Ok(Value::date(size as i64)),
            tag::STRING => {
                let bytes = self.read_masked(size)?;
                String::from_utf8(bytes)
                    .map(Value::string)
                    .map_err(|_| ObjectError::malformed("string is not valid UTF-8"))
            }
            tag::DATA => Ok(Value::data(self.read_masked(size)?)),
            tag::ARRAY => self.decode_array(size, depth + 1),
            tag::DICTIONARY => self.decode_dictionary(size, depth + 1),
            _ => self.decode_hooked(ty, size),
        }
    }

    fn decode_number(&mut self, size: u64) -> Result<Value, ObjectError> {
        let ty = u8::try_from(size)
            .ok()
            .and_then(NumberType::from_tag)
            .ok_or_else(|| ObjectError::Malformed(format!("invalid number type {size}")))?;
        ensure_remaining(&self.input, ty.width())?;
        let buf = &mut self.input;
        let number = match ty {
            NumberType::U8 => Number::U8(buf.get_u8()),
            NumberType::I8 => Number::I8(buf.get_i8()),
            NumberType::U16 => Number::U16(buf.get_u16()),
            NumberType::I16 => Number::I16(buf.get_i16()),
            NumberType::U32 => Number::U32(buf.get_u32()),
            NumberType::I32 => Number::I32(buf.get_i32()),
            NumberType::U64 => Number::U64(buf.get_u64()),
            NumberType::I64 => Number::I64(buf.get_i64()),
            NumberType::F32 => Number::F32(buf.get_f32()),
            NumberType::F64 => Number::F64(buf.get_f64()),
        };
        Ok(Value::number(number))
    }

    fn read_masked(&mut self, size: u64) -> Result<Vec<u8>, ObjectError> {
        let len = self.checked_len(size, 1)?;
        let mut payload = self.input[..len].to_vec();
        self.input.advance(len);
        marker::mask(&mut payload);
        Ok(payload)
    }

    /// Converts a size field to a length, rejecting anything that cannot
    /// fit in the remaining input at `unit` bytes per element.
    fn checked_len(&self, size: u64, unit: usize) -> Result<usize, ObjectError> {
        usize::try_from(size)
            .ok()
            .filter(|&n| n.checked_mul(unit).is_some_and(|b| b <= self.input.len()))
            .ok_or_else(|| {
                ObjectError::Malformed(format!(
                    "size {size} exceeds the {} remaining bytes",
                    self.input.len()
                ))
            })
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

    fn decode_array(&mut self, size: u64, depth: usize) -> Result<Value, ObjectError> {
        self.enter(depth)?;
        let count = self.checked_len(size, 1)?;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(self.decode_value(depth)?);
        }
        Ok(Value::array_from(items))
    }

    fn decode_dictionary(&mut self, size: u64, depth: usize) -> Result<Value, ObjectError> {
        self.enter(depth)?;
        let count = self.checked_len(size, 2)?;
        let dict = Value::dictionary();
        for _ in 0..count {
            let key = self.decode_key()?;
            let value = self.decode_value(depth)?;
            dict.insert_unchecked(key, value);
        }
        Ok(dict)
    }

    /// Keys are strings, either inline or shared through the object table.
    fn decode_key(&mut self) -> Result<String, ObjectError> {
        let (ty, size) = self.read_header()?;
        let key = match ty {
            tag::BACKREF => self.backref(size)?,
            tag::STRING => {
                let key = self.decode_body(ty, size, 0)?;
                self.register(key.clone())?;
                key
            }
            _ => {
                return Err(ObjectError::Malformed(format!(
                    "dictionary key has type {ty}, expected string"
                )));
            }
        };
        key.as_string()
            .ok_or_else(|| ObjectError::malformed("dictionary key refers to a non-string"))
    }

    fn decode_hooked(&mut self, ty: u8, size: u64) -> Result<Value, ObjectError> {
        let hooks = self.cx.hooks;
        let Some(hook) = hooks.decoder(ty) else {
            return Err(ObjectError::Malformed(format!("unknown type tag {ty}")));
        };
        tracing::trace!(tag = ty, size, "decoding through hook");
        hook(&mut DecodeContext::new(ty, size, &mut self.input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CodecConfig, SizeEscapes};
    use crate::format::Hooks;

    fn decode_with(data: &[u8], config: &CodecConfig) -> Result<Value, ObjectError> {
        let hooks = Hooks::default();
        decode_document(data, Context { config, hooks: &hooks })
    }

    fn decode(data: &[u8]) -> Result<Value, ObjectError> {
        decode_with(data, &CodecConfig::default())
    }

    fn doc(body: &[u8]) -> Vec<u8> {
        let mut out = b"tbo00".to_vec();
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn decode_scalars() {
        assert_eq!(decode(&doc(&[0x80])).unwrap(), Value::null());
        assert_eq!(decode(&doc(&[0x61])).unwrap(), Value::from(true));
        assert_eq!(decode(&doc(&[0x51, 0x2A])).unwrap(), Value::from(42u8));
        assert_eq!(decode(&doc(&[0x54, 0xFF, 0xFE])).unwrap(), Value::from(-2i16));
        assert_eq!(decode(&doc(&[0x2C, 0x64])).unwrap(), Value::date(100));
    }

    #[test]
    fn magic_is_case_insensitive() {
        assert!(decode(b"TBO00\x80").is_ok());
        assert!(decode(b"tbx00\x80").unwrap_err().is_malformed());
        assert!(decode(b"tbo").unwrap_err().is_malformed());
    }

    #[test]
    fn shared_array_decodes_to_one_instance() {
        // [a, a] where a = [] : inner array, then a back-reference to it.
        let value = decode(&doc(&[0x32, 0x30, 0x00])).unwrap();
        let a = value.at(0).unwrap();
        let b = value.at(1).unwrap();
        assert!(Value::ptr_eq(&a, &b));
        assert_eq!(a.ref_count(), 4);
    }

    #[test]
    fn shared_key_strings() {
        // [{"k": null}, {"k"(backref 0): null(backref 1)}]
        let mut body = vec![0x32, 0x71, 0x41];
        body.push(b'k' ^ 1);
        body.extend_from_slice(&[0x80, 0x71, 0x00, 0x01]);
        let value = decode(&doc(&body)).unwrap();
        assert_eq!(value.at(1).unwrap().get("k"), Some(Value::null()));
    }

    #[test]
    fn backref_out_of_range() {
        let err = decode(&doc(&[0x32, 0x80, 0x05])).unwrap_err();
        assert!(matches!(err, ObjectError::Malformed(_)));
    }

    #[test]
    fn root_backref_rejected() {
        assert!(decode(&doc(&[0x00])).unwrap_err().is_malformed());
    }

    #[test]
    fn non_string_key_rejected() {
        // {null: null}
        let err = decode(&doc(&[0x71, 0x80, 0x80])).unwrap_err();
        assert!(matches!(err, ObjectError::Malformed(_)));
        // {(backref to null): null}
        let err = decode(&doc(&[0x32, 0x80, 0x71, 0x00, 0x80])).unwrap_err();
        assert!(matches!(err, ObjectError::Malformed(_)));
    }

    #[test]
    fn truncated_input() {
        assert!(decode(&doc(&[0x54, 0xFF])).unwrap_err().is_malformed());
        assert!(decode(&doc(&[0x43, 0x00])).unwrap_err().is_malformed());
        assert!(decode(&doc(&[0x3D, 0xFF, 0xFF, 0x80])).unwrap_err().is_malformed());
    }

    #[test]
    fn invalid_payloads() {
        assert!(decode(&doc(&[0x62])).unwrap_err().is_malformed());
        assert!(decode(&doc(&[0x5B])).unwrap_err().is_malformed());
        assert!(decode(&doc(&[0x90])).unwrap_err().is_malformed());
        // 0xFF masked with key 1 is still not UTF-8.
        assert!(decode(&doc(&[0x41, 0xFE])).unwrap_err().is_malformed());
    }

    #[test]
    fn legacy_escapes() {
        let legacy = CodecConfig::default().size_escapes(SizeEscapes::Legacy);
        // A 12-element array folds its count inline under the legacy rules.
        let mut body = vec![0x3C];
        body.extend_from_slice(&[0x80; 12]);
        let value = decode_with(&doc(&body), &legacy).unwrap();
        assert_eq!(value.len(), Some(12));

        // 0xF escapes a 4-byte length.
        let value = decode_with(&doc(&[0x3F, 0, 0, 0, 1, 0x80]), &legacy).unwrap();
        assert_eq!(value.len(), Some(1));
    }

    #[test]
    fn depth_limit() {
        let config = CodecConfig::default().max_depth(2);
        assert!(decode_with(&doc(&[0x31, 0x30]), &config).is_ok());
        let err = decode_with(&doc(&[0x31, 0x31, 0x30]), &config).unwrap_err();
        assert!(matches!(err, ObjectError::ResourceExhausted(_)));
    }

    #[test]
    fn object_limit() {
        let config = CodecConfig::default().max_objects(2);
        assert!(decode_with(&doc(&[0x32, 0x80, 0x80]), &config).is_ok());
        let err = decode_with(&doc(&[0x33, 0x80, 0x80, 0x80]), &config).unwrap_err();
        assert!(matches!(err, ObjectError::ResourceExhausted(_)));
    }
}
