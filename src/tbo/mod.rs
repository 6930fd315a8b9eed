//! TBO: the compact binary object format.
//!
//! A document is the 5-byte magic `tbo00` followed by one recursively
//! encoded value. Each value starts with a flag byte whose high nibble is
//! the type tag and whose low nibble is a size, a count, or an escape
//! selecting a wider size field. Type 0 is a back-reference into the
//! table of values already written, which is how shared children and
//! repeated strings are stored once.
//!
//! The writer always emits the canonical escapes (`0xC..=0xF` select a
//! 1/2/4/8-byte size). The reader accepts the older convention too when
//! configured with [`SizeEscapes::Legacy`](crate::config::SizeEscapes).

pub mod decode;
pub mod encode;
pub mod marker;

use bytes::BytesMut;

pub use decode::decode_document;
pub use encode::encode_document;

use crate::error::ObjectError;
use crate::format::{Context, Reader, Writer};
use crate::types::{Value, tag};

/// Probe score for a `tbo` prefix.
const PROBE_SCORE: u32 = 80;

#[derive(Debug, Default, Clone, Copy)]
pub struct TboReader;

impl Reader for TboReader {
    fn probe(&self, prefix: &[u8]) -> u32 {
        match prefix.get(..3) {
            Some(p) if p.eq_ignore_ascii_case(&marker::MAGIC[..3]) => PROBE_SCORE,
            _ => 0,
        }
    }

    fn read(&self, data: &[u8], cx: Context<'_>) -> Result<Value, ObjectError> {
        decode_document(data, cx)
    }

    fn accepts_hook(&self, ty: u8) -> bool {
        ty != tag::BACKREF && !tag::is_builtin(ty)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TboWriter;

impl Writer for TboWriter {
    fn write(&self, buf: &mut BytesMut, value: &Value, cx: Context<'_>) -> Result<usize, ObjectError> {
        encode_document(buf, value, cx)
    }

    fn accepts_hook(&self, ty: u8) -> bool {
        ty >= tag::USER
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::BufMut;

    use super::*;
    use crate::format::{FormatId, Registry};
    use crate::types::UserObject;

    /// A caller kind: a 2D point stored as two big-endian i32s.
    #[derive(Debug, PartialEq)]
    struct Point(i32, i32);

    const POINT: u8 = 0x20;

    fn registry_with_points() -> Registry {
        let mut registry = Registry::with_defaults();
        registry
            .writer_hook(FormatId::Bin, POINT, |cx, value| {
                let point = value
                    .as_user()
                    .and_then(|u| u.downcast_ref::<Point>())
                    .ok_or_else(|| ObjectError::Invariant("not a point".into()))?;
                cx.put_header(POINT, 8);
                cx.buf().put_i32(point.0);
                cx.buf().put_i32(point.1);
                Ok(())
            })
            .unwrap();
        registry
            .reader_hook(FormatId::Bin, POINT, |cx| {
                if cx.size() != 8 {
                    return Err(ObjectError::malformed("bad point size"));
                }
                let x = cx.read_u32()? as i32;
                let y = cx.read_u32()? as i32;
                Ok(Value::user(UserObject::new(POINT, Point(x, y))))
            })
            .unwrap();
        registry
    }

    #[test]
    fn probe() {
        assert_eq!(TboReader.probe(b"tbo00"), 80);
        assert_eq!(TboReader.probe(b"TbO"), 80);
        assert_eq!(TboReader.probe(b"tb"), 0);
        assert_eq!(TboReader.probe(b"bplist00"), 0);
    }

    #[test]
    fn hook_acceptance() {
        assert!(!TboReader.accepts_hook(tag::BACKREF));
        assert!(!TboReader.accepts_hook(tag::STRING));
        assert!(TboReader.accepts_hook(tag::USER));
        assert!(TboReader.accepts_hook(0xFF));
        assert!(!TboWriter.accepts_hook(tag::NULL));
        assert!(TboWriter.accepts_hook(0x80));
    }

    #[test]
    fn user_kind_round_trips_through_hooks() {
        let registry = registry_with_points();
        let point = Value::user(UserObject::new(POINT, Point(-3, 7)));
        let root = Value::array_from(vec![point.clone(), point]);

        let bytes = registry.to_bytes(&root, FormatId::Bin).unwrap();
        // Extended type byte for 0x20, then the back-reference.
        assert_eq!(&bytes[5..9], &[0x32, 0xF8, POINT, 0xFF]);
        assert_eq!(bytes.last(), Some(&0x00));

        let decoded = registry.read(&bytes, FormatId::Bin).unwrap();
        let first = decoded.at(0).unwrap();
        assert!(Value::ptr_eq(&first, &decoded.at(1).unwrap()));
        let payload = first.as_user().and_then(|u| u.downcast_ref::<Point>());
        assert_eq!(payload, Some(&Point(-3, 7)));
    }

    #[test]
    fn unhooked_tag_is_malformed() {
        let registry = registry_with_points();
        let err = registry.read(b"tbo00\xF0\x21", FormatId::Bin).unwrap_err();
        assert!(matches!(err, ObjectError::Malformed(_)));
    }

    #[test]
    fn failing_hook_aborts_decode() {
        let mut registry = Registry::with_defaults();
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen = calls.clone();
        registry
            .reader_hook(FormatId::Bin, tag::USER, move |_| {
                seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Err(ObjectError::malformed("rejected"))
            })
            .unwrap();
        assert!(registry.read(b"tbo00\x32\x80\x90", FormatId::Bin).is_err());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
