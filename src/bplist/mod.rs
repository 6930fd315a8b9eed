//! Apple's binary property list format (`bplist00`).
//!
//! A document is the magic, a run of object records, an offset table
//! locating each record, and a 32-byte [`Trailer`]. Arrays and
//! dictionaries hold object-table indices rather than nested records, so
//! a shared child is stored once and decodes to one instance.

pub mod decode;
pub mod encode;
pub mod marker;
pub mod trailer;

use bytes::BytesMut;

pub use decode::decode_document;
pub use encode::encode_document;
pub use trailer::Trailer;

use crate::error::ObjectError;
use crate::format::{Context, Reader, Writer};
use crate::types::{Value, tag};

/// Probe score for a `bplist` prefix.
const PROBE_SCORE: u32 = 80;

#[derive(Debug, Default, Clone, Copy)]
pub struct BplistReader;

impl Reader for BplistReader {
    fn probe(&self, prefix: &[u8]) -> u32 {
        match prefix.get(..6) {
            Some(p) if p.eq_ignore_ascii_case(&marker::MAGIC[..6]) => PROBE_SCORE,
            _ => 0,
        }
    }

    fn read(&self, data: &[u8], cx: Context<'_>) -> Result<Value, ObjectError> {
        decode_document(data, cx)
    }

    /// Hooks key on a record marker whose high nibble no built-in kind
    /// uses, with the low nibble clear (e.g. `0x70`).
    fn accepts_hook(&self, ty: u8) -> bool {
        ty & 0x0F == 0 && !marker::is_builtin(ty)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BplistWriter;

impl Writer for BplistWriter {
    fn write(&self, buf: &mut BytesMut, value: &Value, cx: Context<'_>) -> Result<usize, ObjectError> {
        encode_document(buf, value, cx)
    }

    fn accepts_hook(&self, ty: u8) -> bool {
        ty >= tag::USER
    }
}

#[cfg(test)]
mod tests {
    use bytes::BufMut;

    use super::*;
    use crate::format::{FormatId, Registry};
    use crate::types::UserObject;

    #[test]
    fn probe() {
        assert_eq!(BplistReader.probe(b"bplist00"), 80);
        assert_eq!(BplistReader.probe(b"BPList15"), 80);
        assert_eq!(BplistReader.probe(b"bplis"), 0);
        assert_eq!(BplistReader.probe(b"tbo00"), 0);
    }

    #[test]
    fn hook_acceptance() {
        assert!(BplistReader.accepts_hook(0x70));
        assert!(BplistReader.accepts_hook(0xE0));
        assert!(!BplistReader.accepts_hook(0x71));
        assert!(!BplistReader.accepts_hook(0xA0));
        assert!(!BplistReader.accepts_hook(0x00));
        assert!(BplistWriter.accepts_hook(tag::USER));
        assert!(!BplistWriter.accepts_hook(tag::DICTIONARY));
    }

    #[test]
    fn user_records_through_hooks() {
        const TAG: u8 = 0x30;
        let mut registry = Registry::with_defaults();
        registry
            .writer_hook(FormatId::Bplist, TAG, |cx, value| {
                let n = value
                    .as_user()
                    .and_then(|u| u.downcast_ref::<u16>())
                    .copied()
                    .unwrap_or_default();
                cx.put_header(0x70, 2);
                cx.buf().put_u16(n);
                Ok(())
            })
            .unwrap();
        registry
            .reader_hook(FormatId::Bplist, 0x70, |cx| {
                assert_eq!(cx.size(), 2);
                let n = cx.read_u16()?;
                Ok(Value::user(UserObject::new(TAG, n)))
            })
            .unwrap();

        let root = Value::array_from(vec![Value::user(UserObject::new(TAG, 513u16))]);
        let bytes = registry.to_bytes(&root, FormatId::Bplist).unwrap();
        let decoded = registry.read_auto(&bytes).unwrap();
        let user = decoded.at(0).unwrap();
        assert_eq!(user.as_user().and_then(|u| u.downcast_ref::<u16>()), Some(&513));

        assert!(registry.reader_hook(FormatId::Bplist, 0xA0, |_| Ok(Value::null())).is_err());
    }
}
