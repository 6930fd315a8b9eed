//! TBO header layout and payload masking.

use bytes::{BufMut, BytesMut};

use crate::config::SizeEscapes;

/// Document magic, compared case-insensitively on read.
pub const MAGIC: &[u8; 5] = b"tbo00";

/// High nibble meaning "the real type follows as one byte".
pub const EXTENDED_TYPE: u8 = 0xF;

// Canonical size escapes (low nibble): length follows as 1/2/4/8 bytes.
pub const SIZE_8: u8 = 0xC;
pub const SIZE_16: u8 = 0xD;
pub const SIZE_32: u8 = 0xE;
pub const SIZE_64: u8 = 0xF;

/// Largest size the canonical writer folds into the low nibble.
pub const MAX_INLINE: u64 = 0xB;

/// Byte width of the size field selected by low nibble `low`, or `None` if
/// the size is inline.
pub fn escape_width(low: u8, escapes: SizeEscapes) -> Option<usize> {
    match escapes {
        SizeEscapes::Canonical => match low {
            SIZE_8 => Some(1),
            SIZE_16 => Some(2),
            SIZE_32 => Some(4),
            SIZE_64 => Some(8),
            _ => None,
        },
        // The older encoder had no 8-byte form and kept 0xC inline.
        SizeEscapes::Legacy => match low {
            0xD => Some(1),
            0xE => Some(2),
            0xF => Some(4),
            _ => None,
        },
    }
}

/// Writes a value header: flag byte, optional extended type byte, then the
/// size using the smallest canonical escape that holds it.
pub fn put_header(buf: &mut BytesMut, tag: u8, size: u64) {
    let high = if tag < EXTENDED_TYPE { tag } else { EXTENDED_TYPE };
    let low = if size <= MAX_INLINE {
        size as u8
    } else if size <= u64::from(u8::MAX) {
        SIZE_8
    } else if size <= u64::from(u16::MAX) {
        SIZE_16
    } else if size <= u64::from(u32::MAX) {
        SIZE_32
    } else {
        SIZE_64
    };

    buf.put_u8((high << 4) | low);
    if high == EXTENDED_TYPE {
        buf.put_u8(tag);
    }
    match low {
        SIZE_8 => buf.put_u8(size as u8),
        SIZE_16 => buf.put_u16(size as u16),
        SIZE_32 => buf.put_u32(size as u32),
        SIZE_64 => buf.put_u64(size),
        _ => {}
    }
}

/// XORs a string or data payload in place. The transform is its own
/// inverse, so the same call masks and unmasks.
pub fn mask(payload: &mut [u8]) {
    let len = payload.len();
    let mut key = (((len >> 8) & 0xFF) | (len & 0xFF)) as u8;
    for byte in payload {
        *byte ^= key;
        key = key.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(tag: u8, size: u64) -> Vec<u8> {
        let mut buf = BytesMut::new();
        put_header(&mut buf, tag, size);
        buf.to_vec()
    }

    #[test]
    fn inline_and_escaped_sizes() {
        assert_eq!(header(3, 0), [0x30]);
        assert_eq!(header(3, 0xB), [0x3B]);
        assert_eq!(header(3, 0xC), [0x3C, 0x0C]);
        assert_eq!(header(4, 300), [0x4D, 0x01, 0x2C]);
        assert_eq!(header(1, 0x1_0000), [0x1E, 0x00, 0x01, 0x00, 0x00]);
        assert_eq!(
            header(2, u64::MAX),
            [0x2F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn extended_type_byte() {
        assert_eq!(header(0x0E, 1), [0xE1]);
        assert_eq!(header(0x0F, 1), [0xF1, 0x0F]);
        assert_eq!(header(0x42, 20), [0xFC, 0x42, 20]);
    }

    #[test]
    fn escape_conventions_differ() {
        assert_eq!(escape_width(0xC, SizeEscapes::Canonical), Some(1));
        assert_eq!(escape_width(0xC, SizeEscapes::Legacy), None);
        assert_eq!(escape_width(0xF, SizeEscapes::Canonical), Some(8));
        assert_eq!(escape_width(0xF, SizeEscapes::Legacy), Some(4));
        assert_eq!(escape_width(0xB, SizeEscapes::Canonical), None);
    }

    #[test]
    fn mask_is_an_involution() {
        let mut payload = *b"hello";
        mask(&mut payload);
        assert_eq!(payload, [b'h' ^ 5, b'e' ^ 6, b'l' ^ 7, b'l' ^ 8, b'o' ^ 9]);
        mask(&mut payload);
        assert_eq!(&payload, b"hello");
    }
}
