//! Bplist object-record marker bytes.
//!
//! The high nibble selects the record kind. For most kinds the low nibble
//! is an inline length, with `0xF` meaning the length follows as an
//! integer record.

/// Document magic.
pub const MAGIC: &[u8; 8] = b"bplist00";

/// Seconds from the Unix epoch to 2001-01-01T00:00:00Z, the bplist epoch.
pub const APPLE_EPOCH_OFFSET: i64 = 978_307_200;

// Singletons
pub const NULL: u8 = 0x00;
pub const FALSE: u8 = 0x08;
pub const TRUE: u8 = 0x09;

// Integers: low nibble is log2 of the byte width (0..=4)
pub const INT: u8 = 0x10;
pub const INT_8: u8 = 0x10;
pub const INT_16: u8 = 0x11;
pub const INT_32: u8 = 0x12;
pub const INT_64: u8 = 0x13;
pub const INT_128: u8 = 0x14;

// Reals: low nibble is log2 of the byte width (2 or 3)
pub const REAL: u8 = 0x20;
pub const REAL_32: u8 = 0x22;
pub const REAL_64: u8 = 0x23;

/// Always an 8-byte float.
pub const DATE: u8 = 0x33;

pub const DATA: u8 = 0x40;
pub const ASCII_STRING: u8 = 0x50;
/// Length counts UTF-16 code units.
pub const UTF16_STRING: u8 = 0x60;
/// Low nibble is the byte width minus one.
pub const UID: u8 = 0x80;
pub const ARRAY: u8 = 0xA0;
pub const SET: u8 = 0xC0;
pub const DICT: u8 = 0xD0;

/// Low nibble meaning "length follows as an integer record".
pub const LENGTH_FOLLOWS: u8 = 0x0F;

/// Whether the high nibble of `marker` belongs to a built-in record kind.
pub fn is_builtin(marker: u8) -> bool {
    matches!(
        marker & 0xF0,
        NULL | INT | REAL | 0x30 | DATA | ASCII_STRING | UTF16_STRING | UID | ARRAY | SET | DICT
    )
}

/// Smallest of 1/2/4/8 bytes that can hold `value`.
pub fn width_for(value: u64) -> u8 {
    if value <= u64::from(u8::MAX) {
        1
    } else if value <= u64::from(u16::MAX) {
        2
    } else if value <= u64::from(u32::MAX) {
        4
    } else {
        8
    }
}

/// Whether `width` is a valid offset or reference width.
pub fn is_valid_width(width: u8) -> bool {
    matches!(width, 1 | 2 | 4 | 8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_kinds() {
        assert!(is_builtin(TRUE));
        assert!(is_builtin(DATE));
        assert!(is_builtin(0xDF));
        assert!(!is_builtin(0x70));
        assert!(!is_builtin(0x90));
        assert!(!is_builtin(0xB0));
        assert!(!is_builtin(0xE0));
        assert!(!is_builtin(0xF0));
    }

    #[test]
    fn widths() {
        assert_eq!(width_for(0), 1);
        assert_eq!(width_for(255), 1);
        assert_eq!(width_for(256), 2);
        assert_eq!(width_for(70_000), 4);
        assert_eq!(width_for(u64::from(u32::MAX) + 1), 8);
        assert!(is_valid_width(4));
        assert!(!is_valid_width(3));
        assert!(!is_valid_width(0));
    }
}
