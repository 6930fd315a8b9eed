//! The value object model.

mod number;
mod value;

pub use number::{Number, NumberType};
pub use value::{Entries, Kind, UserObject, Value};

/// Type tags identifying value kinds on the TBO wire.
pub mod tag {
    /// Not a value: the size field is an object-table index.
    pub const BACKREF: u8 = 0;
    pub const DATA: u8 = 1;
    pub const DATE: u8 = 2;
    pub const ARRAY: u8 = 3;
    pub const STRING: u8 = 4;
    pub const NUMBER: u8 = 5;
    pub const BOOLEAN: u8 = 6;
    pub const DICTIONARY: u8 = 7;
    pub const NULL: u8 = 8;
    /// First tag available to caller-registered kinds.
    pub const USER: u8 = 9;

    /// Whether `tag` is handled by the built-in codecs.
    pub fn is_builtin(tag: u8) -> bool {
        tag < USER
    }
}
