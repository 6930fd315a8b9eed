//! Explicitly-typed numbers.

use std::fmt;

/// The numeric type carried by a [`Number`].
///
/// Discriminants are the wire numbering used by the TBO format.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberType {
    U8 = 1,
    I8 = 2,
    U16 = 3,
    I16 = 4,
    U32 = 5,
    I32 = 6,
    U64 = 7,
    I64 = 8,
    F32 = 9,
    F64 = 10,
}

impl NumberType {
    /// Looks up a number type by its wire tag.
    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            1 => Self::U8,
            2 => Self::I8,
            3 => Self::U16,
            4 => Self::I16,
            5 => Self::U32,
            6 => Self::I32,
            7 => Self::U64,
            8 => Self::I64,
            9 => Self::F32,
            10 => Self::F64,
            _ => return None,
        })
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Payload width in bytes.
    pub fn width(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }
}

/// A number whose storage type is explicit rather than inferred at use time.
///
/// Equality compares numeric values, so `U8(3) == I64(3)`.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Number {
    pub fn number_type(&self) -> NumberType {
        match self {
            Self::U8(_) => NumberType::U8,
            Self::I8(_) => NumberType::I8,
            Self::U16(_) => NumberType::U16,
            Self::I16(_) => NumberType::I16,
            Self::U32(_) => NumberType::U32,
            Self::I32(_) => NumberType::I32,
            Self::U64(_) => NumberType::U64,
            Self::I64(_) => NumberType::I64,
            Self::F32(_) => NumberType::F32,
            Self::F64(_) => NumberType::F64,
        }
    }

    /// The zero value of the given type.
    pub fn zero(ty: NumberType) -> Self {
        match ty {
            NumberType::U8 => Self::U8(0),
            NumberType::I8 => Self::I8(0),
            NumberType::U16 => Self::U16(0),
            NumberType::I16 => Self::I16(0),
            NumberType::U32 => Self::U32(0),
            NumberType::I32 => Self::I32(0),
            NumberType::U64 => Self::U64(0),
            NumberType::I64 => Self::I64(0),
            NumberType::F32 => Self::F32(0.0),
            NumberType::F64 => Self::F64(0.0),
        }
    }

    /// Integer value widened to `i128`; `None` for floats.
    fn integer(&self) -> Option<i128> {
        match *self {
            Self::U8(v) => Some(i128::from(v)),
            Self::I8(v) => Some(i128::from(v)),
            Self::U16(v) => Some(i128::from(v)),
            Self::I16(v) => Some(i128::from(v)),
            Self::U32(v) => Some(i128::from(v)),
            Self::I32(v) => Some(i128::from(v)),
            Self::U64(v) => Some(i128::from(v)),
            Self::I64(v) => Some(i128::from(v)),
            Self::F32(_) | Self::F64(_) => None,
        }
    }

    /// Returns the value as a `u64` if it is a non-negative integer.
    pub fn as_u64(&self) -> Option<u64> {
        self.integer().and_then(|v| u64::try_from(v).ok())
    }

    /// Returns the value as an `i64` if it is an integer that fits.
    pub fn as_i64(&self) -> Option<i64> {
        self.integer().and_then(|v| i64::try_from(v).ok())
    }

    /// Returns the value as an `f64`, rounding large integers.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::F32(v) => f64::from(v),
            Self::F64(v) => v,
            Self::U64(v) => v as f64,
            Self::I64(v) => v as f64,
            _ => self.integer().map_or(0.0, |v| v as f64),
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self.integer(), other.integer()) {
            (Some(a), Some(b)) => a == b,
            _ => self.as_f64() == other.as_f64(),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U8(v) => write!(f, "{v}"),
            Self::I8(v) => write!(f, "{v}"),
            Self::U16(v) => write!(f, "{v}"),
            Self::I16(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
        }
    }
}

macro_rules! number_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Number {
                fn from(v: $ty) -> Self {
                    Self::$variant(v)
                }
            }
        )*
    };
}

number_from! {
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    u64 => U64,
    i64 => I64,
    f32 => F32,
    f64 => F64,
}
