//! Pluggable wire formats for the value model.
//!
//! A format is a [`Reader`]/[`Writer`] pair installed in a [`Registry`]
//! under a [`FormatId`]. Readers expose a cheap `probe` so the registry can
//! pick a format from a document's leading bytes.

mod hooks;
mod registry;

use std::fmt;

use bytes::BytesMut;

pub use hooks::{DecodeContext, DecodeHook, EncodeContext, EncodeHook, Hooks};
pub use registry::{PROBE_PREFIX, Registry};

use crate::config::CodecConfig;
use crate::error::ObjectError;
use crate::types::Value;

/// Identifies a wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatId {
    /// The compact TBO binary format.
    Bin,
    /// Apple's binary property list format.
    Bplist,
    Json,
    Xml,
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bin => write!(f, "bin"),
            Self::Bplist => write!(f, "bplist"),
            Self::Json => write!(f, "json"),
            Self::Xml => write!(f, "xml"),
        }
    }
}

/// What a reader or writer gets from the registry for one call.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub config: &'a CodecConfig,
    pub hooks: &'a Hooks,
}

/// Decodes a complete document into a value.
pub trait Reader: Send + Sync {
    /// Scores how likely `prefix` (at most [`PROBE_PREFIX`] bytes) starts a
    /// document in this format. Zero means "not this format". Never fails.
    fn probe(&self, prefix: &[u8]) -> u32;

    /// Decodes `data`. Either the whole document decodes or nothing does.
    fn read(&self, data: &[u8], cx: Context<'_>) -> Result<Value, ObjectError>;

    /// Whether a decode hook may be installed for wire tag `tag`.
    fn accepts_hook(&self, _tag: u8) -> bool {
        false
    }
}

/// Encodes a value, appending to a buffer.
pub trait Writer: Send + Sync {
    /// Appends the encoding of `value` to `buf` and returns the byte count.
    ///
    /// On error an unspecified prefix may already have been appended.
    fn write(&self, buf: &mut BytesMut, value: &Value, cx: Context<'_>)
    -> Result<usize, ObjectError>;

    /// Whether an encode hook may be installed for user kind tag `tag`.
    fn accepts_hook(&self, _tag: u8) -> bool {
        false
    }
}
