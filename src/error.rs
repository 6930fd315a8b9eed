//! Error types for the value model and its codecs.

use crate::format::FormatId;
use crate::types::Kind;

/// Errors that can occur while building, encoding or decoding values.
#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    #[error("malformed input: {0}")]
    Malformed(String),

    #[error("{format} cannot encode or decode {kind} values")]
    UnsupportedKind { format: FormatId, kind: Kind },

    #[error("unrecognized format")]
    UnknownFormat,

    #[error("format not registered: {0}")]
    FormatNotRegistered(FormatId),

    #[error("registry error: {0}")]
    Registry(String),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("invariant violation: {0}")]
    Invariant(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ObjectError {
    /// Shorthand for a `Malformed` error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    /// Whether the error came from the input bytes rather than the caller.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_) | Self::ResourceExhausted(_))
    }
}
