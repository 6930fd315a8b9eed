//! Codec configuration shared by every reader and writer of a registry.

/// Default container nesting limit.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Default size limit for documents read from an async stream (64 MiB).
pub const DEFAULT_MAX_DOCUMENT_SIZE: usize = 64 * 1024 * 1024;

/// How the TBO reader interprets the low-nibble length escapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeEscapes {
    /// `0xC/0xD/0xE/0xF` select a 1/2/4/8-byte length; `0..=0xB` are inline.
    /// This is what the writer always emits.
    #[default]
    Canonical,
    /// `0xD/0xE/0xF` select a 1/2/4-byte length; `0..=0xC` are inline.
    /// Accepts files produced by the older encoder.
    Legacy,
}

/// Limits and wire options for encoding and decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecConfig {
    max_depth: usize,
    max_objects: Option<usize>,
    size_escapes: SizeEscapes,
    max_document_size: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_objects: None,
            size_escapes: SizeEscapes::Canonical,
            max_document_size: DEFAULT_MAX_DOCUMENT_SIZE,
        }
    }
}

impl CodecConfig {
    /// Sets the maximum container nesting depth.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Caps the number of distinct objects a single decode may produce.
    pub fn max_objects(mut self, limit: usize) -> Self {
        self.max_objects = Some(limit);
        self
    }

    /// Selects the TBO length-escape convention used when reading.
    pub fn size_escapes(mut self, escapes: SizeEscapes) -> Self {
        self.size_escapes = escapes;
        self
    }

    /// Sets the size limit for documents read from a stream.
    pub fn max_document_size(mut self, limit: usize) -> Self {
        self.max_document_size = limit;
        self
    }

    pub fn depth_limit(&self) -> usize {
        self.max_depth
    }

    pub fn object_limit(&self) -> Option<usize> {
        self.max_objects
    }

    pub fn escapes(&self) -> SizeEscapes {
        self.size_escapes
    }

    pub fn document_size_limit(&self) -> usize {
        self.max_document_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CodecConfig::default();
        assert_eq!(config.depth_limit(), DEFAULT_MAX_DEPTH);
        assert_eq!(config.object_limit(), None);
        assert_eq!(config.escapes(), SizeEscapes::Canonical);
        assert_eq!(config.document_size_limit(), DEFAULT_MAX_DOCUMENT_SIZE);
    }

    #[test]
    fn builder_setters() {
        let config = CodecConfig::default()
            .max_depth(8)
            .max_objects(100)
            .size_escapes(SizeEscapes::Legacy)
            .max_document_size(1024);
        assert_eq!(config.depth_limit(), 8);
        assert_eq!(config.object_limit(), Some(100));
        assert_eq!(config.escapes(), SizeEscapes::Legacy);
        assert_eq!(config.document_size_limit(), 1024);
    }
}
