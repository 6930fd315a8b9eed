//! Reads whole documents from an async byte stream.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::ObjectError;
use crate::format::{FormatId, Registry};
use crate::types::Value;

const READ_CHUNK: usize = 8 * 1024;

/// Reads a document to end of stream, then decodes it through a
/// [`Registry`].
///
/// Documents larger than the registry's
/// [`document_size_limit`](crate::config::CodecConfig::document_size_limit)
/// are rejected without being decoded.
pub struct DocumentReader<R> {
    reader: R,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> DocumentReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: BytesMut::with_capacity(READ_CHUNK),
        }
    }

    /// Reads the raw document bytes.
    pub async fn read_document(&mut self, limit: usize) -> Result<&[u8], ObjectError> {
        self.buf.clear();
        loop {
            self.buf.reserve(READ_CHUNK);
            let n = self.reader.read_buf(&mut self.buf).await?;
            if self.buf.len() > limit {
                return Err(ObjectError::ResourceExhausted(format!(
                    "document larger than {limit} bytes"
                )));
            }
            if n == 0 {
                break;
            }
        }
        tracing::trace!(len = self.buf.len(), "read document");
        Ok(&self.buf)
    }

    /// Reads a document and decodes it with format detection.
    pub async fn read_auto(&mut self, registry: &Registry) -> Result<Value, ObjectError> {
        let limit = registry.config().document_size_limit();
        let data = self.read_document(limit).await?;
        registry.read_auto(data)
    }

    /// Reads a document and decodes it as format `id`.
    pub async fn read(&mut self, registry: &Registry, id: FormatId) -> Result<Value, ObjectError> {
        let limit = registry.config().document_size_limit();
        let data = self.read_document(limit).await?;
        registry.read(data, id)
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}
