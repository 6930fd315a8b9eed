//! Writes whole documents to an async byte stream.

use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::ObjectError;
use crate::format::{FormatId, Registry};
use crate::types::Value;

/// Encodes documents through a [`Registry`] and writes them to an
/// `AsyncWrite` stream.
///
/// Each document is encoded into a buffer first and only written once
/// encoding has succeeded, so a failed encode leaves the stream untouched.
pub struct DocumentWriter<W> {
    writer: W,
    buf: BytesMut,
}

impl<W: AsyncWrite + Unpin> DocumentWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            buf: BytesMut::new(),
        }
    }

    /// Encodes `value` as format `id`, writes it and flushes. Returns the
    /// number of bytes written.
    pub async fn write(
        &mut self,
        registry: &Registry,
        value: &Value,
        id: FormatId,
    ) -> Result<usize, ObjectError> {
        self.buf.clear();
        let n = registry.write(value, &mut self.buf, id)?;
        self.writer.write_all(&self.buf).await?;
        self.writer.flush().await?;
        tracing::trace!(format = %id, len = n, "wrote document");
        Ok(n)
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
