//! Scoped handle for writing one large value through the buffer.
//!
//! A [`ValueWriter`] lets a caller stream a single oversized value (a bulk
//! parameter, a copy-mode row batch) into the connection buffer without
//! holding raw buffer internals. It borrows the [`WriteBuffer`] exclusively
//! for its duration, so the type system rules out interleaved independent
//! writes; obtain one with
//! [`WriteBuffer::value_writer`](crate::WriteBuffer::value_writer) (begin)
//! and call [`finish`](ValueWriter::finish) (end) when the value is done.
//!
//! Chunks may trigger any number of intermediate flushes; the value is
//! atomic from the caller's perspective - either every chunk reaches the
//! wire in order or a fault aborts the whole operation.

use tokio::io::AsyncWrite;

use crate::buffer::WriteBuffer;
use crate::error::Result;

/// Exclusive, single-use view over a [`WriteBuffer`] for one large value.
#[derive(Debug)]
pub struct ValueWriter<'a, W> {
    buffer: &'a mut WriteBuffer<W>,
    written: usize,
}

impl<'a, W: AsyncWrite + Unpin> ValueWriter<'a, W> {
    pub(crate) fn new(buffer: &'a mut WriteBuffer<W>) -> Self {
        Self { buffer, written: 0 }
    }

    /// Append a chunk of the value, flushing through the buffer as needed.
    pub async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        self.buffer.write_bytes_unbounded(chunk).await?;
        self.written += chunk.len();
        Ok(())
    }

    /// Append a text chunk encoded with the connection codec.
    pub async fn write_str(&mut self, chunk: &str) -> Result<()> {
        let encoded = self.buffer.encoded_len_of(chunk);
        self.buffer.write_str_unbounded(chunk).await?;
        self.written += encoded;
        Ok(())
    }

    /// Total bytes accepted through this handle so far.
    pub fn bytes_written(&self) -> usize {
        self.written
    }

    /// End the scope, releasing the buffer for independent use.
    ///
    /// Returns the total number of bytes accepted. Buffered tail bytes are
    /// left for the caller's next flush.
    pub fn finish(self) -> usize {
        self.written
    }
}
