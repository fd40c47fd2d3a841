//! Blocking execution mode.
//!
//! The flush engine and the multi-segment write paths are async at the core;
//! blocking mode is the synchronous facade over them, the same shape the
//! ecosystem's synchronous database clients take over their async drivers. A
//! [`BlockingWriteBuffer`] owns a private current-thread runtime and drives
//! each suspending operation to completion with `block_on`, occupying the
//! calling thread for the duration of the transport write. The configured
//! deadline doubles as the transport send-timeout.

use std::io;

use tokio::io::AsyncWrite;
use tokio::runtime::Runtime;

use crate::buffer::WriteBuffer;
use crate::error::Result;

/// Synchronous facade over a [`WriteBuffer`].
#[derive(Debug)]
pub struct BlockingWriteBuffer<W> {
    runtime: Runtime,
    inner: WriteBuffer<W>,
}

impl<W: AsyncWrite + Unpin> BlockingWriteBuffer<W> {
    /// Wrap an async buffer in a blocking facade.
    ///
    /// Must not be called from within an async runtime.
    pub fn new(inner: WriteBuffer<W>) -> io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self { runtime, inner })
    }

    /// Blocking [`WriteBuffer::flush`].
    pub fn flush(&mut self) -> Result<()> {
        let Self { runtime, inner } = self;
        runtime.block_on(inner.flush())
    }

    /// Blocking [`WriteBuffer::write_bytes_unbounded`].
    pub fn write_bytes_unbounded(&mut self, bytes: &[u8]) -> Result<()> {
        let Self { runtime, inner } = self;
        runtime.block_on(inner.write_bytes_unbounded(bytes))
    }

    /// Blocking [`WriteBuffer::write_str_unbounded`].
    pub fn write_str_unbounded(&mut self, s: &str) -> Result<()> {
        let Self { runtime, inner } = self;
        runtime.block_on(inner.write_str_unbounded(s))
    }

    /// Blocking [`WriteBuffer::direct_write`].
    pub fn direct_write(&mut self, data: &[u8]) -> Result<()> {
        let Self { runtime, inner } = self;
        runtime.block_on(inner.direct_write(data))
    }

    /// Access the underlying buffer for the non-suspending operations
    /// (scalar writers, bounded spans, mode transitions, configuration).
    pub fn buffer(&mut self) -> &mut WriteBuffer<W> {
        &mut self.inner
    }

    /// Release the facade, handing the async buffer back.
    pub fn into_inner(self) -> WriteBuffer<W> {
        self.inner
    }
}
