//! Buffered, framed writer over the backend transport.
//!
//! One [`WriteBuffer`] exists per connection. Message builders append
//! scalars, strings, and raw byte spans; the buffer accumulates them in a
//! fixed-capacity region and pushes them to the transport when full or on an
//! explicit [`flush`](WriteBuffer::flush). Two framing modes are supported:
//!
//! ```text
//! plain:      [message bytes ..................] ──► transport
//! copy mode:  [ 'd' | u32 BE length | payload ] ──► transport
//!              └── primed after every flush ──┘
//! ```
//!
//! In copy mode every flush emits one complete streaming envelope; the
//! length field is written as a placeholder when the header is primed and
//! patched just before transmission.
//!
//! The buffer performs no internal locking: exactly one logical writer
//! operates on it at a time and the owning connection serializes access.
//! Transport faults funnel through the connection's [`FaultSink`]; after the
//! first fault the buffer refuses further work.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::codec::{IncrementalEncoder, TextCodec, Utf8Codec};
use crate::error::{Result, WireError};
use crate::fault::FaultSink;
use crate::protocol::envelope;
use crate::writer::ValueWriter;

/// Smallest allowed buffer capacity.
///
/// Large enough for any fixed-size message head plus the copy-mode header;
/// builder requests below the floor are raised to it.
pub const MIN_CAPACITY: usize = 4096;

/// Default buffer capacity.
pub const DEFAULT_CAPACITY: usize = 8192;

/// Byte order for the scalar writers.
///
/// The wire default is network byte order; the little-endian form exists for
/// binary parameter formats that require it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Network byte order (the protocol default).
    Big,
    /// Reversed order for little-endian payload formats.
    Little,
}

/// Configuration for building a [`WriteBuffer`].
///
/// Use the fluent API to override capacity, codec, timeout, and the fault
/// callback, then call [`build`](Builder::build) with the transport handle.
pub struct Builder {
    capacity: usize,
    timeout: Option<Duration>,
    codec: Arc<dyn TextCodec>,
    fault: FaultSink,
}

impl Builder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            timeout: None,
            codec: Arc::new(Utf8Codec),
            fault: FaultSink::new(),
        }
    }

    /// Set the buffer capacity. Values below [`MIN_CAPACITY`] are raised to it.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(MIN_CAPACITY);
        self
    }

    /// Set the per-write deadline used by flush and the direct-write path.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the connection text codec. Default: [`Utf8Codec`].
    pub fn codec(mut self, codec: Arc<dyn TextCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Share an existing fault sink (e.g. the owning connection's).
    pub fn fault_sink(mut self, sink: FaultSink) -> Self {
        self.fault = sink;
        self
    }

    /// Install a callback invoked once when the first transport fault breaks
    /// the connection.
    pub fn on_fault<F>(mut self, callback: F) -> Self
    where
        F: Fn(crate::fault::FaultReason) + Send + Sync + 'static,
    {
        self.fault = FaultSink::with_callback(callback);
        self
    }

    /// Build the buffer around `transport`.
    ///
    /// The transport is held for the buffer's lifetime but never closed,
    /// shut down, or reconfigured; [`WriteBuffer::into_inner`] returns it
    /// untouched.
    pub fn build<W>(self, transport: W) -> WriteBuffer<W> {
        WriteBuffer {
            transport,
            store: vec![0u8; self.capacity].into_boxed_slice(),
            cursor: 0,
            usable: self.capacity,
            copy_mode: false,
            timeout: self.timeout,
            cancel: None,
            codec: self.codec,
            encoder: None,
            fault: self.fault,
            current_message: None,
        }
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("capacity", &self.capacity)
            .field("timeout", &self.timeout)
            .field("codec", &self.codec.name())
            .finish_non_exhaustive()
    }
}

/// Generates the paired default/explicit-order integer writers.
macro_rules! scalar_writers {
    ($(($write:ident, $write_ord:ident, $ty:ty)),* $(,)?) => {
        $(
            #[doc = concat!("Write an `", stringify!($ty), "` in network byte order (big-endian).")]
            ///
            /// Fails with [`WireError::SpaceExhausted`] when the value does
            /// not fit; the cursor is unchanged.
            pub fn $write(&mut self, value: $ty) -> Result<()> {
                self.$write_ord(value, ByteOrder::Big)
            }

            #[doc = concat!("Write an `", stringify!($ty), "` in an explicit byte order.")]
            pub fn $write_ord(&mut self, value: $ty, order: ByteOrder) -> Result<()> {
                let bytes = match order {
                    ByteOrder::Big => value.to_be_bytes(),
                    ByteOrder::Little => value.to_le_bytes(),
                };
                self.write_bytes(&bytes)
            }
        )*
    };
}

/// Buffered, framed writer for one backend connection.
pub struct WriteBuffer<W> {
    transport: W,
    /// Fixed-capacity byte region; length never changes after construction.
    store: Box<[u8]>,
    /// Bytes written since the last flush. Invariant: `cursor <= capacity`.
    cursor: usize,
    /// Payload space of one buffer-ful: capacity, minus the envelope header
    /// while in copy mode.
    usable: usize,
    copy_mode: bool,
    timeout: Option<Duration>,
    cancel: Option<CancellationToken>,
    codec: Arc<dyn TextCodec>,
    /// Incremental text-encoder state; created lazily, reset per use.
    encoder: Option<Box<dyn IncrementalEncoder>>,
    fault: FaultSink,
    /// Caller bookkeeping: name of the in-flight logical message.
    current_message: Option<&'static str>,
}

impl WriteBuffer<()> {
    /// Start building a buffer.
    pub fn builder() -> Builder {
        Builder::new()
    }
}

impl<W> WriteBuffer<W> {
    /// Build a buffer with default settings around `transport`.
    pub fn new(transport: W) -> Self {
        Builder::new().build(transport)
    }

    /// Total capacity of the byte store.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.store.len()
    }

    /// Payload space of one empty buffer-ful (capacity, minus the envelope
    /// header while in copy mode).
    #[inline]
    pub fn usable_capacity(&self) -> usize {
        self.usable
    }

    /// Bytes written since the last flush.
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Space left before the buffer must be flushed.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.store.len() - self.cursor
    }

    /// Whether no payload bytes are pending (the copy-mode header alone does
    /// not count).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cursor == self.flush_floor()
    }

    /// Whether the buffer is framing flushes as streaming envelopes.
    #[inline]
    pub fn is_copy_mode(&self) -> bool {
        self.copy_mode
    }

    /// The configured per-write deadline.
    #[inline]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Set the per-write deadline for subsequent flushes.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Link an external cancellation signal into subsequent flushes.
    ///
    /// Whichever of the signal and the deadline fires first aborts the wait.
    pub fn set_cancellation(&mut self, token: Option<CancellationToken>) {
        self.cancel = token;
    }

    /// Record the logical message currently being built (caller bookkeeping;
    /// cleared on flush).
    pub fn set_current_message(&mut self, name: Option<&'static str>) {
        self.current_message = name;
    }

    /// Name of the in-flight logical message, if the caller recorded one.
    pub fn current_message(&self) -> Option<&'static str> {
        self.current_message
    }

    /// The connection's fault sink.
    pub fn fault_sink(&self) -> &FaultSink {
        &self.fault
    }

    /// Borrow the transport handle.
    pub fn transport(&self) -> &W {
        &self.transport
    }

    /// Dispose of the buffer, handing the transport back untouched.
    ///
    /// The buffer owns no other releasable resource: its deadline timer is
    /// created per flush and dropped with the flush future.
    pub fn into_inner(self) -> W {
        self.transport
    }

    /// Copy of the buffered bytes `[0, cursor)`.
    ///
    /// Used to pre-generate fixed message payloads without flushing.
    pub fn snapshot(&self) -> Bytes {
        Bytes::copy_from_slice(&self.store[..self.cursor])
    }

    /// Reset the cursor unconditionally, discarding buffered bytes.
    ///
    /// In copy mode the header is gone afterwards as well; the mode
    /// transitions re-prime it.
    pub fn clear(&mut self) {
        self.cursor = 0;
    }

    /// Encoded byte length of `s` under the connection codec.
    pub(crate) fn encoded_len_of(&self, s: &str) -> usize {
        self.codec.encoded_len(s)
    }

    /// Cursor position at which a flush has nothing to transmit.
    #[inline]
    fn flush_floor(&self) -> usize {
        if self.copy_mode {
            envelope::HEADER_LEN
        } else {
            0
        }
    }

    fn ensure(&self, requested: usize) -> Result<()> {
        let remaining = self.remaining();
        if requested > remaining {
            return Err(WireError::SpaceExhausted {
                requested,
                remaining,
            });
        }
        Ok(())
    }

    /// Copy `bytes` into the store and advance the cursor.
    ///
    /// Fails with [`WireError::SpaceExhausted`] (cursor unchanged) when the
    /// span does not fit; values that may exceed the buffer go through
    /// [`write_bytes_unbounded`](Self::write_bytes_unbounded).
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.ensure(bytes.len())?;
        self.store[self.cursor..self.cursor + bytes.len()].copy_from_slice(bytes);
        self.cursor += bytes.len();
        Ok(())
    }

    scalar_writers! {
        (write_i8, write_i8_ord, i8),
        (write_u8, write_u8_ord, u8),
        (write_i16, write_i16_ord, i16),
        (write_u16, write_u16_ord, u16),
        (write_i32, write_i32_ord, i32),
        (write_u32, write_u32_ord, u32),
        (write_i64, write_i64_ord, i64),
        (write_u64, write_u64_ord, u64),
    }

    /// Write an `f32` in network byte order.
    ///
    /// Floats travel as the integer carrying their bit pattern; there is no
    /// float-specific byte logic.
    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write_u32(value.to_bits())
    }

    /// Write an `f32` in an explicit byte order.
    pub fn write_f32_ord(&mut self, value: f32, order: ByteOrder) -> Result<()> {
        self.write_u32_ord(value.to_bits(), order)
    }

    /// Write an `f64` in network byte order.
    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.write_u64(value.to_bits())
    }

    /// Write an `f64` in an explicit byte order.
    pub fn write_f64_ord(&mut self, value: f64, order: ByteOrder) -> Result<()> {
        self.write_u64_ord(value.to_bits(), order)
    }

    /// Encode `s` with the connection codec; the whole value must fit.
    ///
    /// Computes the encoded length first; use
    /// [`write_str_with_len`](Self::write_str_with_len) when the caller has
    /// it precomputed for message sizing.
    pub fn write_str(&mut self, s: &str) -> Result<()> {
        let encoded_len = self.codec.encoded_len(s);
        self.write_str_with_len(s, encoded_len)
    }

    /// Fast-path string write with a precomputed encoded length.
    pub fn write_str_with_len(&mut self, s: &str, encoded_len: usize) -> Result<()> {
        self.ensure(encoded_len)?;
        let codec = Arc::clone(&self.codec);
        let written = codec.encode(s, &mut self.store[self.cursor..self.cursor + encoded_len]);
        debug_assert_eq!(written, encoded_len, "codec wrote a different length");
        self.cursor += written;
        Ok(())
    }

    /// Write a null-terminated ASCII protocol string.
    ///
    /// Every character must be 7-bit ASCII; a violation is a caller
    /// programming error reported as [`WireError::NonAscii`]. Requires
    /// `s.len() + 1` bytes of space.
    pub fn write_cstr(&mut self, s: &str) -> Result<()> {
        if let Some(c) = s.chars().find(|c| !c.is_ascii()) {
            return Err(WireError::NonAscii(c));
        }
        self.ensure(s.len() + 1)?;
        self.store[self.cursor..self.cursor + s.len()].copy_from_slice(s.as_bytes());
        self.cursor += s.len();
        self.store[self.cursor] = 0;
        self.cursor += 1;
        Ok(())
    }

    /// Switch flushes to streaming-envelope framing.
    ///
    /// Requires an empty (flushed) buffer. Reserves the 5 header bytes,
    /// primes the tag and length placeholder at `[0, 5)`, and leaves the
    /// cursor at 5.
    pub fn enter_copy_mode(&mut self) {
        debug_assert!(!self.copy_mode, "already in copy mode");
        debug_assert_eq!(self.cursor, 0, "enter_copy_mode requires a flushed buffer");
        self.copy_mode = true;
        self.usable = self.store.len() - envelope::HEADER_LEN;
        envelope::prime(&mut self.store[..envelope::HEADER_LEN]);
        self.cursor = envelope::HEADER_LEN;
        tracing::debug!("entered copy mode");
    }

    /// Return to plain framing.
    ///
    /// The caller is expected to have flushed the final envelope; any
    /// unflushed header-only state is discarded.
    pub fn exit_copy_mode(&mut self) {
        debug_assert!(self.copy_mode, "not in copy mode");
        debug_assert!(
            self.cursor <= envelope::HEADER_LEN,
            "exit_copy_mode with unflushed payload"
        );
        self.copy_mode = false;
        self.usable = self.store.len();
        self.cursor = 0;
        tracing::debug!("exited copy mode");
    }
}

impl<W: AsyncWrite + Unpin> WriteBuffer<W> {
    /// Transmit the buffered bytes and reset the cursor.
    ///
    /// No transport call is issued when nothing is pending (plain mode:
    /// cursor 0; copy mode: header only). In copy mode the length
    /// placeholder is patched to `cursor - 1` before transmission, and the
    /// header is re-primed afterwards so the buffer is ready for the next
    /// envelope. The whole transport write is bounded by the configured
    /// deadline and the linked cancellation signal; on failure the fault is
    /// reported to the connection and the buffer becomes unusable.
    pub async fn flush(&mut self) -> Result<()> {
        if let Some(broken) = self.fault.broken_error() {
            return Err(broken);
        }
        if self.cursor == self.flush_floor() {
            return Ok(());
        }

        if self.copy_mode {
            // Payload plus the length field itself, excluding the tag byte.
            envelope::patch_length(
                &mut self.store[..envelope::HEADER_LEN],
                self.cursor - envelope::HEADER_LEN,
            );
        }

        let outcome = Self::transmit(
            &mut self.transport,
            &self.store[..self.cursor],
            self.timeout,
            self.cancel.as_ref(),
        )
        .await;

        match outcome {
            Ok(()) => {
                tracing::trace!(
                    bytes = self.cursor,
                    copy_mode = self.copy_mode,
                    "flushed buffer"
                );
                self.cursor = 0;
                self.current_message = None;
                if self.copy_mode {
                    envelope::prime(&mut self.store[..envelope::HEADER_LEN]);
                    self.cursor = envelope::HEADER_LEN;
                }
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, "flush failed, reporting connection as broken");
                Err(self.fault.report(err))
            }
        }
    }

    /// Write a byte span of any length, flushing as needed.
    ///
    /// If the span fits the remaining space it is buffered outright; if it
    /// fits an empty buffer, one flush makes room; otherwise the span is
    /// written in buffer-sized chunks. For a span of length `L` over
    /// capacity `C` (`L > C`) the total flush count, including the caller's
    /// trailing flush, is `ceil(L / C)`.
    pub async fn write_bytes_unbounded(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() <= self.remaining() {
            return self.write_bytes(bytes);
        }
        if bytes.len() <= self.usable {
            self.flush().await?;
            return self.write_bytes(bytes);
        }

        let mut rest = bytes;
        while !rest.is_empty() {
            if self.remaining() == 0 {
                self.flush().await?;
            }
            let take = self.remaining().min(rest.len());
            self.write_bytes(&rest[..take])?;
            rest = &rest[take..];
        }
        Ok(())
    }

    /// Write a string of any encoded length, flushing as needed.
    ///
    /// Tiers mirror [`write_bytes_unbounded`](Self::write_bytes_unbounded);
    /// values larger than one buffer-ful go through the codec's incremental
    /// encoder, which never splits a character's encoding across a flush
    /// boundary. Concatenating the flushed segments equals a one-pass
    /// encoding of the input.
    pub async fn write_str_unbounded(&mut self, s: &str) -> Result<()> {
        let encoded_len = self.codec.encoded_len(s);
        if encoded_len <= self.remaining() {
            return self.write_str_with_len(s, encoded_len);
        }
        if encoded_len <= self.usable {
            self.flush().await?;
            return self.write_str_with_len(s, encoded_len);
        }

        let mut encoder = self
            .encoder
            .take()
            .unwrap_or_else(|| self.codec.incremental());
        encoder.reset();

        let mut offset = 0;
        loop {
            let step = encoder.convert(&s[offset..], &mut self.store[self.cursor..]);
            self.cursor += step.written;
            offset += step.src_consumed;
            if step.completed {
                break;
            }
            self.flush().await?;
        }

        self.encoder = Some(encoder);
        Ok(())
    }

    /// Transmit a large externally-owned span without copying it into the
    /// store.
    ///
    /// Pending buffered content is flushed first. In copy mode the primed
    /// header's placeholder is rewritten to `data.len() + 4` and the 5
    /// header bytes travel through the ordinary flush path before the data
    /// itself is sent; copy framing is dropped and re-established around
    /// that header flush. This sequence is a non-reentrant critical section:
    /// it must not be interleaved with another write or a copy-mode toggle
    /// on the same buffer.
    pub async fn direct_write(&mut self, data: &[u8]) -> Result<()> {
        self.flush().await?;

        if self.copy_mode {
            self.copy_mode = false;
            self.usable = self.store.len();
            envelope::patch_length(&mut self.store[..envelope::HEADER_LEN], data.len());
            self.cursor = envelope::HEADER_LEN;
            self.flush().await?;
            self.enter_copy_mode();
        } else {
            debug_assert_eq!(self.cursor, 0, "direct write over a non-empty buffer");
        }

        let outcome = Self::transmit(
            &mut self.transport,
            data,
            self.timeout,
            self.cancel.as_ref(),
        )
        .await;

        match outcome {
            Ok(()) => {
                tracing::trace!(bytes = data.len(), "direct write completed");
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, "direct write failed, reporting connection as broken");
                Err(self.fault.report(err))
            }
        }
    }

    /// Begin writing one large value progressively through this buffer.
    ///
    /// The handle borrows the buffer exclusively for its duration; call
    /// [`finish`](ValueWriter::finish) to end the scope.
    pub fn value_writer(&mut self) -> ValueWriter<'_, W> {
        ValueWriter::new(self)
    }

    /// Drive one bounded transport write: the deadline and the external
    /// cancellation signal are linked, and whichever fires first ends the
    /// wait. The deadline timer is created here per call and disarmed by
    /// drop on success; a fired timer is simply not reused.
    async fn transmit(
        transport: &mut W,
        bytes: &[u8],
        timeout: Option<Duration>,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        let io = async {
            transport.write_all(bytes).await?;
            transport.flush().await
        };
        tokio::pin!(io);

        let cancelled = async {
            match cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let deadline = async {
            match timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(WireError::Cancelled),
            _ = deadline => Err(WireError::Timeout),
            result = &mut io => result.map_err(WireError::Io),
        }
    }
}

impl<W> fmt::Debug for WriteBuffer<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteBuffer")
            .field("capacity", &self.store.len())
            .field("cursor", &self.cursor)
            .field("copy_mode", &self.copy_mode)
            .field("timeout", &self.timeout)
            .field("codec", &self.codec.name())
            .field("broken", &self.fault.is_broken())
            .finish_non_exhaustive()
    }
}
