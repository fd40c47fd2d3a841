//! Codec module - connection text encodings.
//!
//! This module defines the seam between the write buffer and the server's
//! text encoding:
//!
//! - [`TextCodec`] - whole-value encoding plus exact length precomputation
//! - [`IncrementalEncoder`] - stateful multi-call conversion for values whose
//!   encoding exceeds the buffer
//! - [`Utf8Codec`] - the shipped implementation (backend connections are
//!   UTF-8 in practice)
//!
//! # Design
//!
//! The incremental encoder is owned by the buffer, created lazily once and
//! reset per use; it is never global state. An implementation must never emit
//! a truncated multi-byte sequence: a character that does not fit in the
//! output span is deferred whole to the next call, and when not even one
//! character fits the step reports zero progress so the caller flushes and
//! retries. Concatenating the bytes produced across any number of calls must
//! equal a one-pass encoding of the same input.

mod utf8;

pub use utf8::Utf8Codec;

/// Outcome of one incremental conversion step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Convert {
    /// Bytes of the input consumed, always on a character boundary.
    pub src_consumed: usize,
    /// Bytes written to the output span.
    pub written: usize,
    /// Whether the whole input has been converted.
    pub completed: bool,
}

/// A connection text codec.
///
/// Implementations are chosen at connection startup and shared for the
/// connection lifetime.
pub trait TextCodec: Send + Sync {
    /// Wire name of the encoding (e.g. `"UTF8"`).
    fn name(&self) -> &'static str;

    /// Exact encoded byte length of `s`.
    fn encoded_len(&self, s: &str) -> usize;

    /// Largest encoding of a single character, in bytes.
    fn max_char_len(&self) -> usize;

    /// One-pass fast path: encode all of `s` into `out`.
    ///
    /// `out` must hold at least [`encoded_len(s)`](Self::encoded_len) bytes;
    /// this is a caller contract, not re-validated per byte. Returns the
    /// number of bytes written.
    fn encode(&self, s: &str, out: &mut [u8]) -> usize;

    /// Create a fresh incremental encoder for this codec.
    fn incremental(&self) -> Box<dyn IncrementalEncoder>;
}

/// Stateful multi-call converter owned by the write buffer.
pub trait IncrementalEncoder: Send {
    /// Convert as much of `src` as fits in `out`.
    ///
    /// Consumes whole characters only. When the first unconsumed character
    /// does not fit, returns zero progress with `completed == false`,
    /// signalling the caller to flush before retrying.
    fn convert(&mut self, src: &str, out: &mut [u8]) -> Convert;

    /// Re-initialize per-use state before converting a new value.
    fn reset(&mut self);
}
