//! UTF-8 codec.
//!
//! Rust strings are already UTF-8, so whole-value encoding is a plain copy
//! and the exact encoded length is `s.len()`. The incremental encoder takes
//! the longest character-boundary prefix that fits the output span; input
//! arrives as `&str`, so a partially formed character can never be carried
//! between calls - deferring the whole character replaces the carry buffer
//! that codecs with UTF-16 input need.

use super::{Convert, IncrementalEncoder, TextCodec};

/// The UTF-8 connection codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8Codec;

impl TextCodec for Utf8Codec {
    fn name(&self) -> &'static str {
        "UTF8"
    }

    #[inline]
    fn encoded_len(&self, s: &str) -> usize {
        s.len()
    }

    #[inline]
    fn max_char_len(&self) -> usize {
        4
    }

    fn encode(&self, s: &str, out: &mut [u8]) -> usize {
        debug_assert!(out.len() >= s.len(), "fast path requires precomputed space");
        out[..s.len()].copy_from_slice(s.as_bytes());
        s.len()
    }

    fn incremental(&self) -> Box<dyn IncrementalEncoder> {
        Box::new(Utf8Encoder)
    }
}

/// Incremental UTF-8 converter.
///
/// Stateless between calls: `&str` input guarantees every call starts on a
/// character boundary, so no partial sequence ever needs to be retained.
#[derive(Debug, Default)]
pub struct Utf8Encoder;

impl IncrementalEncoder for Utf8Encoder {
    fn convert(&mut self, src: &str, out: &mut [u8]) -> Convert {
        // Longest char-boundary prefix of `src` that fits in `out`.
        let mut take = src.len().min(out.len());
        while !src.is_char_boundary(take) {
            take -= 1;
        }

        out[..take].copy_from_slice(&src.as_bytes()[..take]);

        Convert {
            src_consumed: take,
            written: take,
            completed: take == src.len(),
        }
    }

    fn reset(&mut self) {}
}
