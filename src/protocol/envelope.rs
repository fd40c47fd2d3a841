//! Streaming-envelope framing for bulk data transfer.
//!
//! Implements the 5-byte envelope header:
//! ```text
//! ┌───────┬──────────┬─────────┐
//! │ Tag   │ Length   │ Payload │
//! │ 1 byte│ 4 bytes  │ N bytes │
//! │ 'd'   │ u32 BE   │         │
//! └───────┴──────────┴─────────┘
//! ```
//!
//! The length field counts itself but not the tag byte, so
//! `length = payload + 4`. While the buffer is in copy mode the header is
//! primed with a zeroed placeholder immediately after every flush and patched
//! with the real length just before the next one.

/// Tag byte of a streaming data envelope.
pub const COPY_DATA_TAG: u8 = b'd';

/// Envelope header size in bytes (tag + length).
pub const HEADER_LEN: usize = 5;

/// Size of the length field, included in its own count.
pub const LENGTH_FIELD_LEN: usize = 4;

/// Prime `header` with the tag and a zeroed length placeholder.
///
/// # Panics
///
/// Panics if `header` is shorter than [`HEADER_LEN`].
pub fn prime(header: &mut [u8]) {
    header[0] = COPY_DATA_TAG;
    header[1..HEADER_LEN].fill(0);
}

/// Overwrite the length placeholder with the real payload length.
///
/// `payload_len` excludes the header; the stored value is
/// `payload_len + 4` (the length field counts itself).
pub fn patch_length(header: &mut [u8], payload_len: usize) {
    debug_assert_eq!(header[0], COPY_DATA_TAG, "header not primed");
    let length = payload_len as u32 + LENGTH_FIELD_LEN as u32;
    header[1..HEADER_LEN].copy_from_slice(&length.to_be_bytes());
}

/// Build a complete header for a payload of known length.
pub fn header(payload_len: usize) -> [u8; HEADER_LEN] {
    let mut buf = [0u8; HEADER_LEN];
    prime(&mut buf);
    patch_length(&mut buf, payload_len);
    buf
}
