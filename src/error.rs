//! Error types for dbwire.

use thiserror::Error;

use crate::fault::FaultReason;

/// Main error type for all write-buffer operations.
#[derive(Debug, Error)]
pub enum WireError {
    /// A single write was larger than the space left in the buffer.
    ///
    /// This is a programming error in the caller: values that may exceed the
    /// buffer must go through a chunking entry point such as
    /// [`write_bytes_unbounded`](crate::WriteBuffer::write_bytes_unbounded).
    /// The cursor is left unchanged.
    #[error("write of {requested} bytes exceeds the {remaining} bytes left in the buffer")]
    SpaceExhausted {
        /// Bytes the caller tried to write.
        requested: usize,
        /// Bytes left before the write.
        remaining: usize,
    },

    /// A transport write did not complete before the configured deadline.
    #[error("timed out while writing to the backend")]
    Timeout,

    /// An externally supplied cancellation signal fired before the deadline.
    #[error("write cancelled before completion")]
    Cancelled,

    /// The transport raised an I/O error during write or flush.
    #[error("failure while writing to the backend: {0}")]
    Io(#[from] std::io::Error),

    /// A null-terminated protocol string contained a non-ASCII character.
    ///
    /// Programming error; protocol identifiers are 7-bit ASCII by contract.
    #[error("non-ASCII character {0:?} in a null-terminated protocol string")]
    NonAscii(char),

    /// The connection already broke; the first recorded fault is carried here.
    ///
    /// Returned by every operation attempted after a transport fault. The
    /// buffer must be replaced along with its connection.
    #[error("connection is broken ({reason}): {detail}")]
    Broken {
        /// Category of the first recorded fault.
        reason: FaultReason,
        /// Rendered message of the first recorded fault.
        detail: String,
    },
}

/// Result type alias using WireError.
pub type Result<T> = std::result::Result<T, WireError>;
