//! Protocol module - framing constants for the write side.
//!
//! The backend protocol is message-oriented: `[tag][length][body]`. Bulk
//! data transfer additionally wraps buffered bytes in the streaming envelope
//! defined in [`envelope`].

pub mod envelope;
