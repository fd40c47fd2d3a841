//! # dbwire
//!
//! Write-side wire buffer for PostgreSQL-style database connections.
//!
//! This crate sits between message builders that know the protocol's message
//! semantics and the raw byte transport of a backend connection. It owns the
//! outgoing byte path:
//!
//! - **Buffered writes**: scalars, strings, and raw spans accumulate in a
//!   fixed-capacity buffer and hit the transport on flush.
//! - **Two framing modes**: plain messages, or copy mode where every flush
//!   emits one `[tag][length][payload]` streaming envelope.
//! - **Oversized values**: chunked byte and string writes that span many
//!   buffer-fuls without splitting a character encoding across a flush.
//! - **Fault funnel**: timeouts, cancellation, and I/O failures all collapse
//!   into a single idempotent "connection broken" transition.
//!
//! ## Architecture
//!
//! ```text
//! Message builders ──► WriteBuffer ──► AsyncWrite transport
//!                        │  fixed store + cursor
//!                        │  scalar / string / span writers
//!                        │  flush engine (deadline + cancellation)
//!                        └─ FaultSink ──► owning connection
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use dbwire::WriteBuffer;
//!
//! let mut buf = WriteBuffer::builder()
//!     .capacity(16 * 1024)
//!     .timeout(std::time::Duration::from_secs(30))
//!     .build(stream);
//!
//! // One protocol message: tag, length, null-terminated body.
//! buf.write_u8(b'Q')?;
//! buf.write_i32((4 + sql.len() + 1) as i32)?;
//! buf.write_cstr(sql)?;
//! buf.flush().await?;
//! ```

pub mod blocking;
pub mod codec;
pub mod error;
pub mod fault;
pub mod protocol;

mod buffer;
mod writer;

pub use buffer::{Builder, ByteOrder, WriteBuffer, DEFAULT_CAPACITY, MIN_CAPACITY};
pub use error::{Result, WireError};
pub use fault::{FaultReason, FaultSink};
pub use writer::ValueWriter;
