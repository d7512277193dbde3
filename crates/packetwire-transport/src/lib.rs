//! Non-blocking byte channels.
//!
//! The frame and packet layers never touch sockets directly. They are driven
//! through [`ByteChannel`], a read/write pair that always returns immediately.
//! This crate provides:
//! - [`MemoryChannel`], an in-memory duplex pair for tests and demos
//! - [`NonBlocking`], an adapter over any non-blocking `Read + Write` stream
//! - [`UnixDomainSocket`] bootstrap for local sockets (Unix only)

pub mod channel;
pub mod error;
pub mod memory;
pub mod stream;

#[cfg(unix)]
pub mod uds;

pub use channel::{ByteChannel, NonBlocking, ReadOutcome};
pub use error::{Result, TransportError};
pub use memory::{duplex, MemoryChannel};
pub use stream::IpcStream;

#[cfg(unix)]
pub use uds::UnixDomainSocket;
