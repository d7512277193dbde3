//! Incremental framing over non-blocking byte channels.
//!
//! Every frame carries a 12-byte header:
//! - a 2-byte [`Mode`] ordinal (request, success/failure response, notify)
//! - a 2-byte body size, so bodies are at most 65535 bytes
//! - a 4-byte packet type and a 4-byte request id
//!
//! [`RawConnection`] turns a [`ByteChannel`](packetwire_transport::ByteChannel)
//! into frames and back through explicit read and write steps that never
//! block. It knows nothing about what the bodies mean.

pub mod codec;
pub mod connection;
pub mod error;
pub mod mode;
pub mod reader;
pub mod writer;

pub use codec::{decode_header, Frame, FrameConfig, FrameHeader, HEADER_SIZE, MAX_BODY_SIZE};
pub use connection::{CloseHook, RawConnection};
pub use error::{BoxError, FrameError, Result};
pub use mode::Mode;
pub use reader::{FrameReader, ReadProgress};
pub use writer::{BodyWriter, FrameWriter, OutgoingFrame};
