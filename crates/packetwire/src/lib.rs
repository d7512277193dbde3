//! Typed request/response packets over framed byte channels.
//!
//! packetwire layers a declarative binary codec algebra, a 12-byte frame
//! header with request correlation, and a typed packet registry over any
//! byte channel the caller drives.
//!
//! # Crate Structure
//!
//! - [`codec`] - Composable binary encoders/decoders for packet bodies
//! - [`transport`] - Byte channel abstraction, in-memory duplex, Unix sockets
//! - [`frame`] - Frame header codec, read/write state machines, raw connection
//! - [`packet`] - Packet registry, dispatch and request/response correlation
//! - [`demo`] - Ping/pong packets used by the CLI and tests

/// Re-export codec types.
pub mod codec {
    pub use packetwire_codec::*;
}

/// Re-export transport types.
pub mod transport {
    pub use packetwire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use packetwire_frame::*;
}

/// Re-export packet types.
pub mod packet {
    pub use packetwire_packet::*;
}

pub mod demo;
