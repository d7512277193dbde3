//! Typed packets over framed connections.
//!
//! Packet kinds are grouped in a caller-defined [`PacketSet`] (usually via
//! [`packet_set!`]) and bound to wire type ids and codecs in a
//! [`PacketRegistry`]. A [`Connection`] dispatches decoded frames to a
//! [`PacketHandler`], correlates responses with the requests that caused
//! them, and fails outstanding requests when it closes.
//!
//! ```
//! use packetwire_codec::{tuple1, VarUint};
//! use packetwire_packet::{packet_set, BoxError, Connection, FnHandler, PacketRegistry, Request};
//! use packetwire_transport::duplex;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! pub struct Ping { pub message: i64 }
//! #[derive(Debug, Clone, PartialEq)]
//! pub struct Pong { pub message: i64 }
//!
//! packet_set! {
//!     #[derive(Debug, Clone, PartialEq)]
//!     pub enum Packet { Ping(Ping), Pong(Pong) }
//! }
//!
//! fn registry() -> PacketRegistry<Packet> {
//!     let mut registry = PacketRegistry::new();
//!     registry
//!         .register::<Ping, _>(0, tuple1(VarUint, |p: &Ping| &p.message, |message| Ping { message }))
//!         .unwrap()
//!         .register::<Pong, _>(1, tuple1(VarUint, |p: &Pong| &p.message, |message| Pong { message }))
//!         .unwrap();
//!     registry
//! }
//!
//! let (mut a, mut b) = duplex();
//! let client = Connection::new(
//!     registry(),
//!     FnHandler(|_: &Request<Packet>| -> Result<(), BoxError> { Ok(()) }),
//! );
//! let server = Connection::new(
//!     registry(),
//!     FnHandler(|request: &Request<Packet>| -> Result<(), BoxError> {
//!         let ping = request.packet_as::<Ping>().ok_or("not a ping")?;
//!         request.respond_success(Pong { message: ping.message })?;
//!         Ok(())
//!     }),
//! );
//!
//! let mut response = client.queue_request(Ping { message: 42 }).unwrap();
//! while client.write_step(&mut a).unwrap() {}
//! while server.read_step(&mut b).unwrap() {}
//! while server.write_step(&mut b).unwrap() {}
//! while client.read_step(&mut a).unwrap() {}
//!
//! assert_eq!(response.try_take(), Some(Ok(Packet::Pong(Pong { message: 42 }))));
//! ```

pub mod connection;
pub mod error;
pub mod handler;
pub mod registry;
pub mod request;
pub mod response;
pub mod set;

pub use connection::Connection;
pub use error::{PacketError, RequestError, Result};
pub use handler::{unknown_packet_message, FnHandler, PacketHandler, UnknownPacketAction};
pub use registry::PacketRegistry;
pub use request::Request;
pub use response::{expect_kind, ResponseFuture};
pub use set::{kind_of, PacketSet, PacketVariant};

pub use packetwire_frame::{BoxError, FrameConfig, FrameError, Mode};
