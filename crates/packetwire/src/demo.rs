//! Ping/pong packet set spoken by `packetwire serve` and `packetwire ping`.

use std::sync::atomic::{AtomicU64, Ordering};

use packetwire_codec::{tuple1, I32};
use packetwire_packet::{
    packet_set, BoxError, Connection, PacketHandler, PacketRegistry, PacketSet, Request,
};
use packetwire_transport::ByteChannel;
use tracing::debug;

/// Wire type id of [`Ping`].
pub const PING: u32 = 0x00;
/// Wire type id of [`Pong`].
pub const PONG: u32 = 0x01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ping {
    pub message: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pong {
    pub message: i32,
}

packet_set! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum DemoPacket {
        Ping(Ping),
        Pong(Pong),
    }
}

/// Registry for the demo packets. Messages are `i32` in the connection's
/// byte order.
pub fn registry() -> packetwire_packet::Result<PacketRegistry<DemoPacket>> {
    let mut registry = PacketRegistry::new();
    registry
        .register::<Ping, _>(
            PING,
            tuple1(I32, |ping: &Ping| &ping.message, |message| Ping { message }),
        )?
        .register::<Pong, _>(
            PONG,
            tuple1(I32, |pong: &Pong| &pong.message, |message| Pong { message }),
        )?;
    Ok(registry)
}

/// Answers every [`Ping`] with a [`Pong`] carrying the same message.
#[derive(Debug, Default)]
pub struct PingResponder {
    answered: AtomicU64,
}

impl PingResponder {
    /// Pings answered so far.
    pub fn answered(&self) -> u64 {
        self.answered.load(Ordering::Relaxed)
    }
}

impl PacketHandler<DemoPacket> for PingResponder {
    fn on_request(&self, request: &Request<DemoPacket>) -> Result<(), BoxError> {
        let ping = request
            .packet_as::<Ping>()
            .ok_or_else(|| format!("cannot answer {}", request.packet().kind_name()))?;
        request.respond_success(Pong {
            message: ping.message,
        })?;
        self.answered.fetch_add(1, Ordering::Relaxed);
        debug!(request_id = request.request_id(), message = ping.message, "answered ping");
        Ok(())
    }
}

/// One read step followed by one write step. Returns whether either moved
/// any bytes, so the caller knows whether to back off.
pub fn step<P, H, C>(connection: &Connection<P, H>, channel: &mut C) -> packetwire_packet::Result<bool>
where
    P: PacketSet,
    H: PacketHandler<P>,
    C: ByteChannel + ?Sized,
{
    let read = connection.read_step(channel)?;
    let wrote = connection.write_step(channel)?;
    Ok(read || wrote)
}
