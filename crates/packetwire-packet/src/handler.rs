use bytes::Bytes;
use packetwire_frame::{BoxError, FrameError, Mode};
use tracing::trace;

use crate::request::Request;
use crate::set::PacketSet;

/// What to do with a frame whose packet type is not registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnknownPacketAction {
    /// Drop the frame silently.
    Ignore,
    /// Answer a request with a failure response carrying this message.
    /// Ignored for frames that are not requests.
    Reject(String),
}

/// Callbacks a [`Connection`](crate::Connection) invokes while dispatching.
///
/// Every callback runs on the thread driving `read_step`, except
/// [`PacketHandler::on_close`], which runs wherever the connection closes.
pub trait PacketHandler<P: PacketSet>: Send + Sync + 'static {
    /// Handle an incoming request.
    ///
    /// Answer through [`Request::respond_success`] or
    /// [`Request::respond_failure`], now or later from another thread. An
    /// `Err` is answered with a failure response carrying its message.
    fn on_request(&self, request: &Request<P>) -> Result<(), BoxError>;

    /// Handle an incoming notification.
    fn on_notification(&self, packet: P) {
        trace!(kind = packet.kind_name(), "notification ignored");
    }

    /// Observe every decoded packet before the mode-specific callback.
    fn on_packet(&self, _mode: Mode, _request_id: u32, _packet: &P) {}

    /// Decide what to do with a frame of an unregistered packet type.
    ///
    /// The default rejects requests and ignores everything else.
    fn on_unknown_packet(
        &self,
        mode: Mode,
        packet_type: u32,
        _request_id: u32,
        _body: &Bytes,
    ) -> UnknownPacketAction {
        match mode {
            Mode::Request => UnknownPacketAction::Reject(unknown_packet_message(packet_type)),
            _ => UnknownPacketAction::Ignore,
        }
    }

    /// The connection closed. `remote` is true when the peer ended the
    /// stream; `error` is the failure that closed it, if any.
    fn on_close(&self, _remote: bool, _error: Option<&FrameError>) {}
}

/// Diagnostic sent back for requests of an unregistered type.
pub fn unknown_packet_message(packet_type: u32) -> String {
    format!("Unknown packet ID: 0x{packet_type:02x}")
}

/// Handler built from a request callback alone.
///
/// Notifications are ignored and unknown packets get the default treatment.
pub struct FnHandler<F>(pub F);

impl<P, F> PacketHandler<P> for FnHandler<F>
where
    P: PacketSet,
    F: Fn(&Request<P>) -> Result<(), BoxError> + Send + Sync + 'static,
{
    fn on_request(&self, request: &Request<P>) -> Result<(), BoxError> {
        (self.0)(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet_set;

    #[derive(Debug)]
    struct Only;

    packet_set! {
        #[derive(Debug)]
        enum Packet {
            Only(Only),
        }
    }

    struct Silent;

    impl PacketHandler<Packet> for Silent {
        fn on_request(&self, _request: &Request<Packet>) -> Result<(), BoxError> {
            Ok(())
        }
    }

    #[test]
    fn default_unknown_policy() {
        let body = Bytes::new();
        assert_eq!(
            Silent.on_unknown_packet(Mode::Request, 0x2a, 3, &body),
            UnknownPacketAction::Reject("Unknown packet ID: 0x2a".to_string())
        );
        assert_eq!(
            Silent.on_unknown_packet(Mode::Notify, 0x2a, 0, &body),
            UnknownPacketAction::Ignore
        );
        assert_eq!(
            Silent.on_unknown_packet(Mode::ResponseSucceeded, 0x2a, 3, &body),
            UnknownPacketAction::Ignore
        );
    }

    #[test]
    fn diagnostic_format() {
        assert_eq!(unknown_packet_message(0x05), "Unknown packet ID: 0x05");
        assert_eq!(unknown_packet_message(0x1234), "Unknown packet ID: 0x1234");
    }
}
