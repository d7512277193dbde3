use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use packetwire_codec::{utf8, Codec, CodecError};
use packetwire_frame::{
    Frame, FrameConfig, FrameError, Mode, OutgoingFrame, RawConnection, MAX_BODY_SIZE,
};
use packetwire_transport::ByteChannel;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::error::{RequestError, Result};
use crate::handler::{PacketHandler, UnknownPacketAction};
use crate::registry::PacketRegistry;
use crate::request::Request;
use crate::response::{Outcome, OutcomeSender, ResponseFuture};
use crate::set::PacketSet;

type PendingTable<P> = Mutex<HashMap<u32, OutcomeSender<P>>>;

// Length prefix of the longest string body (varuint of 65535).
const FAILURE_PREFIX_MAX: usize = 3;

/// State shared by a connection and the requests it hands out.
pub(crate) struct Core<P: PacketSet> {
    pub(crate) raw: RawConnection,
    pub(crate) registry: PacketRegistry<P>,
    pending: Arc<PendingTable<P>>,
    next_id: AtomicU32,
}

impl<P: PacketSet> Core<P> {
    /// Reserve a request id and park `tx` under it.
    ///
    /// Ids count up from 1 and wrap. Zero is reserved for notifications and
    /// ids still awaiting a response are skipped.
    fn insert_pending(&self, tx: OutcomeSender<P>) -> u32 {
        let mut pending = self.pending.lock();
        loop {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            if id != 0 && !pending.contains_key(&id) {
                pending.insert(id, tx);
                return id;
            }
        }
    }

    fn complete(&self, request_id: u32, outcome: Outcome<P>) {
        let waiter = self.pending.lock().remove(&request_id);
        match waiter {
            Some(tx) => {
                if tx.send(outcome).is_err() {
                    trace!(request_id, "response arrived after the caller gave up");
                }
            }
            None => debug!(request_id, "discarding response for unknown request"),
        }
    }

    /// Frame for `packet`, encoded in this connection's byte order.
    pub(crate) fn outgoing(&self, mode: Mode, request_id: u32, packet: P) -> Result<OutgoingFrame> {
        self.registry
            .outgoing(mode, request_id, packet, self.raw.config().byte_order)
    }

    pub(crate) fn queue_failure(
        &self,
        packet_type: u32,
        request_id: u32,
        message: String,
    ) -> packetwire_frame::Result<()> {
        let message = clamp_message(message);
        self.raw.queue(OutgoingFrame::new(
            Mode::ResponseFailed,
            packet_type,
            request_id,
            move |dst: &mut BytesMut| utf8().encode(&message, dst).map_err(Into::into),
        ))
    }
}

/// A typed packet connection over one byte channel.
///
/// Owns the frame state, the packet registry and the table of requests
/// waiting for a response. The caller drives I/O with
/// [`Connection::read_step`] and [`Connection::write_step`]; packets can be
/// queued from any thread. Clones share the same connection.
///
/// Closing, whether locally, by end-of-stream or after an error, fails every
/// pending request with [`RequestError::Closed`] and then calls
/// [`PacketHandler::on_close`] exactly once.
pub struct Connection<P: PacketSet, H> {
    core: Arc<Core<P>>,
    handler: Arc<H>,
}

impl<P: PacketSet, H: PacketHandler<P>> Connection<P, H> {
    pub fn new(registry: PacketRegistry<P>, handler: H) -> Self {
        Self::with_config(registry, handler, FrameConfig::default())
    }

    pub fn with_config(registry: PacketRegistry<P>, handler: H, config: FrameConfig) -> Self {
        let handler = Arc::new(handler);
        let pending: Arc<PendingTable<P>> = Arc::default();

        let raw = RawConnection::with_close_hook(config, {
            let pending = Arc::clone(&pending);
            let handler = Arc::clone(&handler);
            move |remote: bool, error: Option<&FrameError>| {
                fail_pending(&pending, remote, error);
                handler.on_close(remote, error);
            }
        });

        Self {
            core: Arc::new(Core {
                raw,
                registry,
                pending,
                next_id: AtomicU32::new(1),
            }),
            handler,
        }
    }

    pub fn registry(&self) -> &PacketRegistry<P> {
        &self.core.registry
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn config(&self) -> &FrameConfig {
        self.core.raw.config()
    }

    pub fn is_closed(&self) -> bool {
        self.core.raw.is_closed()
    }

    /// Requests sent and still waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.core.pending.lock().len()
    }

    /// Frames queued and not yet serialized.
    pub fn queued_frames(&self) -> usize {
        self.core.raw.queued_frames()
    }

    /// Queue a notification. No response is expected.
    pub fn queue_notification(&self, packet: impl Into<P>) -> Result<()> {
        let frame = self.core.outgoing(Mode::Notify, 0, packet.into())?;
        self.core.raw.queue(frame)?;
        Ok(())
    }

    /// Queue a request and return the future of its outcome.
    ///
    /// Fails if the kind is unregistered or the connection is closed; in
    /// both cases no request id stays reserved.
    pub fn queue_request(&self, packet: impl Into<P>) -> Result<ResponseFuture<P>> {
        let packet = packet.into();
        self.core.registry.packet_type_of(&packet)?;

        let (tx, rx) = oneshot::channel();
        let request_id = self.core.insert_pending(tx);
        let queued = self
            .core
            .outgoing(Mode::Request, request_id, packet)
            .and_then(|frame| self.core.raw.queue(frame).map_err(Into::into));
        if let Err(err) = queued {
            self.core.pending.lock().remove(&request_id);
            return Err(err);
        }

        trace!(request_id, "request queued");
        Ok(ResponseFuture::new(request_id, rx))
    }

    /// Consume available bytes and dispatch every complete frame.
    ///
    /// Returns whether any bytes were consumed. End-of-stream closes the
    /// connection as remote. A malformed frame or undecodable body closes it
    /// locally and is returned as the error.
    pub fn read_step<C: ByteChannel + ?Sized>(&self, channel: &mut C) -> Result<bool> {
        Ok(self
            .core
            .raw
            .read_step(channel, |frame| self.dispatch(frame))?)
    }

    /// Serialize queued frames into `channel`. Returns whether any bytes
    /// were written.
    pub fn write_step<C: ByteChannel + ?Sized>(&self, channel: &mut C) -> Result<bool> {
        Ok(self.core.raw.write_step(channel)?)
    }

    /// Close locally. Pending requests fail and queued frames are dropped.
    pub fn close(&self) {
        self.core.raw.close();
    }

    fn dispatch(&self, frame: Frame) -> packetwire_frame::Result<()> {
        let Frame {
            mode,
            packet_type,
            request_id,
            mut body,
        } = frame;

        if mode == Mode::ResponseFailed {
            let message = utf8().decode(&mut body).map_err(decode_failed)?;
            self.core
                .complete(request_id, Err(RequestError::Rejected(message)));
            return Ok(());
        }

        let order = self.core.raw.config().byte_order;
        let packet = match self.core.registry.decode(packet_type, &mut body, order) {
            Some(decoded) => decoded.map_err(decode_failed)?,
            None => {
                self.unknown_packet(mode, packet_type, request_id, &body);
                return Ok(());
            }
        };

        self.handler.on_packet(mode, request_id, &packet);
        match mode {
            Mode::Notify => self.handler.on_notification(packet),
            Mode::Request => {
                let request = Request::new(Arc::clone(&self.core), packet, packet_type, request_id);
                self.handle_request(&request);
            }
            Mode::ResponseSucceeded => self.core.complete(request_id, Ok(packet)),
            // Failures never carry a packet and are resolved above.
            Mode::ResponseFailed => {}
        }
        Ok(())
    }

    /// Run the request callback. An error or a panic that leaves the request
    /// unanswered is sent back as a failure so the peer never waits forever.
    fn handle_request(&self, request: &Request<P>) {
        let message = match panic::catch_unwind(AssertUnwindSafe(|| {
            self.handler.on_request(request)
        })) {
            Ok(Ok(())) => return,
            Ok(Err(err)) => {
                warn!(
                    request_id = request.request_id(),
                    kind = request.packet().kind_name(),
                    error = %err,
                    "request handler failed"
                );
                err.to_string()
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(
                    request_id = request.request_id(),
                    kind = request.packet().kind_name(),
                    panic = %message,
                    "request handler panicked"
                );
                format!("request handler panicked: {message}")
            }
        };
        match request.respond_failure(message) {
            Ok(true) => {}
            Ok(false) => debug!(
                request_id = request.request_id(),
                "handler failed after responding"
            ),
            Err(err) => debug!(error = %err, "could not send failure response"),
        }
    }

    fn unknown_packet(&self, mode: Mode, packet_type: u32, request_id: u32, body: &Bytes) {
        let action = self
            .handler
            .on_unknown_packet(mode, packet_type, request_id, body);
        match action {
            UnknownPacketAction::Reject(message) if mode == Mode::Request => {
                warn!(packet_type, request_id, "rejecting request of unknown type");
                if let Err(err) = self.core.queue_failure(packet_type, request_id, message) {
                    debug!(error = %err, "could not reject unknown request");
                }
            }
            _ => debug!(%mode, packet_type, request_id, "ignoring packet of unknown type"),
        }
    }
}

impl<P: PacketSet, H> Clone for Connection<P, H> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<P: PacketSet, H> fmt::Debug for Connection<P, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("raw", &self.core.raw)
            .field("registry", &self.core.registry)
            .field("pending_requests", &self.core.pending.lock().len())
            .finish_non_exhaustive()
    }
}

fn fail_pending<P>(pending: &PendingTable<P>, remote: bool, error: Option<&FrameError>) {
    let waiters: Vec<_> = pending.lock().drain().collect();
    if waiters.is_empty() {
        return;
    }
    debug!(count = waiters.len(), remote, "failing pending requests");

    let reason = error.map(ToString::to_string);
    for (_, tx) in waiters {
        let _ = tx.send(Err(RequestError::Closed {
            remote,
            reason: reason.clone(),
        }));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

fn decode_failed(err: CodecError) -> FrameError {
    FrameError::Handler(Box::new(err))
}

fn clamp_message(mut message: String) -> String {
    let limit = MAX_BODY_SIZE - FAILURE_PREFIX_MAX;
    if message.len() > limit {
        let mut end = limit;
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        message.truncate(end);
    }
    message
}

#[cfg(test)]
mod tests {
    use packetwire_codec::{tuple1, ByteOrder, CodecExt, VarUint, I64};
    use packetwire_frame::BoxError;
    use packetwire_transport::{duplex, ByteChannel, MemoryChannel, ReadOutcome};

    use super::*;
    use crate::error::PacketError;
    use crate::packet_set;

    #[derive(Debug, Clone, PartialEq)]
    struct Ping {
        message: i64,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Pong {
        message: i64,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Note(String);

    packet_set! {
        #[derive(Debug, Clone, PartialEq)]
        enum Packet {
            Ping(Ping),
            Pong(Pong),
            Note(Note),
        }
    }

    fn ping_pong() -> PacketRegistry<Packet> {
        let mut registry = PacketRegistry::new();
        registry
            .register::<Ping, _>(
                0x00,
                tuple1(VarUint, |p: &Ping| &p.message, |message| Ping { message }),
            )
            .unwrap()
            .register::<Pong, _>(
                0x01,
                tuple1(VarUint, |p: &Pong| &p.message, |message| Pong { message }),
            )
            .unwrap();
        registry
    }

    fn full() -> PacketRegistry<Packet> {
        let mut registry = ping_pong();
        registry
            .register::<Note, _>(0x10, utf8().map(Note, |n: &Note| n.0.clone()))
            .unwrap();
        registry
    }

    #[derive(Default)]
    struct Recorder {
        answer_twice: bool,
        notes: Mutex<Vec<String>>,
        deferred: Mutex<Vec<Request<Packet>>>,
        closes: Mutex<Vec<(bool, Option<String>)>>,
    }

    impl PacketHandler<Packet> for Recorder {
        fn on_request(&self, request: &Request<Packet>) -> std::result::Result<(), BoxError> {
            match request.packet() {
                Packet::Ping(ping) => {
                    assert!(request.respond_success(Pong {
                        message: ping.message
                    })?);
                    if self.answer_twice {
                        assert!(!request.respond_success(Pong { message: -1 })?);
                        assert!(!request.respond_failure("too late")?);
                    }
                    Ok(())
                }
                Packet::Note(_) => {
                    self.deferred.lock().push(request.clone());
                    Ok(())
                }
                other => Err(format!("no handler for {}", other.kind_name()).into()),
            }
        }

        fn on_notification(&self, packet: Packet) {
            if let Packet::Note(note) = packet {
                self.notes.lock().push(note.0);
            }
        }

        fn on_close(&self, remote: bool, error: Option<&FrameError>) {
            self.closes
                .lock()
                .push((remote, error.map(ToString::to_string)));
        }
    }

    type Conn = Connection<Packet, Recorder>;

    fn pair(client: PacketRegistry<Packet>, server: PacketRegistry<Packet>) -> (Conn, Conn) {
        (
            Connection::new(client, Recorder::default()),
            Connection::new(server, Recorder::default()),
        )
    }

    fn pump<F: PacketHandler<Packet>, T: PacketHandler<Packet>>(
        from: &Connection<Packet, F>,
        a: &mut MemoryChannel,
        to: &Connection<Packet, T>,
        b: &mut MemoryChannel,
    ) {
        while from.write_step(a).unwrap() {}
        while to.read_step(b).unwrap() {}
    }

    #[test]
    fn request_is_answered_with_matching_id() {
        let (mut a, mut b) = duplex();
        let (client, server) = pair(ping_pong(), ping_pong());

        let mut future = client.queue_request(Ping { message: 42 }).unwrap();
        assert_eq!(future.request_id(), 1);
        assert_eq!(client.pending_requests(), 1);

        pump(&client, &mut a, &server, &mut b);
        assert!(future.try_take().is_none());
        pump(&server, &mut b, &client, &mut a);

        assert_eq!(future.try_take(), Some(Ok(Packet::Pong(Pong { message: 42 }))));
        assert_eq!(client.pending_requests(), 0);
    }

    #[test]
    fn request_ids_skip_zero_and_pending() {
        let (client, _server) = pair(ping_pong(), ping_pong());

        let first = client.queue_request(Ping { message: 1 }).unwrap();
        assert_eq!(first.request_id(), 1);

        client.core.next_id.store(u32::MAX, Ordering::Relaxed);
        let last = client.queue_request(Ping { message: 2 }).unwrap();
        assert_eq!(last.request_id(), u32::MAX);

        let wrapped = client.queue_request(Ping { message: 3 }).unwrap();
        assert_eq!(wrapped.request_id(), 2);
        assert_eq!(client.pending_requests(), 3);
    }

    #[test]
    fn notifications_carry_id_zero() {
        let (mut a, mut b) = duplex();
        let (client, server) = pair(full(), full());

        client.queue_notification(Note("hello".into())).unwrap();
        assert_eq!(client.pending_requests(), 0);
        pump(&client, &mut a, &server, &mut b);

        assert_eq!(server.handler().notes.lock().as_slice(), &["hello".to_string()]);
        assert_eq!(server.queued_frames(), 0);
    }

    #[test]
    fn unregistered_kind_is_refused_before_queueing() {
        let (client, _server) = pair(ping_pong(), ping_pong());
        assert!(matches!(
            client.queue_request(Note("x".into())),
            Err(PacketError::UnregisteredKind("Note"))
        ));
        assert!(matches!(
            client.queue_notification(Note("x".into())),
            Err(PacketError::UnregisteredKind("Note"))
        ));
        assert_eq!(client.pending_requests(), 0);
        assert_eq!(client.queued_frames(), 0);
    }

    #[test]
    fn queue_on_closed_connection_reserves_nothing() {
        let (client, _server) = pair(ping_pong(), ping_pong());
        client.close();

        assert!(matches!(
            client.queue_request(Ping { message: 1 }),
            Err(PacketError::Frame(FrameError::Closed))
        ));
        assert_eq!(client.pending_requests(), 0);
    }

    #[test]
    fn unknown_request_is_rejected_and_unknown_notification_dropped() {
        let (mut a, mut b) = duplex();
        let (client, server) = pair(full(), ping_pong());

        server.queue_notification(Ping { message: 0 }).unwrap();
        let mut future = client.queue_request(Note("who?".into())).unwrap();
        client.queue_notification(Note("ignored".into())).unwrap();
        pump(&client, &mut a, &server, &mut b);

        // Only the rejection joins the notification already queued.
        assert_eq!(server.queued_frames(), 2);
        pump(&server, &mut b, &client, &mut a);
        assert_eq!(
            future.try_take(),
            Some(Err(RequestError::Rejected(
                "Unknown packet ID: 0x10".to_string()
            )))
        );
        assert!(!server.is_closed());
    }

    #[test]
    fn handler_error_becomes_failure_response() {
        let (mut a, mut b) = duplex();
        let (client, server) = pair(full(), full());

        let mut future = client.queue_request(Pong { message: 5 }).unwrap();
        pump(&client, &mut a, &server, &mut b);
        pump(&server, &mut b, &client, &mut a);

        assert_eq!(
            future.try_take(),
            Some(Err(RequestError::Rejected("no handler for Pong".to_string())))
        );
    }

    #[test]
    fn at_most_one_response_per_request() {
        let (mut a, mut b) = duplex();
        let client = Connection::new(ping_pong(), Recorder::default());
        let server = Connection::new(
            ping_pong(),
            Recorder {
                answer_twice: true,
                ..Recorder::default()
            },
        );

        let mut future = client.queue_request(Ping { message: 7 }).unwrap();
        pump(&client, &mut a, &server, &mut b);
        assert_eq!(server.queued_frames(), 1);

        pump(&server, &mut b, &client, &mut a);
        assert_eq!(future.try_take(), Some(Ok(Packet::Pong(Pong { message: 7 }))));
    }

    #[test]
    fn deferred_response_from_another_thread() {
        let (mut a, mut b) = duplex();
        let (client, server) = pair(full(), full());

        let mut future = client.queue_request(Note("later".into())).unwrap();
        pump(&client, &mut a, &server, &mut b);
        assert_eq!(server.queued_frames(), 0);

        let request = server.handler().deferred.lock().pop().unwrap();
        assert_eq!(request.packet_as::<Note>(), Some(&Note("later".into())));
        std::thread::spawn(move || request.respond_failure("declined").unwrap())
            .join()
            .unwrap();

        pump(&server, &mut b, &client, &mut a);
        assert_eq!(
            future.try_take(),
            Some(Err(RequestError::Rejected("declined".to_string())))
        );
    }

    #[test]
    fn local_close_fails_pending_then_notifies_handler() {
        let (client, _server) = pair(ping_pong(), ping_pong());
        let mut future = client.queue_request(Ping { message: 1 }).unwrap();

        client.close();
        client.close();

        assert_eq!(
            future.try_take(),
            Some(Err(RequestError::Closed {
                remote: false,
                reason: None
            }))
        );
        assert_eq!(client.pending_requests(), 0);
        assert_eq!(client.handler().closes.lock().as_slice(), &[(false, None)]);
    }

    #[test]
    fn peer_hangup_fails_pending_as_remote() {
        let (mut a, b) = duplex();
        let (client, _server) = pair(ping_pong(), ping_pong());
        let mut future = client.queue_request(Ping { message: 1 }).unwrap();
        while client.write_step(&mut a).unwrap() {}
        drop(b);

        assert!(client.read_step(&mut a).unwrap());
        assert!(client.is_closed());
        assert_eq!(
            future.try_take(),
            Some(Err(RequestError::Closed {
                remote: true,
                reason: None
            }))
        );
        assert_eq!(client.handler().closes.lock().as_slice(), &[(true, None)]);
    }

    #[test]
    fn undecodable_body_closes_locally() {
        let (mut a, mut b) = duplex();
        let (_client, server) = pair(ping_pong(), ping_pong());

        // Request for Ping (type 0) with an empty body.
        a.write(&[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]).unwrap();
        let err = server.read_step(&mut b).unwrap_err();

        assert!(matches!(err, PacketError::Codec(CodecError::UnexpectedEof { .. })));
        assert!(server.is_closed());
        let closes = server.handler().closes.lock();
        assert!(!closes[0].0);
        assert!(closes[0].1.is_some());
    }

    #[test]
    fn late_response_for_unknown_id_is_discarded() {
        let (mut a, mut b) = duplex();
        let (client, server) = pair(ping_pong(), ping_pong());

        let future = client.queue_request(Ping { message: 9 }).unwrap();
        drop(future);
        pump(&client, &mut a, &server, &mut b);
        pump(&server, &mut b, &client, &mut a);

        assert_eq!(client.pending_requests(), 0);
        assert!(!client.is_closed());
    }

    #[test]
    fn long_failure_messages_are_clamped() {
        let message = "é".repeat(MAX_BODY_SIZE);
        let clamped = clamp_message(message);
        assert!(clamped.len() <= MAX_BODY_SIZE - FAILURE_PREFIX_MAX);
        assert!(clamped.chars().all(|c| c == 'é'));
        assert_eq!(clamp_message("short".into()), "short");
    }

    #[test]
    fn body_integers_follow_connection_byte_order() {
        let little = FrameConfig {
            byte_order: ByteOrder::Little,
            ..FrameConfig::default()
        };
        let fixed_width = || {
            let mut registry = PacketRegistry::new();
            registry
                .register::<Ping, _>(5, tuple1(I64, |p: &Ping| &p.message, |message| Ping { message }))
                .unwrap();
            registry
        };
        let (mut a, mut b) = duplex();
        let sender = Connection::with_config(fixed_width(), Recorder::default(), little.clone());
        sender.queue_notification(Ping { message: 1 }).unwrap();
        while sender.write_step(&mut a).unwrap() {}

        let mut wire = [0u8; 32];
        let ReadOutcome::Data(n) = b.read(&mut wire).unwrap() else {
            panic!("expected frame bytes");
        };
        assert_eq!(
            &wire[..n],
            &[
                3, 0, 8, 0, 5, 0, 0, 0, 0, 0, 0, 0, // header
                1, 0, 0, 0, 0, 0, 0, 0, // body
            ]
        );

        // A little-endian peer reads it back; a big-endian one would not.
        let (mut a, mut b) = duplex();
        let receiver = Connection::with_config(fixed_width(), Journal::default(), little);
        sender.queue_notification(Ping { message: -2 }).unwrap();
        while sender.write_step(&mut a).unwrap() {}
        while receiver.read_step(&mut b).unwrap() {}
        assert_eq!(
            receiver.handler().entries(),
            ["packet NOTIFY 0", "notification Ping"]
        );
    }

    #[test]
    fn panicking_handler_still_answers() {
        struct Panicky;

        impl PacketHandler<Packet> for Panicky {
            fn on_request(&self, request: &Request<Packet>) -> std::result::Result<(), BoxError> {
                match request.packet() {
                    Packet::Ping(_) => panic!("ping handler exploded"),
                    _ => panic!("{} is not supported", request.packet().kind_name()),
                }
            }
        }

        let (mut a, mut b) = duplex();
        let client = Connection::new(full(), Recorder::default());
        let server = Connection::new(full(), Panicky);

        let mut literal = client.queue_request(Ping { message: 1 }).unwrap();
        let mut formatted = client.queue_request(Note("x".into())).unwrap();
        while client.write_step(&mut a).unwrap() {}
        while server.read_step(&mut b).unwrap() {}
        assert!(!server.is_closed());
        assert_eq!(server.queued_frames(), 2);

        pump(&server, &mut b, &client, &mut a);
        assert_eq!(
            literal.try_take(),
            Some(Err(RequestError::Rejected(
                "request handler panicked: ping handler exploded".to_string()
            )))
        );
        assert_eq!(
            formatted.try_take(),
            Some(Err(RequestError::Rejected(
                "request handler panicked: Note is not supported".to_string()
            )))
        );
    }

    /// Writes every callback, listeners included, into one ordered log.
    #[derive(Default)]
    struct Journal {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Journal {
        fn entries(&self) -> Vec<String> {
            std::mem::take(&mut *self.log.lock())
        }

        fn listening(&self, mut registry: PacketRegistry<Packet>) -> PacketRegistry<Packet> {
            let pings = Arc::clone(&self.log);
            let pongs = Arc::clone(&self.log);
            registry
                .listen::<Ping, _>(move |_| pings.lock().push("listener Ping".into()))
                .unwrap()
                .listen::<Pong, _>(move |_| pongs.lock().push("listener Pong".into()))
                .unwrap();
            registry
        }
    }

    impl PacketHandler<Packet> for Journal {
        fn on_request(&self, request: &Request<Packet>) -> std::result::Result<(), BoxError> {
            self.log
                .lock()
                .push(format!("request {}", request.packet().kind_name()));
            if let Packet::Ping(ping) = request.packet() {
                request.respond_success(Pong {
                    message: ping.message,
                })?;
            }
            Ok(())
        }

        fn on_notification(&self, packet: Packet) {
            self.log
                .lock()
                .push(format!("notification {}", packet.kind_name()));
        }

        fn on_packet(&self, mode: Mode, request_id: u32, _packet: &Packet) {
            self.log.lock().push(format!("packet {mode} {request_id}"));
        }
    }

    #[test]
    fn listeners_then_on_packet_then_mode_callback() {
        let (mut a, mut b) = duplex();
        let client_journal = Journal::default();
        let server_journal = Journal::default();
        let client_registry = client_journal.listening(ping_pong());
        let server_registry = server_journal.listening(ping_pong());
        let client = Connection::new(client_registry, client_journal);
        let server = Connection::new(server_registry, server_journal);

        client.queue_notification(Ping { message: 1 }).unwrap();
        pump(&client, &mut a, &server, &mut b);
        assert_eq!(
            server.handler().entries(),
            ["listener Ping", "packet NOTIFY 0", "notification Ping"]
        );

        let mut future = client.queue_request(Ping { message: 2 }).unwrap();
        let id = future.request_id();
        pump(&client, &mut a, &server, &mut b);
        assert_eq!(
            server.handler().entries(),
            [
                "listener Ping".to_string(),
                format!("packet REQUEST {id}"),
                "request Ping".to_string(),
            ]
        );

        pump(&server, &mut b, &client, &mut a);
        assert_eq!(
            client.handler().entries(),
            ["listener Pong".to_string(), format!("packet RESPONSE_SUCCEEDED {id}")]
        );
        assert_eq!(future.try_take(), Some(Ok(Packet::Pong(Pong { message: 2 }))));
    }

    #[test]
    fn connection_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Conn>();
    }
}
