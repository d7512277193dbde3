use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::RequestError;
use crate::set::{PacketSet, PacketVariant};

pub(crate) type Outcome<P> = Result<P, RequestError>;
pub(crate) type OutcomeSender<P> = oneshot::Sender<Outcome<P>>;

/// Outcome of a request queued with
/// [`Connection::queue_request`](crate::Connection::queue_request).
///
/// Resolves exactly once: with the peer's response packet, with the peer's
/// failure message, or with the reason the connection closed. Await it, or
/// use [`ResponseFuture::wait`] / [`ResponseFuture::try_take`] from plain
/// threads. Dropping it abandons interest in the response; the connection
/// discards the outcome when it arrives.
#[derive(Debug)]
pub struct ResponseFuture<P> {
    request_id: u32,
    rx: oneshot::Receiver<Outcome<P>>,
}

impl<P: PacketSet> ResponseFuture<P> {
    pub(crate) fn new(request_id: u32, rx: oneshot::Receiver<Outcome<P>>) -> Self {
        Self { request_id, rx }
    }

    pub fn request_id(&self) -> u32 {
        self.request_id
    }

    /// Block the current thread until the outcome is known.
    ///
    /// Must not be called from within an async runtime. Something else has
    /// to keep stepping the connection meanwhile.
    pub fn wait(self) -> Outcome<P> {
        self.rx.blocking_recv().unwrap_or_else(|_| Err(abandoned()))
    }

    /// Block until the outcome is known and expect a `V` response.
    pub fn wait_as<V: PacketVariant<P>>(self) -> Result<V, RequestError> {
        expect_kind(self.wait()?)
    }

    /// Take the outcome if it has arrived. Returns `None` while pending.
    ///
    /// The outcome is handed out once; polling again afterwards reports the
    /// request as closed.
    pub fn try_take(&mut self) -> Option<Outcome<P>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(abandoned())),
        }
    }
}

impl<P: PacketSet> Future for ResponseFuture<P> {
    type Output = Outcome<P>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(abandoned())))
    }
}

/// Narrow a response packet to the kind the caller expects.
pub fn expect_kind<P: PacketSet, V: PacketVariant<P>>(packet: P) -> Result<V, RequestError> {
    V::try_from_packet(packet).map_err(|other| RequestError::UnexpectedKind {
        expected: V::NAME,
        actual: other.kind_name(),
    })
}

/// The connection went away without resolving the request.
fn abandoned() -> RequestError {
    RequestError::Closed {
        remote: false,
        reason: Some("connection dropped".to_string()),
    }
}
