use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use packetwire_frame::Mode;
use tracing::trace;

use crate::connection::Core;
use crate::error::Result;
use crate::set::{PacketSet, PacketVariant};

/// An incoming request together with its one-shot responder.
///
/// Cloning is cheap and every clone shares the responder, so a request can
/// be answered later from another thread. Only the first
/// `respond_success`/`respond_failure` call across all clones sends a frame;
/// later calls return `Ok(false)`.
pub struct Request<P: PacketSet> {
    inner: Arc<Inner<P>>,
}

struct Inner<P: PacketSet> {
    core: Arc<Core<P>>,
    packet: P,
    packet_type: u32,
    request_id: u32,
    responded: AtomicBool,
}

impl<P: PacketSet> Request<P> {
    pub(crate) fn new(core: Arc<Core<P>>, packet: P, packet_type: u32, request_id: u32) -> Self {
        Self {
            inner: Arc::new(Inner {
                core,
                packet,
                packet_type,
                request_id,
                responded: AtomicBool::new(false),
            }),
        }
    }

    pub fn packet(&self) -> &P {
        &self.inner.packet
    }

    /// The request packet as kind `V`, if it is one.
    pub fn packet_as<V: PacketVariant<P>>(&self) -> Option<&V> {
        V::from_packet(&self.inner.packet)
    }

    pub fn packet_type(&self) -> u32 {
        self.inner.packet_type
    }

    pub fn request_id(&self) -> u32 {
        self.inner.request_id
    }

    pub fn has_responded(&self) -> bool {
        self.inner.responded.load(Ordering::Acquire)
    }

    /// Answer with a response packet.
    ///
    /// Returns `Ok(false)` without sending if the request was already
    /// answered. Fails if the response kind is unregistered (the request
    /// stays unanswered) or the connection is closed.
    pub fn respond_success(&self, response: impl Into<P>) -> Result<bool> {
        let frame = self.inner.core.outgoing(
            Mode::ResponseSucceeded,
            self.inner.request_id,
            response.into(),
        )?;
        if !self.claim() {
            return Ok(false);
        }
        self.inner.core.raw.queue(frame)?;
        trace!(request_id = self.inner.request_id, "response queued");
        Ok(true)
    }

    /// Answer with a failure message.
    ///
    /// Returns `Ok(false)` without sending if the request was already
    /// answered.
    pub fn respond_failure(&self, message: impl Into<String>) -> Result<bool> {
        if !self.claim() {
            return Ok(false);
        }
        self.inner
            .core
            .queue_failure(self.inner.packet_type, self.inner.request_id, message.into())?;
        trace!(request_id = self.inner.request_id, "failure response queued");
        Ok(true)
    }

    fn claim(&self) -> bool {
        !self.inner.responded.swap(true, Ordering::AcqRel)
    }
}

impl<P: PacketSet> Clone for Request<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: PacketSet> fmt::Debug for Request<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("kind", &self.inner.packet.kind_name())
            .field("packet_type", &self.inner.packet_type)
            .field("request_id", &self.inner.request_id)
            .field("responded", &self.has_responded())
            .finish()
    }
}
