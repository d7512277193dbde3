use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use packetwire_transport::ByteChannel;
use parking_lot::Mutex;
use tracing::debug;

use crate::codec::{Frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::reader::FrameReader;
use crate::writer::{FrameWriter, OutgoingFrame};

/// Called once when the connection closes, with `(remote, error)`.
///
/// `remote` is true when the peer ended the stream. `error` carries the
/// failure that closed the connection, if any.
pub type CloseHook = Box<dyn FnOnce(bool, Option<&FrameError>) + Send>;

/// Frame-level connection state.
///
/// Holds the read state machine, the write buffer, the outgoing queue and the
/// closed flag. The caller drives it with [`RawConnection::read_step`] and
/// [`RawConnection::write_step`]; frames may be queued from any thread.
///
/// Read and write state are kept apart, so the two steps can run on different
/// threads. Two concurrent calls of the same step serialize on its lock.
pub struct RawConnection {
    reader: Mutex<FrameReader>,
    writer: Mutex<FrameWriter>,
    queue: Mutex<VecDeque<OutgoingFrame>>,
    closed: AtomicBool,
    on_close: Mutex<Option<CloseHook>>,
    config: FrameConfig,
}

impl RawConnection {
    pub fn new(config: FrameConfig) -> Self {
        Self::with_close_hook(config, |_, _| {})
    }

    pub fn with_close_hook<H>(config: FrameConfig, on_close: H) -> Self
    where
        H: FnOnce(bool, Option<&FrameError>) + Send + 'static,
    {
        Self {
            reader: Mutex::new(FrameReader::new(&config)),
            writer: Mutex::new(FrameWriter::new(&config)),
            queue: Mutex::new(VecDeque::new()),
            closed: AtomicBool::new(false),
            on_close: Mutex::new(Some(Box::new(on_close))),
            config,
        }
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Frames queued and not yet serialized.
    pub fn queued_frames(&self) -> usize {
        self.queue.lock().len()
    }

    /// Append a frame to the outgoing queue.
    pub fn queue(&self, frame: OutgoingFrame) -> Result<()> {
        let mut queue = self.queue.lock();
        if self.is_closed() {
            return Err(FrameError::Closed);
        }
        queue.push_back(frame);
        Ok(())
    }

    /// Consume available bytes from `channel`, passing each complete frame
    /// to `on_frame`.
    ///
    /// Returns whether any bytes were consumed. End-of-stream closes the
    /// connection as remote and returns `Ok(true)`. Any error closes it as
    /// local and is returned. On a closed connection this does nothing and
    /// returns `Ok(false)`.
    pub fn read_step<C, F>(&self, channel: &mut C, on_frame: F) -> Result<bool>
    where
        C: ByteChannel + ?Sized,
        F: FnMut(Frame) -> Result<()>,
    {
        if self.is_closed() {
            return Ok(false);
        }

        let result = self
            .reader
            .lock()
            .step(channel, on_frame, || self.is_closed());
        match result {
            Ok(progress) if progress.end_of_stream => {
                self.close_with(true, None);
                Ok(true)
            }
            Ok(progress) => Ok(progress.consumed),
            Err(err) => {
                self.close_with(false, Some(&err));
                Err(err)
            }
        }
    }

    /// Flush buffered bytes and serialize queued frames into `channel`.
    ///
    /// Returns whether any bytes were written. Errors close the connection.
    pub fn write_step<C>(&self, channel: &mut C) -> Result<bool>
    where
        C: ByteChannel + ?Sized,
    {
        if self.is_closed() {
            return Ok(false);
        }

        let result = self.writer.lock().step(
            channel,
            || self.queue.lock().pop_front(),
            || self.is_closed(),
        );
        result.inspect_err(|err| self.close_with(false, Some(err)))
    }

    /// Close the connection locally. Closing twice is a no-op.
    pub fn close(&self) {
        self.close_with(false, None);
    }

    fn close_with(&self, remote: bool, error: Option<&FrameError>) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let dropped = {
            let mut queue = self.queue.lock();
            let n = queue.len();
            queue.clear();
            n
        };
        match error {
            Some(err) => debug!(remote, dropped, error = %err, "connection closed"),
            None => debug!(remote, dropped, "connection closed"),
        }

        let hook = self.on_close.lock().take();
        if let Some(hook) = hook {
            hook(remote, error);
        }
    }
}

impl fmt::Debug for RawConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawConnection")
            .field("closed", &self.is_closed())
            .field("queued_frames", &self.queued_frames())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
